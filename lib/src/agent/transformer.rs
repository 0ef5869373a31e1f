use super::{EnforcementMode, TransformError};
use crate::checkers::RuntimeChecker;
use crate::jvm::codec::ClassCodec;
use crate::jvm::model::ClassModel;
use crate::jvm::{BinaryName, Name};
use crate::policy::{BoundaryStrategy, InstrumentationStrategy, StrictBoundaryStrategy};
use crate::resolution::{BytecodeHierarchyResolver, ChainResolver, ClassResolver};
use crate::scope::{FnFilter, MarkerLookup, ScopeFilter};
use crate::weave::{ScopeClassification, WeaveContext, Weaver};
use dashmap::DashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Hook called with every unit as it gets loaded
pub trait ClassFileTransformer: Send + Sync {
    /// Rewrite the bytes of a unit
    ///
    /// The class name is in internal form (eg. `com/example/App`). `None` means the original
    /// bytes should be loaded unchanged.
    fn transform(&self, class_name: &str, context: &LoadContext, bytes: &[u8]) -> Option<Vec<u8>>;
}

/// What the host knows about the loader of a unit
#[derive(Clone, Default)]
pub struct LoadContext {
    /// Resolver over the classes visible to the loader, consulted before the agent's own
    pub resolver: Option<Arc<dyn ClassResolver>>,
}

impl LoadContext {
    pub fn new() -> LoadContext {
        LoadContext::default()
    }

    pub fn with_resolver(resolver: Arc<dyn ClassResolver>) -> LoadContext {
        LoadContext {
            resolver: Some(resolver),
        }
    }
}

/// Namespaces that are never touched, even if the scan filter lets them through
const SKIPPED_PREFIXES: [&str; 4] = ["java/", "sun/", "jdk/", "org/gradle"];

/// Lookups through one loader's resolver, chained before the agent's own
#[derive(Clone)]
pub(super) struct LoaderLookup {
    /// Holds on to the loader's resolver, so its address stays a valid key
    resolver: Arc<dyn ClassResolver>,
    marker: Arc<MarkerLookup>,
}

/// Weaves checks into units as they are loaded
pub struct RuntimeTransformer {
    pub(super) checker: Arc<dyn RuntimeChecker>,
    pub(super) scan_filter: Arc<dyn ScopeFilter>,
    pub(super) policy_filter: Arc<dyn ScopeFilter>,
    pub(super) trust_annotated_for: bool,
    pub(super) mode: EnforcementMode,
    pub(super) resolver: Arc<dyn ClassResolver>,
    pub(super) marker: Arc<MarkerLookup>,
    pub(super) codec: Arc<dyn ClassCodec>,

    /// Per-loader lookups, keyed by the address of the loader's resolver
    pub(super) loaders: DashMap<usize, LoaderLookup>,
}

impl RuntimeTransformer {
    pub fn checker(&self) -> &dyn RuntimeChecker {
        self.checker.as_ref()
    }

    pub fn mode(&self) -> EnforcementMode {
        self.mode
    }

    /// Is the unit looked at at all?
    pub fn scans(&self, class: &BinaryName) -> bool {
        !SKIPPED_PREFIXES
            .iter()
            .any(|prefix| class.starts_with(prefix))
            && self.scan_filter.test(class)
    }

    /// Is the unit checked, according to configuration alone?
    pub fn is_configured_checked(&self, class: &BinaryName) -> bool {
        self.policy_filter.test(class)
    }

    /// Weave a unit, reporting why it was left alone
    ///
    /// `Ok(None)` means the unit doesn't need any checks in the current mode.
    pub fn try_transform(
        &self,
        class_name: &BinaryName,
        context: &LoadContext,
        bytes: &[u8],
    ) -> Result<Option<Vec<u8>>, TransformError> {
        let class = self.codec.parse(bytes)?;
        if &class.name != class_name {
            return Err(TransformError::NameMismatch {
                expected: class_name.to_string(),
                found: class.name.to_string(),
            });
        }

        let (resolver, marker) = match &context.resolver {
            Some(loader) => {
                let lookup = self.loader_lookup(loader);
                (lookup.resolver, lookup.marker)
            }
            None => (self.resolver.clone(), self.marker.clone()),
        };

        let classification = self.classify(&class, &marker);
        if !classification.is_checked() && self.mode == EnforcementMode::Standard {
            log::debug!("Skipping unchecked class {} in standard mode", class.name);
            return Ok(None);
        }

        // The unit being woven is classified already; everything else goes through the filter
        let current = class.name.clone();
        let policy = self.policy_filter.clone();
        let trusted_marker = if self.trust_annotated_for {
            Some(marker.clone())
        } else {
            None
        };
        let checked: Arc<dyn ScopeFilter> = Arc::new(FnFilter(move |other: &BinaryName| {
            if *other == current {
                classification.is_checked()
            } else {
                policy.test(other)
                    || trusted_marker
                        .as_ref()
                        .map_or(false, |marker| marker.is_marked(other))
            }
        }));

        let base = BoundaryStrategy::new(self.checker.clone(), checked.clone(), resolver.clone());
        let strategy: Arc<dyn InstrumentationStrategy> = match self.mode {
            EnforcementMode::Standard => Arc::new(base),
            EnforcementMode::Global => Arc::new(StrictBoundaryStrategy::new(base, marker)),
        };
        let hierarchy = BytecodeHierarchyResolver::new(resolver);
        let weaver = Weaver::new(strategy, Arc::new(hierarchy));

        let context = WeaveContext {
            classification,
            checked: checked.as_ref(),
        };
        let outcome = weaver.weave(&class, &context)?;
        log::debug!(
            "Inserted {} checks and {} bridges into {}",
            outcome.inserted.len(),
            outcome.bridges.len(),
            class.name
        );
        Ok(Some(self.codec.emit(&outcome.class)?))
    }

    /// Resolver and marker lookup for units of one loader
    ///
    /// These are shared by every unit of the loader, so package markers are only looked up once.
    fn loader_lookup(&self, loader: &Arc<dyn ClassResolver>) -> LoaderLookup {
        let key = Arc::as_ptr(loader) as *const () as usize;
        if let Some(lookup) = self.loaders.get(&key) {
            return lookup.value().clone();
        }
        let resolver: Arc<dyn ClassResolver> =
            Arc::new(ChainResolver::new(vec![loader.clone(), self.resolver.clone()]));
        let marker = Arc::new(MarkerLookup::new(self.checker.system(), resolver.clone()));
        let lookup = LoaderLookup {
            resolver,
            marker,
        };
        self.loaders.entry(key).or_insert(lookup).value().clone()
    }

    fn classify(&self, class: &ClassModel, marker: &MarkerLookup) -> ScopeClassification {
        if self.policy_filter.test(&class.name) {
            return ScopeClassification::Checked;
        }
        if self.trust_annotated_for && marker.has_marker(class) {
            log::info!(
                "Auto-detected checked class {} (@AnnotatedFor(\"{}\"))",
                class.name,
                marker.system()
            );
            return ScopeClassification::Checked;
        }
        ScopeClassification::Unchecked
    }
}

impl ClassFileTransformer for RuntimeTransformer {
    fn transform(&self, class_name: &str, context: &LoadContext, bytes: &[u8]) -> Option<Vec<u8>> {
        let name = match BinaryName::from_str(class_name) {
            Ok(name) => name,
            Err(err) => {
                log::debug!("Ignoring unit with invalid name: {}", err);
                return None;
            }
        };
        if !self.scans(&name) {
            return None;
        }
        log::info!("Processing {}", name);

        let result = catch_unwind(AssertUnwindSafe(|| {
            self.try_transform(&name, context, bytes)
        }));
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                let message: String = if let Some(e) = e.downcast_ref::<&'static str>() {
                    String::from(*e)
                } else if let Some(e) = e.downcast_ref::<String>() {
                    String::from(e)
                } else {
                    String::from("unknown error")
                };
                Err(TransformError::Panic(message))
            }
        };

        match result {
            Ok(bytes) => bytes,
            Err(err) => {
                log::error!("Failed to instrument {}: {}", name, err);
                None
            }
        }
    }
}
