//! Load-time hook
//!
//! The host calls a [`ClassFileTransformer`] with the bytes of every unit it loads. The
//! [`RuntimeTransformer`] installed by [`RuntimeAgent`] decides whether the unit is scanned and
//! checked, weaves it, and hands back new bytes. Nothing that goes wrong while weaving stops the
//! unit from loading: errors are logged and the original bytes are used.
//!
//! Two filters drive this:
//!
//!   - the _policy_ filter says which classes are checked by configuration (explicitly listed
//!     classes, or every class outside of the platform when nothing is listed)
//!   - the _scan_ filter says which classes are looked at at all, which is wider than the policy
//!     filter in global mode (unchecked classes get woven too) and when `@AnnotatedFor` markers
//!     are trusted (the markers have to be read to classify)

mod errors;
mod settings;
mod transformer;

pub use errors::*;
pub use settings::*;
pub use transformer::*;

use crate::checkers::checker_by_name;
use crate::jvm::codec::{ClassCodec, UnitImageCodec};
use crate::resolution::ClassResolver;
use crate::runtime::RuntimeVerifier;
use crate::scope::{reject_all, ClassListFilter, FrameworkSafetyFilter, MarkerLookup, ScopeFilter};
use dashmap::DashMap;
use std::sync::Arc;

pub struct RuntimeAgent;

impl RuntimeAgent {
    /// Set up weaving, reporting violations to the process-wide verifier
    pub fn install(
        settings: &Settings,
        resolver: Arc<dyn ClassResolver>,
    ) -> Result<RuntimeTransformer, SettingsError> {
        RuntimeAgent::install_into(settings, resolver, RuntimeVerifier::global())
    }

    /// Set up weaving, installing the configured handler (if any) into the given verifier
    pub fn install_into(
        settings: &Settings,
        resolver: Arc<dyn ClassResolver>,
        verifier: &RuntimeVerifier,
    ) -> Result<RuntimeTransformer, SettingsError> {
        RuntimeAgent::install_with_codec(settings, resolver, verifier, Arc::new(UnitImageCodec))
    }

    pub fn install_with_codec(
        settings: &Settings,
        resolver: Arc<dyn ClassResolver>,
        verifier: &RuntimeVerifier,
        codec: Arc<dyn ClassCodec>,
    ) -> Result<RuntimeTransformer, SettingsError> {
        let checker = checker_by_name(&settings.checker)?
            .ok_or_else(|| SettingsError::UnknownChecker(settings.checker.clone()))?;

        let safety = Arc::new(FrameworkSafetyFilter::new());
        let policy_filter: Arc<dyn ScopeFilter> = if !settings.checked_classes.is_empty() {
            let classes = ClassListFilter::new(&settings.checked_classes);
            Arc::new(safety.clone().and(classes))
        } else if settings.trust_annotated_for {
            reject_all()
        } else {
            safety.clone()
        };

        let scan_filter: Arc<dyn ScopeFilter> =
            if settings.trust_annotated_for || settings.mode == EnforcementMode::Global {
                safety
            } else {
                policy_filter.clone()
            };

        if let Some(handler) = settings.handler {
            log::info!("Using {} violation handler", handler);
            verifier.set_handler(handler.create());
        }

        log::info!(
            "Enforcing {} in {} mode ({} explicitly checked classes{})",
            checker.name(),
            settings.mode,
            settings.checked_classes.len(),
            if settings.trust_annotated_for {
                ", trusting @AnnotatedFor"
            } else {
                ""
            }
        );

        let marker = Arc::new(MarkerLookup::new(checker.system(), resolver.clone()));
        Ok(RuntimeTransformer {
            checker,
            scan_filter,
            policy_filter,
            trust_annotated_for: settings.trust_annotated_for,
            mode: settings.mode,
            resolver,
            marker,
            codec,
            loaders: DashMap::new(),
        })
    }
}
