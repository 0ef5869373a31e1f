use super::CheckGenerator;
use crate::jvm::annotations::QualifierRef;
use crate::jvm::BinaryName;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What a qualifier asks the weaver to do
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValidationKind {
    /// Insert a runtime check
    Enforce,

    /// Explicitly opt out of checking
    Noop,
}

/// Registered behaviour of one qualifier
///
/// An [`ValidationKind::Enforce`] entry always has a generator and a [`ValidationKind::Noop`]
/// entry never does. [`QualifierRegistryBuilder::build`] rejects anything else.
#[derive(Clone)]
pub struct ConfigEntry {
    pub kind: ValidationKind,
    pub generator: Option<Arc<dyn CheckGenerator>>,
}

impl ConfigEntry {
    pub fn enforce(generator: Arc<dyn CheckGenerator>) -> ConfigEntry {
        ConfigEntry {
            kind: ValidationKind::Enforce,
            generator: Some(generator),
        }
    }

    pub fn noop() -> ConfigEntry {
        ConfigEntry {
            kind: ValidationKind::Noop,
            generator: None,
        }
    }

    fn is_consistent(&self) -> bool {
        match self.kind {
            ValidationKind::Enforce => self.generator.is_some(),
            ValidationKind::Noop => self.generator.is_none(),
        }
    }
}

impl fmt::Debug for ConfigEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigEntry")
            .field("kind", &self.kind)
            .field("has_generator", &self.generator.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Entry kind and generator presence disagree
    InconsistentEntry(Option<BinaryName>),

    /// The same qualifier was registered twice
    DuplicateQualifier(BinaryName),

    /// No default entry was provided
    MissingDefault,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::InconsistentEntry(Some(qualifier)) => write!(
                f,
                "entry for {} must have a generator exactly when it is enforced",
                qualifier
            ),
            RegistryError::InconsistentEntry(None) => write!(
                f,
                "default entry must have a generator exactly when it is enforced"
            ),
            RegistryError::DuplicateQualifier(qualifier) => {
                write!(f, "qualifier {} is registered more than once", qualifier)
            }
            RegistryError::MissingDefault => write!(f, "no default entry was provided"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Mapping from qualifiers to what should be done about them
///
/// Immutable once built, so it can be shared freely between weaves.
#[derive(Debug, Clone)]
pub struct QualifierRegistry {
    entries: HashMap<BinaryName, ConfigEntry>,
    default_entry: ConfigEntry,
}

impl QualifierRegistry {
    pub fn builder() -> QualifierRegistryBuilder {
        QualifierRegistryBuilder::default()
    }

    pub fn find(&self, qualifier: &BinaryName) -> Option<&ConfigEntry> {
        self.entries.get(qualifier)
    }

    /// Entry used for elements that carry no registered qualifier
    pub fn default_entry(&self) -> &ConfigEntry {
        &self.default_entry
    }

    /// Generator of the default entry, if it is enforced
    pub fn default_generator(&self) -> Option<Arc<dyn CheckGenerator>> {
        match self.default_entry.kind {
            ValidationKind::Enforce => self.default_entry.generator.clone(),
            ValidationKind::Noop => None,
        }
    }

    /// Resolve the qualifiers on one element into a generator
    ///
    /// Only qualifiers on the element itself count (not those nested inside its type). An
    /// explicitly enforced qualifier wins, then an opt-out suppresses the default, and otherwise
    /// the default applies.
    pub fn resolve(&self, qualifiers: &[QualifierRef]) -> Option<Arc<dyn CheckGenerator>> {
        if let Some(entry) = self.first_with_kind(qualifiers, ValidationKind::Enforce) {
            return entry.generator.clone();
        }
        if self.has_noop(qualifiers) {
            return None;
        }
        self.default_generator()
    }

    /// Does the element carry an explicit opt-out?
    pub fn has_noop(&self, qualifiers: &[QualifierRef]) -> bool {
        self.first_with_kind(qualifiers, ValidationKind::Noop)
            .is_some()
    }

    /// Does the element carry an explicitly enforced qualifier?
    pub fn has_enforce(&self, qualifiers: &[QualifierRef]) -> bool {
        self.first_with_kind(qualifiers, ValidationKind::Enforce)
            .is_some()
    }

    fn first_with_kind(
        &self,
        qualifiers: &[QualifierRef],
        kind: ValidationKind,
    ) -> Option<&ConfigEntry> {
        qualifiers
            .iter()
            .filter(|qualifier| qualifier.is_top_level())
            .filter_map(|qualifier| self.find(&qualifier.qualifier))
            .find(|entry| entry.kind == kind)
    }
}

#[derive(Default)]
pub struct QualifierRegistryBuilder {
    entries: Vec<(BinaryName, ConfigEntry)>,
    default_entry: Option<ConfigEntry>,
}

impl QualifierRegistryBuilder {
    pub fn register(mut self, qualifier: BinaryName, entry: ConfigEntry) -> Self {
        self.entries.push((qualifier, entry));
        self
    }

    /// Elements with this qualifier are checked using the generator
    pub fn on_enforce(self, qualifier: BinaryName, generator: Arc<dyn CheckGenerator>) -> Self {
        self.register(qualifier, ConfigEntry::enforce(generator))
    }

    /// Elements with this qualifier are never checked
    pub fn on_noop(self, qualifier: BinaryName) -> Self {
        self.register(qualifier, ConfigEntry::noop())
    }

    pub fn with_default(mut self, entry: ConfigEntry) -> Self {
        self.default_entry = Some(entry);
        self
    }

    pub fn build(self) -> Result<QualifierRegistry, RegistryError> {
        let default_entry = self.default_entry.ok_or(RegistryError::MissingDefault)?;
        if !default_entry.is_consistent() {
            return Err(RegistryError::InconsistentEntry(None));
        }

        let mut entries = HashMap::new();
        for (qualifier, entry) in self.entries {
            if !entry.is_consistent() {
                return Err(RegistryError::InconsistentEntry(Some(qualifier)));
            }
            if entries.contains_key(&qualifier) {
                return Err(RegistryError::DuplicateQualifier(qualifier));
            }
            entries.insert(qualifier, entry);
        }

        Ok(QualifierRegistry {
            entries,
            default_entry,
        })
    }
}
