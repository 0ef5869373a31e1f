//! Qualifier systems that can be enforced at runtime
//!
//! Each checker bundles the qualifier registry the weaver consults with the name used for
//! violations and `@AnnotatedFor` markers. Only nullness ships for now.

pub mod nullness;

use crate::qualifiers::{QualifierRegistry, RegistryError};
use std::sync::Arc;

/// Qualifier system that can be woven into classes
pub trait RuntimeChecker: Send + Sync {
    /// Name used in violation messages (eg. `Nullness`)
    fn name(&self) -> &str;

    /// System name expected in `@AnnotatedFor` markers (eg. `nullness`)
    fn system(&self) -> &str;

    fn registry(&self) -> &QualifierRegistry;
}

/// Look up a checker by name
///
/// Accepts the short system name, the checker name, or a dotted/slashed class name ending in the
/// checker name (eg. `qualweave.checker.nullness.NullnessRuntimeChecker`). `Ok(None)` means no
/// checker goes by that name.
pub fn checker_by_name(name: &str) -> Result<Option<Arc<dyn RuntimeChecker>>, RegistryError> {
    let simple = name.trim().rsplit(&['.', '/'][..]).next().unwrap_or("");
    match simple.to_ascii_lowercase().as_str() {
        "nullness" | "nullnesschecker" | "nullnessruntimechecker" => {
            Ok(Some(Arc::new(nullness::NullnessChecker::new()?)))
        }
        _ => Ok(None),
    }
}
