//! Qualifier systems, as seen by the weaver
//!
//! A qualifier system (eg. nullness) is described by a [`QualifierRegistry`]: which qualifiers
//! demand a check ([`ValidationKind::Enforce`], along with the [`CheckGenerator`] emitting it),
//! which qualifiers explicitly opt out ([`ValidationKind::Noop`]), and what happens to elements
//! with neither (the default entry).

mod registry;

pub use registry::*;

use crate::jvm::code::CodeBuilder;
use crate::jvm::TypeKind;
use crate::runtime::AttributionKind;
use std::sync::Arc;

/// Emits the instructions for one runtime check
///
/// Generators are stateless apart from the attribution baked into the checks they emit.
pub trait CheckGenerator: Send + Sync {
    /// Emit a check of the value on the top of the stack
    ///
    /// The check consumes the value, so callers that still need it should duplicate it first.
    /// Values of primitive kinds can't violate a qualifier and are just popped. The diagnostic
    /// name ends up in the violation message (eg. `Parameter 0`).
    fn generate_check(&self, code: &mut CodeBuilder, kind: TypeKind, diagnostic_name: &str);

    /// Same generator, but blaming violations on a different frame
    fn with_attribution(&self, attribution: AttributionKind) -> Arc<dyn CheckGenerator>;

    fn attribution(&self) -> AttributionKind;
}
