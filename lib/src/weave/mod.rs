//! Weaving checks into classes
//!
//! Weaving one class goes through a fixed sequence of steps:
//!
//!  1. The class is classified as checked or unchecked (by the caller, see
//!     [`crate::agent::RuntimeTransformer`]).
//!  2. Each method body is streamed through an [`EnforcementTransform`], which inserts
//!     parameter checks on entry (checked classes only) and checks next to the instructions the
//!     strategy cares about.
//!  3. For checked classes, methods inherited from unchecked ancestors are collected by the
//!     [`HierarchyResolver`] and bridged where the strategy says a check would be skipped.
//!  4. Every rewritten body is verified to be stack-sound.
//!
//! Any failure leaves the class untouched: [`Weaver::weave`] either produces a complete result or
//! an error.

mod bridge;
mod errors;
mod transform;

pub use bridge::*;
pub use errors::*;
pub use transform::*;

use crate::jvm::code::MethodRef;
use crate::jvm::model::ClassModel;
use crate::policy::{InstrumentationStrategy, ProgramPoint};
use crate::resolution::HierarchyResolver;
use crate::scope::ScopeFilter;
use std::fmt;
use std::sync::Arc;

/// Whether a class is subject to enforcement
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeClassification {
    Checked,

    /// Only monitored for effects on checked classes
    Unchecked,
}

impl ScopeClassification {
    pub const fn is_checked(&self) -> bool {
        matches!(self, ScopeClassification::Checked)
    }
}

impl From<bool> for ScopeClassification {
    fn from(checked: bool) -> ScopeClassification {
        if checked {
            ScopeClassification::Checked
        } else {
            ScopeClassification::Unchecked
        }
    }
}

impl fmt::Display for ScopeClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeClassification::Checked => f.write_str("checked"),
            ScopeClassification::Unchecked => f.write_str("unchecked"),
        }
    }
}

/// Check inserted by a weave
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InsertedCheck {
    /// Signature of the method containing the check (eg. `get(I)Ljava/lang/Object;`)
    pub method: String,

    pub point: ProgramPoint,

    /// Name of the checked value in violation messages
    pub diagnostic: String,
}

/// Result of weaving one class
#[derive(Clone, Debug, PartialEq)]
pub struct WeaveOutcome {
    /// Woven class
    pub class: ClassModel,

    /// Every check inserted, in order of insertion
    pub inserted: Vec<InsertedCheck>,

    /// Inherited implementations which got a bridge
    pub bridges: Vec<MethodRef>,
}

/// Per-class inputs to a weave
pub struct WeaveContext<'a> {
    pub classification: ScopeClassification,

    /// Which classes are checked, used to stop the walk for bridge candidates
    pub checked: &'a dyn ScopeFilter,
}

pub struct Weaver {
    strategy: Arc<dyn InstrumentationStrategy>,
    hierarchy: Arc<dyn HierarchyResolver>,
}

impl Weaver {
    pub fn new(
        strategy: Arc<dyn InstrumentationStrategy>,
        hierarchy: Arc<dyn HierarchyResolver>,
    ) -> Weaver {
        Weaver {
            strategy,
            hierarchy,
        }
    }

    pub fn weave(
        &self,
        class: &ClassModel,
        context: &WeaveContext<'_>,
    ) -> Result<WeaveOutcome, Error> {
        let checked = context.classification.is_checked();
        let mut woven = class.clone();
        let mut inserted = vec![];

        for (index, method) in class.methods.iter().enumerate() {
            let code = match &method.code {
                Some(code) => code,
                None => continue,
            };
            let transform =
                EnforcementTransform::new(self.strategy.as_ref(), class, method, checked);
            let (code, checks) = transform
                .transform(code)
                .map_err(|err| Error::Method(method.signature(), err))?;
            woven.methods[index].code = Some(code);
            inserted.extend(checks);
        }

        let mut bridges = vec![];
        if checked && !class.is_interface() {
            let candidates = self
                .hierarchy
                .resolve_bridge_candidates(class, context.checked);
            for parent in &candidates {
                let plan = match BridgePlan::for_parent(self.strategy.as_ref(), parent) {
                    Some(plan) => plan,
                    None => continue,
                };
                let (method, checks) =
                    BridgeEmitter::emit(&plan).map_err(|err| Error::Bridge(plan.signature(), err))?;
                log::debug!("Bridging {} in {}", plan.target(), class.name);
                woven.add_method(method);
                inserted.extend(checks);
                bridges.push(plan.target());
            }
        }

        log::debug!(
            "Wove {} class {} ({} checks, {} bridges)",
            context.classification,
            class.name,
            inserted.len(),
            bridges.len()
        );
        Ok(WeaveOutcome {
            class: woven,
            inserted,
            bridges,
        })
    }
}
