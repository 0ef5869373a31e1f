//! Deciding where checks go
//!
//! An [`InstrumentationStrategy`] answers, for each kind of program point the weaver visits,
//! whether a check applies there and which [`CheckGenerator`] emits it. Only reference values are
//! ever checked: every query answers `None` for primitive kinds.
//!
//! There are two strategies, one per enforcement mode:
//!
//!   - [`BoundaryStrategy`] (standard mode) checks entry points of checked classes, reads of
//!     their own fields, and values flowing in from unchecked code (call results, foreign field
//!     reads, array elements)
//!
//!   - [`StrictBoundaryStrategy`] (global mode) additionally guards checked state against
//!     unchecked code: writes into fields of checked classes, and values returned from unchecked
//!     overrides of checked methods

mod boundary;
mod point;
mod strict;

pub use boundary::*;
pub use point::*;
pub use strict::*;

use crate::jvm::code::{FieldRef, MethodRef};
use crate::jvm::model::{ClassModel, FieldModel, MethodModel};
use crate::jvm::{BinaryName, TypeKind, UnqualifiedName};
use crate::qualifiers::CheckGenerator;
use crate::resolution::{ClassResolver, LookupError, ParentMethod};
use std::collections::HashSet;
use std::sync::Arc;

/// Rules for when to insert a runtime check
pub trait InstrumentationStrategy: Send + Sync {
    /// Check of a parameter on entry to a method of a checked class
    fn parameter_check(
        &self,
        method: &MethodModel,
        index: u16,
        kind: TypeKind,
    ) -> Option<Arc<dyn CheckGenerator>>;

    /// Check of a value written to a field of the class being woven
    fn field_write_check(&self, field: &FieldModel, kind: TypeKind)
        -> Option<Arc<dyn CheckGenerator>>;

    /// Check of a value read from a field of the class being woven
    fn field_read_check(&self, field: &FieldModel, kind: TypeKind)
        -> Option<Arc<dyn CheckGenerator>>;

    /// Check of a value returned from a method of a checked class
    fn return_check(&self, method: &MethodModel) -> Option<Arc<dyn CheckGenerator>>;

    /// Check of a value stored into a local variable
    fn local_store_check(
        &self,
        method: &MethodModel,
        slot: u16,
        kind: TypeKind,
    ) -> Option<Arc<dyn CheckGenerator>>;

    /// Check of a value stored into an array with the given component kind
    fn array_store_check(&self, component: TypeKind) -> Option<Arc<dyn CheckGenerator>>;

    /// Check of a value loaded from an array with the given component kind
    fn array_load_check(&self, component: TypeKind) -> Option<Arc<dyn CheckGenerator>>;

    /// Check of the value returned by a call made from checked code
    fn boundary_call_check(&self, method: &MethodRef) -> Option<Arc<dyn CheckGenerator>>;

    /// Check of a value read from a field of some other class
    fn boundary_field_read_check(&self, field: &FieldRef) -> Option<Arc<dyn CheckGenerator>>;

    /// Check of a value written to a field of some other class
    fn boundary_field_write_check(&self, _field: &FieldRef) -> Option<Arc<dyn CheckGenerator>> {
        None
    }

    /// Check of a value returned from a method of an unchecked class
    ///
    /// This is relevant when the method overrides one declared by a checked ancestor.
    fn unchecked_override_return_check(
        &self,
        _class: &ClassModel,
        _method: &MethodModel,
    ) -> Option<Arc<dyn CheckGenerator>> {
        None
    }

    /// Class declaring a field that was referenced through a class which doesn't declare it
    ///
    /// The search starts at `start` and walks up through its superclasses.
    fn field_declaring_class(
        &self,
        _start: &BinaryName,
        _name: &UnqualifiedName,
    ) -> Option<BinaryName> {
        None
    }

    /// Would inheriting this method unmodified skip any checks?
    fn should_generate_bridge(&self, parent: &ParentMethod) -> bool;

    /// Check of a parameter on entry to a bridge
    fn bridge_parameter_check(
        &self,
        parent: &ParentMethod,
        index: u16,
    ) -> Option<Arc<dyn CheckGenerator>>;

    /// Check of the value returned from the inherited implementation through a bridge
    fn bridge_return_check(&self, _parent: &ParentMethod) -> Option<Arc<dyn CheckGenerator>> {
        None
    }
}

/// Load a class, walking up superclasses until a predicate finds what it is looking for
///
/// Lookup failures end the walk with an error. Running out of superclasses ends it with `None`.
fn search_superclasses<T>(
    resolver: &dyn ClassResolver,
    start: &BinaryName,
    mut found: impl FnMut(&ClassModel) -> Option<T>,
) -> Result<Option<T>, LookupError> {
    let mut visited = HashSet::new();
    let mut current = Some(start.clone());
    while let Some(name) = current {
        if !visited.insert(name.clone()) {
            break;
        }
        let class = resolver.load(&name)?;
        if let Some(result) = found(&class) {
            return Ok(Some(result));
        }
        current = class.superclass;
    }
    Ok(None)
}

/// Find the declaration of a field referenced through some class
fn find_field(
    resolver: &dyn ClassResolver,
    owner: &BinaryName,
    name: &UnqualifiedName,
) -> Result<Option<FieldModel>, LookupError> {
    search_superclasses(resolver, owner, |class| class.find_field(name).cloned())
}

/// Find the declaration of a method referenced through some class
fn find_method(
    resolver: &dyn ClassResolver,
    method: &MethodRef,
) -> Result<Option<MethodModel>, LookupError> {
    search_superclasses(resolver, &method.owner, |class| {
        class
            .find_method(&method.name, &method.descriptor)
            .cloned()
    })
}
