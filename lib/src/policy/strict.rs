use super::{BoundaryStrategy, InstrumentationStrategy};
use crate::jvm::annotations::{annotations_of, Element};
use crate::jvm::code::{FieldRef, MethodRef};
use crate::jvm::model::{ClassModel, FieldModel, MethodModel};
use crate::jvm::{BinaryName, TypeKind, UnqualifiedName};
use crate::qualifiers::CheckGenerator;
use crate::resolution::ParentMethod;
use crate::scope::MarkerLookup;
use std::collections::HashSet;
use std::sync::Arc;

/// Global-mode strategy
///
/// On top of everything [`BoundaryStrategy`] checks, this also stops unchecked code from
/// poisoning checked state:
///
///   - writes into reference fields of checked classes (unless the field opts out)
///   - values returned by unchecked overrides of methods declared in checked ancestors
///
/// A class counts as checked if the scope filter says so or if it carries the `@AnnotatedFor`
/// marker for the checker's system.
pub struct StrictBoundaryStrategy {
    base: BoundaryStrategy,
    marker: Arc<MarkerLookup>,
}

impl StrictBoundaryStrategy {
    pub fn new(base: BoundaryStrategy, marker: Arc<MarkerLookup>) -> StrictBoundaryStrategy {
        StrictBoundaryStrategy { base, marker }
    }

    fn is_checked(&self, class: &BinaryName) -> bool {
        self.base.is_checked(class) || self.marker.is_marked(class)
    }

    fn is_checked_model(&self, class: &ClassModel) -> bool {
        self.base.is_checked(&class.name) || self.marker.has_marker(class)
    }
}

impl InstrumentationStrategy for StrictBoundaryStrategy {
    fn parameter_check(
        &self,
        method: &MethodModel,
        index: u16,
        kind: TypeKind,
    ) -> Option<Arc<dyn CheckGenerator>> {
        self.base.parameter_check(method, index, kind)
    }

    fn field_write_check(
        &self,
        field: &FieldModel,
        kind: TypeKind,
    ) -> Option<Arc<dyn CheckGenerator>> {
        self.base.field_write_check(field, kind)
    }

    fn field_read_check(
        &self,
        field: &FieldModel,
        kind: TypeKind,
    ) -> Option<Arc<dyn CheckGenerator>> {
        self.base.field_read_check(field, kind)
    }

    fn return_check(&self, method: &MethodModel) -> Option<Arc<dyn CheckGenerator>> {
        self.base.return_check(method)
    }

    fn local_store_check(
        &self,
        method: &MethodModel,
        slot: u16,
        kind: TypeKind,
    ) -> Option<Arc<dyn CheckGenerator>> {
        self.base.local_store_check(method, slot, kind)
    }

    fn array_store_check(&self, component: TypeKind) -> Option<Arc<dyn CheckGenerator>> {
        self.base.array_store_check(component)
    }

    fn array_load_check(&self, component: TypeKind) -> Option<Arc<dyn CheckGenerator>> {
        self.base.array_load_check(component)
    }

    fn boundary_call_check(&self, method: &MethodRef) -> Option<Arc<dyn CheckGenerator>> {
        self.base.boundary_call_check(method)
    }

    fn boundary_field_read_check(&self, field: &FieldRef) -> Option<Arc<dyn CheckGenerator>> {
        self.base.boundary_field_read_check(field)
    }

    fn boundary_field_write_check(&self, field: &FieldRef) -> Option<Arc<dyn CheckGenerator>> {
        if !field.kind().is_reference() || !self.is_checked(&field.owner) {
            return None;
        }
        if self.base.field_opts_out(field) {
            log::debug!("Field {} opts out of checks", field);
            return None;
        }
        self.base.registry().default_generator()
    }

    fn unchecked_override_return_check(
        &self,
        class: &ClassModel,
        method: &MethodModel,
    ) -> Option<Arc<dyn CheckGenerator>> {
        let mut visited = HashSet::new();
        let mut current = class.superclass.clone();
        while let Some(ancestor_name) = current {
            if ancestor_name == BinaryName::OBJECT || !visited.insert(ancestor_name.clone()) {
                break;
            }
            let ancestor = match self.base.resolver().load(&ancestor_name) {
                Ok(ancestor) => ancestor,
                Err(err) => {
                    log::debug!("Skipping override check of {}: {}", method.signature(), err);
                    return None;
                }
            };

            if self.is_checked_model(&ancestor) {
                if let Some(overridden) = ancestor.find_method(&method.name, &method.descriptor) {
                    let registry = self.base.registry();
                    if registry.has_noop(&annotations_of(Element::Return(overridden))) {
                        return None;
                    }
                    if overridden.descriptor.return_kind().is_reference() {
                        return registry.default_generator();
                    }
                }
            }

            current = ancestor.superclass;
        }
        None
    }

    fn field_declaring_class(
        &self,
        start: &BinaryName,
        name: &UnqualifiedName,
    ) -> Option<BinaryName> {
        self.base.field_declaring_class(start, name)
    }

    fn should_generate_bridge(&self, parent: &ParentMethod) -> bool {
        self.base.should_generate_bridge(parent)
    }

    fn bridge_parameter_check(
        &self,
        parent: &ParentMethod,
        index: u16,
    ) -> Option<Arc<dyn CheckGenerator>> {
        self.base.bridge_parameter_check(parent, index)
    }

    fn bridge_return_check(&self, parent: &ParentMethod) -> Option<Arc<dyn CheckGenerator>> {
        self.base.bridge_return_check(parent)
    }
}
