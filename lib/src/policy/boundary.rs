use super::{find_field, find_method, search_superclasses, InstrumentationStrategy};
use crate::checkers::RuntimeChecker;
use crate::jvm::annotations::{annotations_of, Element};
use crate::jvm::code::{FieldRef, MethodRef};
use crate::jvm::model::{FieldModel, MethodModel};
use crate::jvm::{BinaryName, TypeKind, UnqualifiedName};
use crate::qualifiers::{CheckGenerator, QualifierRegistry};
use crate::resolution::{ClassResolver, ParentMethod};
use crate::runtime::AttributionKind;
use crate::scope::ScopeFilter;
use std::sync::Arc;

/// Standard-mode strategy
///
/// Checked classes verify their parameters on entry (blaming the caller), and anything flowing
/// in from outside: reads of their own fields, results of calls into unchecked classes, reads of
/// fields declared by unchecked classes, array elements, and stores to local variables. Writes
/// to their own fields are trusted and return values are never checked (the callee already
/// checked everything it received).
///
/// Unchecked classes referenced across a boundary are consulted (through the resolver) for an
/// explicit opt-out. If they can't be loaded, the check stays.
pub struct BoundaryStrategy {
    checker: Arc<dyn RuntimeChecker>,

    /// Which classes are checked
    checked: Arc<dyn ScopeFilter>,

    resolver: Arc<dyn ClassResolver>,
}

impl BoundaryStrategy {
    pub fn new(
        checker: Arc<dyn RuntimeChecker>,
        checked: Arc<dyn ScopeFilter>,
        resolver: Arc<dyn ClassResolver>,
    ) -> BoundaryStrategy {
        BoundaryStrategy {
            checker,
            checked,
            resolver,
        }
    }

    pub fn registry(&self) -> &QualifierRegistry {
        self.checker.registry()
    }

    pub fn is_checked(&self, class: &BinaryName) -> bool {
        self.checked.test(class)
    }

    pub fn resolver(&self) -> &dyn ClassResolver {
        self.resolver.as_ref()
    }

    /// Default check, unless the element carries an explicit opt-out
    fn default_unless_noop(&self, element: Element<'_>) -> Option<Arc<dyn CheckGenerator>> {
        if self.registry().has_noop(&annotations_of(element)) {
            None
        } else {
            self.registry().default_generator()
        }
    }

    /// Does a field reached through this class opt out of checks?
    ///
    /// Lookup failures are answered with `false`.
    pub(crate) fn field_opts_out(&self, field: &FieldRef) -> bool {
        match find_field(self.resolver(), &field.owner, &field.name) {
            Ok(Some(declaration)) => self
                .registry()
                .has_noop(&annotations_of(Element::Field(&declaration))),
            Ok(None) => false,
            Err(err) => {
                log::debug!("Assuming {} does not opt out: {}", field, err);
                false
            }
        }
    }

    /// Does the return value of a method reached through this class opt out of checks?
    ///
    /// Lookup failures are answered with `false`.
    fn return_opts_out(&self, method: &MethodRef) -> bool {
        match find_method(self.resolver(), method) {
            Ok(Some(declaration)) => self
                .registry()
                .has_noop(&annotations_of(Element::Return(&declaration))),
            Ok(None) => false,
            Err(err) => {
                log::debug!("Assuming {} does not opt out: {}", method, err);
                false
            }
        }
    }
}

impl InstrumentationStrategy for BoundaryStrategy {
    fn parameter_check(
        &self,
        method: &MethodModel,
        index: u16,
        kind: TypeKind,
    ) -> Option<Arc<dyn CheckGenerator>> {
        if !kind.is_reference() {
            return None;
        }
        self.registry()
            .resolve(&annotations_of(Element::Parameter(method, index)))
            .map(|generator| generator.with_attribution(AttributionKind::Caller))
    }

    fn field_write_check(
        &self,
        _field: &FieldModel,
        _kind: TypeKind,
    ) -> Option<Arc<dyn CheckGenerator>> {
        None
    }

    fn field_read_check(
        &self,
        field: &FieldModel,
        kind: TypeKind,
    ) -> Option<Arc<dyn CheckGenerator>> {
        if !kind.is_reference() {
            return None;
        }
        self.registry()
            .resolve(&annotations_of(Element::Field(field)))
    }

    fn return_check(&self, _method: &MethodModel) -> Option<Arc<dyn CheckGenerator>> {
        None
    }

    fn local_store_check(
        &self,
        method: &MethodModel,
        slot: u16,
        kind: TypeKind,
    ) -> Option<Arc<dyn CheckGenerator>> {
        if !kind.is_reference() {
            return None;
        }
        self.registry()
            .resolve(&annotations_of(Element::LocalVariable(method, slot)))
    }

    fn array_store_check(&self, component: TypeKind) -> Option<Arc<dyn CheckGenerator>> {
        if !component.is_reference() {
            return None;
        }
        self.registry().default_generator()
    }

    fn array_load_check(&self, component: TypeKind) -> Option<Arc<dyn CheckGenerator>> {
        if !component.is_reference() {
            return None;
        }
        self.registry().default_generator()
    }

    fn boundary_call_check(&self, method: &MethodRef) -> Option<Arc<dyn CheckGenerator>> {
        if self.is_checked(&method.owner) || !method.descriptor.return_kind().is_reference() {
            return None;
        }
        let generator = self.registry().default_generator()?;
        if self.return_opts_out(method) {
            log::debug!("Result of {} opts out of checks", method);
            return None;
        }
        Some(generator)
    }

    fn boundary_field_read_check(&self, field: &FieldRef) -> Option<Arc<dyn CheckGenerator>> {
        if self.is_checked(&field.owner) || !field.kind().is_reference() {
            return None;
        }
        let generator = self.registry().default_generator()?;
        if self.field_opts_out(field) {
            log::debug!("Field {} opts out of checks", field);
            return None;
        }
        Some(generator)
    }

    fn field_declaring_class(
        &self,
        start: &BinaryName,
        name: &UnqualifiedName,
    ) -> Option<BinaryName> {
        let declaring = search_superclasses(self.resolver(), start, |class| {
            class.find_field(name).map(|_| class.name.clone())
        });
        match declaring {
            Ok(declaring) => declaring,
            Err(err) => {
                log::debug!("Could not find the declaration of field {}: {}", name, err);
                None
            }
        }
    }

    fn should_generate_bridge(&self, parent: &ParentMethod) -> bool {
        if parent.owner == BinaryName::OBJECT {
            return false;
        }
        let method = &parent.method;
        let default_enforced = self.registry().default_generator().is_some();

        for (index, parameter) in method.descriptor.parameters.iter().enumerate() {
            let qualifiers = annotations_of(Element::Parameter(method, index as u16));
            if self.registry().has_enforce(&qualifiers) {
                return true;
            }
            let opted_out = self.registry().has_noop(&qualifiers);
            if parameter.is_reference() && !opted_out && default_enforced {
                return true;
            }
        }

        if method.descriptor.return_kind().is_reference() {
            let qualifiers = annotations_of(Element::Return(method));
            if self.registry().has_enforce(&qualifiers) {
                return true;
            }
            if !self.registry().has_noop(&qualifiers) && default_enforced {
                return true;
            }
        }

        false
    }

    fn bridge_parameter_check(
        &self,
        parent: &ParentMethod,
        index: u16,
    ) -> Option<Arc<dyn CheckGenerator>> {
        let method = &parent.method;
        let parameter = method.descriptor.parameters.get(index as usize)?;
        if !parameter.is_reference() {
            return None;
        }
        let element = Element::Parameter(method, index);
        let generator = match self.registry().resolve(&annotations_of(element)) {
            Some(generator) => generator,
            None => self.default_unless_noop(element)?,
        };
        Some(generator.with_attribution(AttributionKind::Caller))
    }

    fn bridge_return_check(&self, parent: &ParentMethod) -> Option<Arc<dyn CheckGenerator>> {
        let method = &parent.method;
        if !method.descriptor.return_kind().is_reference() {
            return None;
        }
        let element = Element::Return(method);
        let generator = match self.registry().resolve(&annotations_of(element)) {
            Some(generator) => Some(generator),
            None => self.default_unless_noop(element),
        };
        generator.map(|generator| generator.with_attribution(AttributionKind::Caller))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::checkers::nullness::NullnessChecker;
    use crate::jvm::annotations::Annotation;
    use crate::jvm::model::ClassModel;
    use crate::jvm::{
        ClassAccessFlags, FieldAccessFlags, FieldType, MethodAccessFlags, MethodDescriptor, Name,
        ParseDescriptor, UnqualifiedName,
    };
    use crate::resolution::MapResolver;
    use crate::scope::ClassListFilter;

    fn name(name: &str) -> BinaryName {
        BinaryName::from_str(name).unwrap()
    }

    fn method(descriptor: &str) -> MethodModel {
        MethodModel::new(
            UnqualifiedName::from_str("run").unwrap(),
            MethodDescriptor::parse(descriptor).unwrap(),
            MethodAccessFlags::PUBLIC,
        )
    }

    fn library() -> MapResolver {
        let mut lib = ClassModel::new(
            name("lib/Lib"),
            Some(BinaryName::OBJECT),
            ClassAccessFlags::PUBLIC,
        );
        let mut lenient = FieldModel::new(
            UnqualifiedName::from_str("lenient").unwrap(),
            FieldType::object(BinaryName::STRING),
            FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC,
        );
        lenient.annotations.push(Annotation::marker(BinaryName::NULLABLE));
        lib.add_field(lenient);
        lib.add_field(FieldModel::new(
            UnqualifiedName::from_str("strict").unwrap(),
            FieldType::object(BinaryName::STRING),
            FieldAccessFlags::PUBLIC | FieldAccessFlags::STATIC,
        ));
        let mut lookup = method("()Ljava/lang/String;");
        lookup.name = UnqualifiedName::from_str("lookup").unwrap();
        lookup.annotations.push(Annotation::marker(BinaryName::NULLABLE));
        lib.add_method(lookup);
        MapResolver::new().with(lib)
    }

    fn strategy() -> BoundaryStrategy {
        BoundaryStrategy::new(
            Arc::new(NullnessChecker::new().unwrap()),
            Arc::new(ClassListFilter::new(["app/App"])),
            Arc::new(library()),
        )
    }

    fn field_ref(owner: &str, field: &str) -> FieldRef {
        FieldRef {
            owner: name(owner),
            name: UnqualifiedName::from_str(field).unwrap(),
            descriptor: FieldType::object(BinaryName::STRING),
        }
    }

    fn method_ref(owner: &str, method: &str, descriptor: &str) -> MethodRef {
        MethodRef {
            owner: name(owner),
            name: UnqualifiedName::from_str(method).unwrap(),
            descriptor: MethodDescriptor::parse(descriptor).unwrap(),
        }
    }

    #[test]
    fn parameters() {
        let strategy = strategy();
        let mut method = method("(Ljava/lang/String;ILjava/lang/Object;)V");
        method.parameter_annotations = vec![
            vec![],
            vec![],
            vec![Annotation::marker(BinaryName::NULLABLE)],
        ];

        // Unannotated references are checked, blaming the caller
        let check = strategy.parameter_check(&method, 0, TypeKind::Reference).unwrap();
        assert_eq!(check.attribution(), AttributionKind::Caller);

        assert!(strategy.parameter_check(&method, 1, TypeKind::Int).is_none());
        assert!(strategy.parameter_check(&method, 2, TypeKind::Reference).is_none());
    }

    #[test]
    fn own_fields_are_trusted_on_write() {
        let strategy = strategy();
        let field = FieldModel::new(
            UnqualifiedName::from_str("value").unwrap(),
            FieldType::object(BinaryName::STRING),
            FieldAccessFlags::PRIVATE,
        );

        // Writes are trusted, reads are not
        assert!(strategy.field_write_check(&field, TypeKind::Reference).is_none());
        let read = strategy.field_read_check(&field, TypeKind::Reference).unwrap();
        assert_eq!(read.attribution(), AttributionKind::Local);
        assert!(strategy.return_check(&method("()Ljava/lang/String;")).is_none());
    }

    #[test]
    fn boundary_reads() {
        let strategy = strategy();
        assert!(strategy
            .boundary_field_read_check(&field_ref("lib/Lib", "strict"))
            .is_some());
        assert!(strategy
            .boundary_field_read_check(&field_ref("lib/Lib", "lenient"))
            .is_none());

        // Checked owners are trusted, unknown owners are not
        assert!(strategy
            .boundary_field_read_check(&field_ref("app/App", "strict"))
            .is_none());
        assert!(strategy
            .boundary_field_read_check(&field_ref("lib/Missing", "strict"))
            .is_some());
    }

    #[test]
    fn boundary_calls() {
        let strategy = strategy();
        assert!(strategy
            .boundary_call_check(&method_ref("lib/Lib", "lookup", "()Ljava/lang/String;"))
            .is_none());
        assert!(strategy
            .boundary_call_check(&method_ref("lib/Lib", "other", "()Ljava/lang/String;"))
            .is_some());
        assert!(strategy
            .boundary_call_check(&method_ref("lib/Lib", "count", "()I"))
            .is_none());
        assert!(strategy
            .boundary_call_check(&method_ref("app/App", "other", "()Ljava/lang/String;"))
            .is_none());
    }

    #[test]
    fn bridges() {
        let strategy = strategy();
        let parent = |descriptor: &str| ParentMethod {
            owner: name("lib/Base"),
            method: method(descriptor),
        };

        assert!(strategy.should_generate_bridge(&parent("()Ljava/lang/String;")));
        assert!(strategy.should_generate_bridge(&parent("(Ljava/lang/String;)V")));
        assert!(!strategy.should_generate_bridge(&parent("(IJ)I")));

        let mut opted_out = parent("()Ljava/lang/String;");
        opted_out.method.annotations.push(Annotation::marker(BinaryName::NULLABLE));
        assert!(!strategy.should_generate_bridge(&opted_out));
        assert!(strategy.bridge_return_check(&opted_out).is_none());

        let mut from_object = parent("()Ljava/lang/String;");
        from_object.owner = BinaryName::OBJECT;
        assert!(!strategy.should_generate_bridge(&from_object));

        let mixed = parent("(ILjava/lang/String;)Ljava/lang/Object;");
        assert!(strategy.bridge_parameter_check(&mixed, 0).is_none());
        let check = strategy.bridge_parameter_check(&mixed, 1).unwrap();
        assert_eq!(check.attribution(), AttributionKind::Caller);
        let check = strategy.bridge_return_check(&mixed).unwrap();
        assert_eq!(check.attribution(), AttributionKind::Caller);
    }

    #[test]
    fn arrays_and_locals() {
        let strategy = strategy();
        assert!(strategy.array_store_check(TypeKind::Reference).is_some());
        assert!(strategy.array_load_check(TypeKind::Reference).is_some());
        assert!(strategy.array_load_check(TypeKind::Int).is_none());

        let method = method("()V");
        assert!(strategy.local_store_check(&method, 1, TypeKind::Reference).is_some());
        assert!(strategy.local_store_check(&method, 1, TypeKind::Long).is_none());
    }
}
