//! Nullness: `@NonNull` values must never be `null`
//!
//! References are `@NonNull` unless annotated `@Nullable`. Woven checks call
//! `qualweave/checker/nullness/NullnessRuntimeVerifier.checkNotNull`, whose behaviour is
//! [`NullnessVerifier::check_not_null`].

use super::RuntimeChecker;
use crate::jvm::code::{CodeBuilder, Constant, FieldRef, Instruction, InvokeType, MethodRef};
use crate::jvm::{BinaryName, FieldType, MethodDescriptor, TypeKind, UnqualifiedName};
use crate::qualifiers::{CheckGenerator, ConfigEntry, QualifierRegistry, RegistryError};
use crate::runtime::{AttributionKind, RuntimeVerifier, StackWalker, Violation, ViolationError};
use std::sync::Arc;

pub const CHECKER_NAME: &str = "Nullness";
pub const SYSTEM_NAME: &str = "nullness";

pub struct NullnessChecker {
    registry: QualifierRegistry,
}

impl NullnessChecker {
    pub fn new() -> Result<NullnessChecker, RegistryError> {
        let generator: Arc<dyn CheckGenerator> = Arc::new(NullnessCheckGenerator::default());
        let registry = QualifierRegistry::builder()
            .on_enforce(BinaryName::NONNULL, generator.clone())
            .on_noop(BinaryName::NULLABLE)
            .with_default(ConfigEntry::enforce(generator))
            .build()?;
        Ok(NullnessChecker { registry })
    }
}

impl RuntimeChecker for NullnessChecker {
    fn name(&self) -> &str {
        CHECKER_NAME
    }

    fn system(&self) -> &str {
        SYSTEM_NAME
    }

    fn registry(&self) -> &QualifierRegistry {
        &self.registry
    }
}

/// Emits calls to `NullnessRuntimeVerifier.checkNotNull`
///
/// With [`AttributionKind::Local`] the two-argument overload is used. Otherwise the attribution
/// is passed explicitly as a constant of the runtime `AttributionKind` enum.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NullnessCheckGenerator {
    attribution: AttributionKind,
}

impl NullnessCheckGenerator {
    pub const fn new(attribution: AttributionKind) -> NullnessCheckGenerator {
        NullnessCheckGenerator { attribution }
    }

    fn check_method(&self) -> MethodRef {
        let mut parameters = vec![
            FieldType::object(BinaryName::OBJECT),
            FieldType::object(BinaryName::STRING),
        ];
        if self.attribution != AttributionKind::Local {
            parameters.push(FieldType::object(BinaryName::ATTRIBUTIONKIND));
        }
        MethodRef {
            owner: BinaryName::NULLNESSRUNTIMEVERIFIER,
            name: UnqualifiedName::CHECKNOTNULL,
            descriptor: MethodDescriptor {
                parameters,
                return_type: None,
            },
        }
    }
}

impl Default for NullnessCheckGenerator {
    fn default() -> NullnessCheckGenerator {
        NullnessCheckGenerator::new(AttributionKind::Local)
    }
}

impl CheckGenerator for NullnessCheckGenerator {
    fn generate_check(&self, code: &mut CodeBuilder, kind: TypeKind, diagnostic_name: &str) {
        match kind {
            TypeKind::Reference => (),
            TypeKind::Void => return,
            TypeKind::Long | TypeKind::Double => {
                code.push_instruction(Instruction::Pop2);
                return;
            }
            TypeKind::Int | TypeKind::Float => {
                code.push_instruction(Instruction::Pop);
                return;
            }
        }

        code.push_instruction(Instruction::Ldc(Constant::String(format!(
            "{} must be NonNull",
            diagnostic_name
        ))));
        if self.attribution != AttributionKind::Local {
            code.push_instruction(Instruction::GetStatic(FieldRef {
                owner: BinaryName::ATTRIBUTIONKIND,
                name: self.attribution.field_name(),
                descriptor: FieldType::object(BinaryName::ATTRIBUTIONKIND),
            }));
        }
        code.push_instruction(Instruction::Invoke(InvokeType::Static, self.check_method()));
    }

    fn with_attribution(&self, attribution: AttributionKind) -> Arc<dyn CheckGenerator> {
        Arc::new(NullnessCheckGenerator::new(attribution))
    }

    fn attribution(&self) -> AttributionKind {
        self.attribution
    }
}

/// Runtime half of the nullness checks
pub struct NullnessVerifier;

impl NullnessVerifier {
    /// Report a violation if the checked value is `null`
    ///
    /// Non-null values pass silently. Otherwise the outcome is decided by the verifier's handler.
    pub fn check_not_null(
        verifier: &RuntimeVerifier,
        is_null: bool,
        message: &str,
        attribution: AttributionKind,
        stack: &dyn StackWalker,
    ) -> Result<(), ViolationError> {
        if !is_null {
            return Ok(());
        }
        let violation = Violation {
            checker: CHECKER_NAME.to_owned(),
            message: message.to_owned(),
            attribution,
        };
        verifier.report(violation, stack)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{BranchInstruction, CodeElement};
    use crate::jvm::Error;
    use crate::runtime::{RecordingViolationHandler, StackFrame};

    fn woven(generator: &NullnessCheckGenerator, kind: TypeKind) -> Result<Vec<CodeElement>, Error> {
        let mut code = CodeBuilder::new(3);
        code.push_instruction(Instruction::load_of(kind, 0));
        generator.generate_check(&mut code, kind, "Parameter 0");
        code.push_branch_instruction(BranchInstruction::Return);
        Ok(code.result(vec![])?.elements)
    }

    #[test]
    fn local_checks() -> Result<(), Error> {
        let elements = woven(&NullnessCheckGenerator::default(), TypeKind::Reference)?;
        assert_eq!(
            elements[1],
            CodeElement::Instruction(Instruction::Ldc(Constant::String(String::from(
                "Parameter 0 must be NonNull"
            ))))
        );
        match &elements[2] {
            CodeElement::Instruction(Instruction::Invoke(InvokeType::Static, method)) => {
                assert_eq!(
                    method.to_string(),
                    "qualweave/checker/nullness/NullnessRuntimeVerifier.checkNotNull(Ljava/lang/Object;Ljava/lang/String;)V"
                );
            }
            other => panic!("expected a static call, found {:?}", other),
        }
        assert_eq!(elements.len(), 4);
        Ok(())
    }

    #[test]
    fn caller_checks() -> Result<(), Error> {
        let generator = NullnessCheckGenerator::default().with_attribution(AttributionKind::Caller);
        assert_eq!(generator.attribution(), AttributionKind::Caller);

        let mut code = CodeBuilder::new(1);
        code.push_instruction(Instruction::ALoad(0));
        generator.generate_check(&mut code, TypeKind::Reference, "Parameter 0");
        code.push_branch_instruction(BranchInstruction::Return);
        let code = code.result(vec![])?;
        assert_eq!(code.max_stack, 3);

        match &code.elements[2] {
            CodeElement::Instruction(Instruction::GetStatic(field)) => {
                assert_eq!(field.owner, BinaryName::ATTRIBUTIONKIND);
                assert_eq!(field.name, UnqualifiedName::CALLER);
            }
            other => panic!("expected the attribution constant, found {:?}", other),
        }
        match &code.elements[3] {
            CodeElement::Instruction(Instruction::Invoke(_, method)) => {
                assert_eq!(method.descriptor.parameters.len(), 3);
            }
            other => panic!("expected a static call, found {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn primitives_are_dropped() -> Result<(), Error> {
        let generator = NullnessCheckGenerator::default();
        let elements = woven(&generator, TypeKind::Int)?;
        assert_eq!(elements[1], CodeElement::Instruction(Instruction::Pop));
        let elements = woven(&generator, TypeKind::Long)?;
        assert_eq!(elements[1], CodeElement::Instruction(Instruction::Pop2));
        Ok(())
    }

    #[test]
    fn registry_defaults() {
        let checker = NullnessChecker::new().unwrap();
        let registry = checker.registry();
        assert!(registry.default_generator().is_some());
        assert!(registry.find(&BinaryName::NONNULL).is_some());
        assert!(registry.find(&BinaryName::NULLABLE).unwrap().generator.is_none());
    }

    #[test]
    fn runtime_checks() {
        let handler = Arc::new(RecordingViolationHandler::new());
        let verifier = RuntimeVerifier::with_handler(handler.clone());
        let stack = vec![
            StackFrame::new("qualweave/checker/nullness/NullnessRuntimeVerifier", "checkNotNull"),
            StackFrame::new("com/example/Lib", "process").at("Lib.java", 4),
            StackFrame::new("com/example/App", "main").at("App.java", 12),
        ];

        let passed = NullnessVerifier::check_not_null(
            &verifier,
            false,
            "Parameter 0 must be NonNull",
            AttributionKind::Caller,
            &stack,
        );
        assert!(passed.is_ok());
        assert!(handler.violations().is_empty());

        let failed = NullnessVerifier::check_not_null(
            &verifier,
            true,
            "Parameter 0 must be NonNull",
            AttributionKind::Caller,
            &stack,
        );
        assert!(failed.is_ok());
        let recorded = handler.take();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].violation.checker, "Nullness");
        assert_eq!(recorded[0].violation.message, "Parameter 0 must be NonNull");
    }

    #[test]
    fn throwing_by_default() {
        let verifier = RuntimeVerifier::new();
        let stack: Vec<StackFrame> = vec![StackFrame::new("com/example/App", "main")];
        let err = NullnessVerifier::check_not_null(
            &verifier,
            true,
            "Return value of get must be NonNull",
            AttributionKind::Local,
            &stack,
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("[Nullness Violation] Return value of get must be NonNull"));
    }
}
