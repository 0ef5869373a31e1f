use super::InsertedCheck;
use crate::jvm::code::{
    BranchInstruction, Code, CodeBuilder, CodeElement, FieldRef, Instruction, MethodRef,
};
use crate::jvm::model::{ClassModel, MethodModel};
use crate::jvm::{Error, TypeKind};
use crate::policy::{InstrumentationStrategy, ProgramPoint};
use crate::qualifiers::CheckGenerator;
use std::sync::Arc;

/// Rewrites one method body, inserting the checks the strategy asks for
///
/// The body is streamed through once. Checks of values about to be consumed (field writes,
/// returns, array stores) go right before the instruction. Checks of values just produced
/// (field reads, call results, array loads, local stores) go right after it. In unchecked
/// classes, only field writes and returns are considered.
///
/// Parameter checks of checked methods are emitted once, before the first element of the body,
/// or right after it if that element is a line number (so the checks are attributed to the
/// first line of the method).
pub struct EnforcementTransform<'a> {
    strategy: &'a dyn InstrumentationStrategy,
    class: &'a ClassModel,
    method: &'a MethodModel,
    checked: bool,
    entry_checks_emitted: bool,
    inserted: Vec<InsertedCheck>,
}

impl<'a> EnforcementTransform<'a> {
    pub fn new(
        strategy: &'a dyn InstrumentationStrategy,
        class: &'a ClassModel,
        method: &'a MethodModel,
        checked: bool,
    ) -> EnforcementTransform<'a> {
        EnforcementTransform {
            strategy,
            class,
            method,
            checked,
            entry_checks_emitted: !checked,
            inserted: vec![],
        }
    }

    /// Produce the rewritten body, along with the checks that were inserted into it
    pub fn transform(mut self, code: &Code) -> Result<(Code, Vec<InsertedCheck>), Error> {
        let mut builder = CodeBuilder::rewriting(code);
        for element in &code.elements {
            self.accept(&mut builder, element)?;
        }
        let code = builder.result(code.exception_handlers.clone())?;
        Ok((code, self.inserted))
    }

    fn accept(&mut self, builder: &mut CodeBuilder, element: &CodeElement) -> Result<(), Error> {
        if !self.entry_checks_emitted {
            self.entry_checks_emitted = true;
            if let CodeElement::LineNumber(_) = element {
                builder.push_element(element.clone())?;
                self.emit_parameter_checks(builder);
                return Ok(());
            }
            self.emit_parameter_checks(builder);
        }

        match element {
            CodeElement::Instruction(instruction) => self.accept_instruction(builder, instruction),
            CodeElement::Branch(BranchInstruction::AReturn) => {
                self.emit_return_check(builder);
                builder.push_branch_instruction(BranchInstruction::AReturn);
            }
            other => builder.push_element(other.clone())?,
        }
        Ok(())
    }

    fn accept_instruction(&mut self, builder: &mut CodeBuilder, instruction: &Instruction) {
        match instruction {
            Instruction::PutField(field) | Instruction::PutStatic(field) => {
                let is_static = matches!(instruction, Instruction::PutStatic(_));
                self.emit_field_write_check(builder, field, is_static);
                builder.push_instruction(instruction.clone());
            }
            Instruction::GetField(field) | Instruction::GetStatic(field) => {
                builder.push_instruction(instruction.clone());
                if self.checked {
                    self.emit_field_read_check(builder, field);
                }
            }
            Instruction::Invoke(_, method) => {
                builder.push_instruction(instruction.clone());
                if self.checked {
                    self.emit_call_check(builder, method);
                }
            }
            Instruction::AAStore => {
                if self.checked {
                    self.emit_array_store_check(builder);
                }
                builder.push_instruction(Instruction::AAStore);
            }
            Instruction::AALoad => {
                builder.push_instruction(Instruction::AALoad);
                if self.checked {
                    self.emit_array_load_check(builder);
                }
            }
            Instruction::AStore(slot) => {
                builder.push_instruction(Instruction::AStore(*slot));
                if self.checked {
                    self.emit_local_store_check(builder, *slot);
                }
            }
            other => builder.push_instruction(other.clone()),
        }
    }

    fn emit(
        &mut self,
        builder: &mut CodeBuilder,
        generator: &Arc<dyn CheckGenerator>,
        kind: TypeKind,
        point: ProgramPoint,
        diagnostic: String,
    ) {
        log::debug!(
            "Checking {} in {}.{}",
            point,
            self.class.name,
            self.method.signature()
        );
        generator.generate_check(builder, kind, &diagnostic);
        self.inserted.push(InsertedCheck {
            method: self.method.signature(),
            point,
            diagnostic,
        });
    }

    fn emit_parameter_checks(&mut self, builder: &mut CodeBuilder) {
        let mut slot: u16 = if self.method.is_static() { 0 } else { 1 };
        for (index, parameter) in self.method.descriptor.parameters.iter().enumerate() {
            let index = index as u16;
            let kind = TypeKind::from(parameter);
            if let Some(generator) = self.strategy.parameter_check(self.method, index, kind) {
                builder.push_instruction(Instruction::load_of(kind, slot));
                let diagnostic = format!("Parameter {}", index);
                let point = ProgramPoint::Parameter(index);
                self.emit(builder, &generator, kind, point, diagnostic);
            }
            slot += kind.slot_size() as u16;
        }
    }

    fn emit_field_write_check(
        &mut self,
        builder: &mut CodeBuilder,
        field: &FieldRef,
        is_static: bool,
    ) {
        let kind = field.kind();
        if kind.slot_size() != 1 {
            return;
        }
        let generator = if field.owner != self.class.name {
            self.strategy.boundary_field_write_check(field)
        } else {
            match self.class.find_field(&field.name) {
                Some(declared) if declared.descriptor == field.descriptor => {
                    self.strategy.field_write_check(declared, kind)
                }
                Some(_) => None,
                None => self
                    .inherited_field(field)
                    .and_then(|inherited| self.strategy.boundary_field_write_check(&inherited)),
            }
        };
        let generator = match generator {
            Some(generator) => generator,
            None => return,
        };

        let point = ProgramPoint::FieldWrite {
            owner: field.owner.clone(),
            name: field.name.clone(),
        };
        if is_static {
            builder.push_instruction(Instruction::Dup);
            let diagnostic = format!("Static Field '{}'", field.name);
            self.emit(builder, &generator, kind, point, diagnostic);
        } else {
            // `objectref, value` becomes `value, objectref, value`, then `value, objectref`
            builder.push_instruction(Instruction::DupX1);
            let diagnostic = format!("Field '{}'", field.name);
            self.emit(builder, &generator, kind, point, diagnostic);
            builder.push_instruction(Instruction::Swap);
        }
    }

    fn emit_field_read_check(&mut self, builder: &mut CodeBuilder, field: &FieldRef) {
        let kind = field.kind();
        if kind.slot_size() != 1 {
            return;
        }
        let generator = if field.owner != self.class.name {
            self.strategy.boundary_field_read_check(field)
        } else {
            match self.class.find_field(&field.name) {
                Some(declared) if declared.descriptor == field.descriptor => {
                    self.strategy.field_read_check(declared, kind)
                }
                Some(_) => None,
                None => self
                    .inherited_field(field)
                    .and_then(|inherited| self.strategy.boundary_field_read_check(&inherited)),
            }
        };
        if let Some(generator) = generator {
            builder.push_instruction(Instruction::Dup);
            let point = ProgramPoint::FieldRead {
                owner: field.owner.clone(),
                name: field.name.clone(),
            };
            let diagnostic = format!("Read Field '{}'", field.name);
            self.emit(builder, &generator, kind, point, diagnostic);
        }
    }

    /// Field referenced through the class being woven but declared by one of its ancestors
    ///
    /// The reference is re-targeted at the declaring class.
    fn inherited_field(&self, field: &FieldRef) -> Option<FieldRef> {
        let superclass = self.class.superclass.as_ref()?;
        let owner = self.strategy.field_declaring_class(superclass, &field.name)?;
        Some(FieldRef {
            owner,
            name: field.name.clone(),
            descriptor: field.descriptor.clone(),
        })
    }

    fn emit_return_check(&mut self, builder: &mut CodeBuilder) {
        let (generator, point, diagnostic) = if self.checked {
            (
                self.strategy.return_check(self.method),
                ProgramPoint::Return,
                format!("Return value of {}", self.method.name),
            )
        } else {
            (
                self.strategy
                    .unchecked_override_return_check(self.class, self.method),
                ProgramPoint::OverrideReturn,
                format!("Return value of overridden method {}", self.method.name),
            )
        };
        if let Some(generator) = generator {
            builder.push_instruction(Instruction::Dup);
            self.emit(builder, &generator, TypeKind::Reference, point, diagnostic);
        }
    }

    fn emit_call_check(&mut self, builder: &mut CodeBuilder, method: &MethodRef) {
        if let Some(generator) = self.strategy.boundary_call_check(method) {
            builder.push_instruction(Instruction::Dup);
            let point = ProgramPoint::InvokeResult {
                owner: method.owner.clone(),
                name: method.name.clone(),
            };
            let diagnostic = format!("Return value of {} (Boundary)", method.name);
            self.emit(builder, &generator, TypeKind::Reference, point, diagnostic);
        }
    }

    fn emit_array_store_check(&mut self, builder: &mut CodeBuilder) {
        if let Some(generator) = self.strategy.array_store_check(TypeKind::Reference) {
            builder.push_instruction(Instruction::Dup);
            let diagnostic = String::from("Array Element Write");
            let point = ProgramPoint::ArrayStore;
            self.emit(builder, &generator, TypeKind::Reference, point, diagnostic);
        }
    }

    fn emit_array_load_check(&mut self, builder: &mut CodeBuilder) {
        if let Some(generator) = self.strategy.array_load_check(TypeKind::Reference) {
            builder.push_instruction(Instruction::Dup);
            let diagnostic = String::from("Array Element Read");
            let point = ProgramPoint::ArrayLoad;
            self.emit(builder, &generator, TypeKind::Reference, point, diagnostic);
        }
    }

    fn emit_local_store_check(&mut self, builder: &mut CodeBuilder, slot: u16) {
        let generator = self
            .strategy
            .local_store_check(self.method, slot, TypeKind::Reference);
        if let Some(generator) = generator {
            builder.push_instruction(Instruction::ALoad(slot));
            let diagnostic = format!("Local Variable Assignment (Slot {})", slot);
            let point = ProgramPoint::LocalStore(slot);
            self.emit(builder, &generator, TypeKind::Reference, point, diagnostic);
        }
    }
}
