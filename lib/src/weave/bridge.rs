//! Bridges re-apply checks to methods inherited from unchecked ancestors
//!
//! If a checked class inherits `getValue()` from an unchecked superclass without overriding it,
//! calls through the checked class would skip every check. A bridge is a synthesized override:
//!
//! ```text
//! public String getValue() {
//!     <check parameters>
//!     String result = super.getValue();   // invokespecial, with every argument forwarded
//!     <check result>
//!     return result;
//! }
//! ```
//!
//! Deciding what to check is done up front into a [`BridgePlan`], and [`BridgeEmitter`] turns
//! the plan into a method.

use super::InsertedCheck;
use crate::jvm::code::{BranchInstruction, CodeBuilder, Instruction, InvokeType, MethodRef};
use crate::jvm::model::MethodModel;
use crate::jvm::{
    BinaryName, Error, MethodAccessFlags, MethodDescriptor, RenderDescriptor, TypeKind,
    UnqualifiedName,
};
use crate::policy::{InstrumentationStrategy, ProgramPoint};
use crate::qualifiers::CheckGenerator;
use crate::resolution::ParentMethod;
use std::fmt;
use std::sync::Arc;

/// Declarative description of a bridge
#[derive(Clone)]
pub struct BridgePlan {
    /// Ancestor declaring the inherited implementation
    pub owner: BinaryName,

    pub name: UnqualifiedName,

    pub descriptor: MethodDescriptor,

    /// Check for each parameter, in declaration order
    pub parameter_checks: Vec<Option<Arc<dyn CheckGenerator>>>,

    pub return_check: Option<Arc<dyn CheckGenerator>>,
}

impl BridgePlan {
    /// Plan a bridge for an inherited method, if it needs one
    pub fn for_parent(
        strategy: &dyn InstrumentationStrategy,
        parent: &ParentMethod,
    ) -> Option<BridgePlan> {
        if !strategy.should_generate_bridge(parent) {
            return None;
        }
        let descriptor = parent.method.descriptor.clone();
        let parameter_checks = (0..descriptor.parameters.len())
            .map(|index| strategy.bridge_parameter_check(parent, index as u16))
            .collect();
        Some(BridgePlan {
            owner: parent.owner.clone(),
            name: parent.method.name.clone(),
            parameter_checks,
            return_check: strategy.bridge_return_check(parent),
            descriptor,
        })
    }

    /// Inherited implementation the bridge delegates to
    pub fn target(&self) -> MethodRef {
        MethodRef {
            owner: self.owner.clone(),
            name: self.name.clone(),
            descriptor: self.descriptor.clone(),
        }
    }

    pub fn signature(&self) -> String {
        format!("{}{}", self.name, self.descriptor.render())
    }
}

impl fmt::Debug for BridgePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let checked_parameters: Vec<usize> = self
            .parameter_checks
            .iter()
            .enumerate()
            .filter(|(_, check)| check.is_some())
            .map(|(index, _)| index)
            .collect();
        f.debug_struct("BridgePlan")
            .field("target", &self.target())
            .field("checked_parameters", &checked_parameters)
            .field("checks_return", &self.return_check.is_some())
            .finish()
    }
}

/// Turns a [`BridgePlan`] into a method
pub struct BridgeEmitter;

impl BridgeEmitter {
    pub fn emit(plan: &BridgePlan) -> Result<(MethodModel, Vec<InsertedCheck>), Error> {
        let descriptor = &plan.descriptor;
        let signature = plan.signature();
        let max_locals = u16::try_from(descriptor.parameter_length(true)).map_err(|_| {
            Error::Malformed(format!("too many parameters to bridge {}", signature))
        })?;
        let mut code = CodeBuilder::new(max_locals);
        let mut inserted = vec![];

        // Parameter checks
        let mut slot: u16 = 1;
        for (index, parameter) in descriptor.parameters.iter().enumerate() {
            let kind = TypeKind::from(parameter);
            if let Some(Some(generator)) = plan.parameter_checks.get(index) {
                let diagnostic = format!("Parameter {} in inherited method {}", index, plan.name);
                code.push_instruction(Instruction::load_of(kind, slot));
                generator.generate_check(&mut code, kind, &diagnostic);
                inserted.push(InsertedCheck {
                    method: signature.clone(),
                    point: ProgramPoint::BridgeParameter(index as u16),
                    diagnostic,
                });
            }
            slot += kind.slot_size() as u16;
        }

        // Non-virtual call to the inherited implementation
        code.push_instruction(Instruction::ALoad(0));
        let mut slot: u16 = 1;
        for parameter in &descriptor.parameters {
            let kind = TypeKind::from(parameter);
            code.push_instruction(Instruction::load_of(kind, slot));
            slot += kind.slot_size() as u16;
        }
        code.push_instruction(Instruction::Invoke(InvokeType::Special, plan.target()));

        // Return check
        let return_kind = descriptor.return_kind();
        if let Some(generator) = &plan.return_check {
            if return_kind.is_reference() {
                let diagnostic = format!("Return value of inherited method {}", plan.name);
                code.push_instruction(Instruction::Dup);
                generator.generate_check(&mut code, return_kind, &diagnostic);
                inserted.push(InsertedCheck {
                    method: signature.clone(),
                    point: ProgramPoint::BridgeReturn,
                    diagnostic,
                });
            }
        }

        code.push_branch_instruction(return_of(return_kind));

        let mut method =
            MethodModel::new(plan.name.clone(), descriptor.clone(), MethodAccessFlags::PUBLIC);
        method.code = Some(code.result(vec![])?);
        Ok((method, inserted))
    }
}

/// Return instruction appropriate for a value of the given kind
fn return_of(kind: TypeKind) -> BranchInstruction {
    match kind {
        TypeKind::Int => BranchInstruction::IReturn,
        TypeKind::Long => BranchInstruction::LReturn,
        TypeKind::Float => BranchInstruction::FReturn,
        TypeKind::Double => BranchInstruction::DReturn,
        TypeKind::Reference => BranchInstruction::AReturn,
        TypeKind::Void => BranchInstruction::Return,
    }
}
