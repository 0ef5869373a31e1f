//! Stack soundness checking
//!
//! Inserting instructions into existing method bodies is only safe if every element is still
//! reached with a well-defined operand stack. [`verify`] checks exactly that: for every element in
//! a method body, all of the control flow paths reaching the element must agree on the types
//! (up to the coarse [`StackType`]) and order of the values on the operand stack. Locals are not
//! tracked, since woven checks only ever read locals the original code already defined.
//!
//! Straight-line instructions are easy to check (see [`verify_instruction`]). Labels which are
//! reachable from multiple places make this a fix-point algorithm: the stack at a label is fixed
//! by the first path found to reach it, then every other path has to agree.
//!
//! Exception handlers always start with exactly the thrown exception on the stack.

mod frame;
mod types;

pub use frame::*;
pub use types::*;

use crate::jvm::code::{CodeElement, ExceptionHandler, SynLabel};
use crate::util::Width;
use std::collections::HashMap;

/// What was learned about a method body from verifying it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackSummary {
    /// Maximum depth of the operand stack (in slots)
    pub max_stack: u16,
}

/// Check that every reachable element of the code is reached with a consistent stack
pub fn verify(
    elements: &[CodeElement],
    handlers: &[ExceptionHandler],
) -> Result<StackSummary, VerifierError> {
    let error_at = |index: usize, kind: VerifierErrorKind| VerifierError {
        index,
        element: elements
            .get(index)
            .map_or_else(|| String::from("<end>"), |element| format!("{:?}", element)),
        kind,
    };

    // Where is each label placed?
    let mut label_indices: HashMap<SynLabel, usize> = HashMap::new();
    for (index, element) in elements.iter().enumerate() {
        if let CodeElement::Label(label) = element {
            if label_indices.insert(*label, index).is_some() {
                return Err(error_at(index, VerifierErrorKind::DuplicateLabel(*label)));
            }
        }
    }
    let find_label = |index: usize, label: &SynLabel| -> Result<usize, VerifierError> {
        label_indices
            .get(label)
            .copied()
            .ok_or_else(|| error_at(index, VerifierErrorKind::UnknownLabel(*label)))
    };

    // Stack on entry to each element (`None` until the element is found to be reachable)
    let mut entry_stacks: Vec<Option<Stack>> = vec![None; elements.len()];
    let mut worklist: Vec<usize> = vec![];
    let mut max_stack: usize = 0;

    let merge = |target: usize,
                     stack: &Stack,
                     entry_stacks: &mut Vec<Option<Stack>>,
                     worklist: &mut Vec<usize>|
     -> Result<(), VerifierError> {
        if target >= elements.len() {
            return Err(error_at(target, VerifierErrorKind::FallsOffEnd));
        }
        match &entry_stacks[target] {
            None => {
                entry_stacks[target] = Some(stack.clone());
                worklist.push(target);
                Ok(())
            }
            Some(existing) if existing == stack => Ok(()),
            Some(existing) => Err(error_at(
                target,
                VerifierErrorKind::InconsistentFrames(existing.clone(), stack.clone()),
            )),
        }
    };

    if elements.is_empty() {
        return Err(error_at(0, VerifierErrorKind::FallsOffEnd));
    }
    merge(0, &vec![], &mut entry_stacks, &mut worklist)?;
    for handler in handlers {
        find_label(0, &handler.start)?;
        find_label(0, &handler.end)?;
        let handler_index = find_label(0, &handler.handler)?;
        merge(
            handler_index,
            &vec![StackType::Reference],
            &mut entry_stacks,
            &mut worklist,
        )?;
    }

    while let Some(index) = worklist.pop() {
        let mut stack = match &entry_stacks[index] {
            Some(stack) => stack.clone(),
            None => continue,
        };
        max_stack = max_stack.max(stack.width());

        match &elements[index] {
            CodeElement::Label(_) | CodeElement::LineNumber(_) => {
                merge(index + 1, &stack, &mut entry_stacks, &mut worklist)?;
            }
            CodeElement::Instruction(insn) => {
                verify_instruction(&mut stack, insn).map_err(|kind| error_at(index, kind))?;
                max_stack = max_stack.max(stack.width());
                merge(index + 1, &stack, &mut entry_stacks, &mut worklist)?;
            }
            CodeElement::Branch(insn) => {
                verify_branch(&mut stack, insn).map_err(|kind| error_at(index, kind))?;
                for target in insn.jump_targets() {
                    let target_index = find_label(index, &target)?;
                    merge(target_index, &stack, &mut entry_stacks, &mut worklist)?;
                }
                if insn.falls_through() {
                    merge(index + 1, &stack, &mut entry_stacks, &mut worklist)?;
                }
            }
        }
    }

    Ok(StackSummary {
        max_stack: u16::try_from(max_stack).unwrap_or(u16::MAX),
    })
}
