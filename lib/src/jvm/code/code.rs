use super::{BranchInstruction, Instruction, SynLabel};
use crate::jvm::BinaryName;

/// One element of a method body
///
/// Labels and line numbers are pseudo-instructions: they occupy no space in the final bytecode,
/// but mark positions in the instruction stream.
#[derive(Clone, Debug, PartialEq)]
pub enum CodeElement {
    Instruction(Instruction),
    Branch(BranchInstruction),
    Label(SynLabel),
    LineNumber(u16),
}

/// Entry in the exception table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Start of the protected range (inclusive)
    pub start: SynLabel,

    /// End of the protected range (exclusive)
    pub end: SynLabel,

    /// Where to jump when an exception is caught
    pub handler: SynLabel,

    /// Type of exception to catch (`None` means any)
    pub catch_type: Option<BinaryName>,
}

/// Method body
#[derive(Clone, Debug, PartialEq)]
pub struct Code {
    /// Maximum operand stack depth
    pub max_stack: u16,

    /// Number of local variable slots (including parameters)
    pub max_locals: u16,

    /// Instruction stream
    pub elements: Vec<CodeElement>,

    pub exception_handlers: Vec<ExceptionHandler>,
}

impl Code {
    /// Smallest label that does not collide with labels already in the code
    pub fn next_free_label(&self) -> SynLabel {
        let placed = self.elements.iter().filter_map(|element| match element {
            CodeElement::Label(label) => Some(*label),
            _ => None,
        });
        let handlers = self
            .exception_handlers
            .iter()
            .flat_map(|handler| [handler.start, handler.end, handler.handler]);
        placed
            .chain(handlers)
            .max()
            .map_or(SynLabel::new(0), |label| label.next())
    }

    /// Number of real (non-pseudo) instructions
    pub fn instruction_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|element| {
                matches!(
                    element,
                    CodeElement::Instruction(_) | CodeElement::Branch(_)
                )
            })
            .count()
    }
}
