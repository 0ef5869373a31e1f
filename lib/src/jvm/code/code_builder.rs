use crate::jvm::code::{
    BranchInstruction, Code, CodeElement, ExceptionHandler, Instruction, LabelGenerator,
    SynLabel, SynLabelGenerator,
};
use crate::jvm::verifier;
use crate::jvm::Error;
use std::collections::HashSet;

/// This provides a slightly simplified interface for building up method bodies from top to
/// bottom. It does internal bookkeeping to track labels, then checks the stack soundness of the
/// whole body once it is finished.
///
/// ### Computing the maximum stack
///
/// Unlike locals (which are fixed by the method descriptor and whatever slots the original code
/// already used), the maximum stack depth changes whenever instructions are inserted. Rather than
/// have every caller track it, [`CodeBuilder::result`] runs the [`verifier`] over the finished
/// body and uses the depth it computes.
pub struct CodeBuilder {
    elements: Vec<CodeElement>,

    /// Labels placed so far
    placed_labels: HashSet<SynLabel>,

    label_generator: SynLabelGenerator,

    max_locals: u16,
}

impl CodeBuilder {
    /// Create a builder for a new method body
    pub fn new(max_locals: u16) -> CodeBuilder {
        CodeBuilder {
            elements: vec![],
            placed_labels: HashSet::new(),
            label_generator: SynLabelGenerator::new(SynLabel::new(0)),
            max_locals,
        }
    }

    /// Create a builder for rewriting an existing body
    ///
    /// Fresh labels are guaranteed not to collide with any label in the existing body.
    pub fn rewriting(code: &Code) -> CodeBuilder {
        CodeBuilder {
            elements: Vec::with_capacity(code.elements.len()),
            placed_labels: HashSet::new(),
            label_generator: SynLabelGenerator::new(code.next_free_label()),
            max_locals: code.max_locals,
        }
    }

    /// Push a straight-line instruction
    pub fn push_instruction(&mut self, insn: Instruction) {
        self.elements.push(CodeElement::Instruction(insn));
    }

    /// Push a branch instruction
    pub fn push_branch_instruction(&mut self, insn: BranchInstruction) {
        self.elements.push(CodeElement::Branch(insn));
    }

    /// Mark the current position with a label
    pub fn place_label(&mut self, label: SynLabel) -> Result<(), Error> {
        if !self.placed_labels.insert(label) {
            return Err(Error::DuplicateLabel(label));
        }
        self.elements.push(CodeElement::Label(label));
        Ok(())
    }

    /// Mark the source line of the instructions that follow
    pub fn push_line_number(&mut self, line: u16) {
        self.elements.push(CodeElement::LineNumber(line));
    }

    /// Push any element, copied from some other body
    pub fn push_element(&mut self, element: CodeElement) -> Result<(), Error> {
        match element {
            CodeElement::Label(label) => self.place_label(label),
            other => {
                self.elements.push(other);
                Ok(())
            }
        }
    }

    /// Number of elements pushed so far
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Turn the builder into the method code
    ///
    /// This fails if the body is not stack-sound (see [`verifier::verify`]).
    pub fn result(self, exception_handlers: Vec<ExceptionHandler>) -> Result<Code, Error> {
        let summary = verifier::verify(&self.elements, &exception_handlers)?;
        Ok(Code {
            max_stack: summary.max_stack,
            max_locals: self.max_locals,
            elements: self.elements,
            exception_handlers,
        })
    }
}

impl LabelGenerator<SynLabel> for CodeBuilder {
    fn fresh_label(&mut self) -> SynLabel {
        self.label_generator.fresh_label()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{EqComparison, InvokeType, MethodRef};
    use crate::jvm::{BinaryName, MethodDescriptor, ParseDescriptor, UnqualifiedName};

    #[test]
    fn computes_max_stack() -> Result<(), Error> {
        let mut builder = CodeBuilder::new(2);
        builder.push_instruction(Instruction::ALoad(1));
        builder.push_instruction(Instruction::Dup);
        builder.push_instruction(Instruction::Invoke(
            InvokeType::Static,
            MethodRef {
                owner: BinaryName::NULLNESSRUNTIMEVERIFIER,
                name: UnqualifiedName::CHECKNOTNULL,
                descriptor: MethodDescriptor::parse("(Ljava/lang/Object;)V").unwrap(),
            },
        ));
        builder.push_branch_instruction(BranchInstruction::AReturn);
        let code = builder.result(vec![])?;
        assert_eq!(code.max_stack, 2);
        assert_eq!(code.max_locals, 2);
        Ok(())
    }

    #[test]
    fn labels_are_placed_once() {
        let mut builder = CodeBuilder::new(1);
        let label = builder.fresh_label();
        assert!(builder.place_label(label).is_ok());
        assert!(matches!(
            builder.place_label(label),
            Err(Error::DuplicateLabel(_))
        ));
    }

    #[test]
    fn rewriting_avoids_existing_labels() -> Result<(), Error> {
        let mut builder = CodeBuilder::new(1);
        let skip = builder.fresh_label();
        builder.push_instruction(Instruction::ALoad(0));
        builder.push_branch_instruction(BranchInstruction::IfNull(EqComparison::EQ, skip));
        builder.place_label(skip)?;
        builder.push_branch_instruction(BranchInstruction::Return);
        let code = builder.result(vec![])?;

        let mut rewriter = CodeBuilder::rewriting(&code);
        assert_ne!(rewriter.fresh_label(), skip);
        Ok(())
    }
}
