use crate::jvm::{SynLabel, TypeKind};
use crate::util::Width;
use std::fmt;

/// Type of a value on the operand stack
///
/// The verifier only checks stack soundness, so all reference types collapse into one and all
/// the sub-`int` types (`boolean`, `byte`, `char`, `short`) are just `int`.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum StackType {
    Int,
    Float,
    Long,
    Double,
    Reference,
}

impl StackType {
    /// Stack type of a value of the given kind (`None` for `void`)
    pub const fn of(kind: TypeKind) -> Option<StackType> {
        match kind {
            TypeKind::Int => Some(StackType::Int),
            TypeKind::Long => Some(StackType::Long),
            TypeKind::Float => Some(StackType::Float),
            TypeKind::Double => Some(StackType::Double),
            TypeKind::Reference => Some(StackType::Reference),
            TypeKind::Void => None,
        }
    }
}

impl Width for StackType {
    fn width(&self) -> usize {
        match self {
            StackType::Long | StackType::Double => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifierErrorKind {
    EmptyStack,
    InvalidWidth(usize),
    IncompatibleTypes { expected: StackType, found: StackType },
    UnknownLabel(SynLabel),
    DuplicateLabel(SynLabel),

    /// Two paths reach the same element with different stacks
    InconsistentFrames(Vec<StackType>, Vec<StackType>),

    /// Execution can continue past the last element
    FallsOffEnd,
}

impl fmt::Display for VerifierErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifierErrorKind::EmptyStack => write!(f, "operand stack is empty"),
            VerifierErrorKind::InvalidWidth(width) => {
                write!(f, "value of width {} is not allowed here", width)
            }
            VerifierErrorKind::IncompatibleTypes { expected, found } => {
                write!(f, "expected {:?} on the stack but found {:?}", expected, found)
            }
            VerifierErrorKind::UnknownLabel(label) => write!(f, "label {:?} is never placed", label),
            VerifierErrorKind::DuplicateLabel(label) => {
                write!(f, "label {:?} is placed more than once", label)
            }
            VerifierErrorKind::InconsistentFrames(first, second) => {
                write!(f, "inconsistent stacks {:?} and {:?}", first, second)
            }
            VerifierErrorKind::FallsOffEnd => write!(f, "execution falls off the end of the code"),
        }
    }
}

/// Verification failure, located at a particular element of the method body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierError {
    /// Index of the offending element
    pub index: usize,

    /// Rendering of the offending element
    pub element: String,

    pub kind: VerifierErrorKind,
}

impl fmt::Display for VerifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at element {} ({}): {}", self.index, self.element, self.kind)
    }
}

impl std::error::Error for VerifierError {}
