//! Method bodies and their construction
//!
//! ### Structure
//!
//! A method body is a flat stream of [`CodeElement`]s: real instructions interleaved with labels
//! (jump targets) and line number markers. We split up the [list of bytecode instructions][0]
//! into two groups:
//!
//!   - [`Instruction`] for straight-line instructions
//!   - [`BranchInstruction`] for instructions that may jump, return, or throw
//!
//! A flat stream (as opposed to a graph of basic blocks) is the natural shape for weaving: checks
//! get inserted next to the instructions they guard, and everything else is copied through in
//! order.
//!
//! ### Code generation
//!
//! [`CodeBuilder`] accumulates elements and, once finished, checks the result with the
//! [`crate::jvm::verifier`] to recompute the maximum stack depth.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se18/html/jvms-6.html#jvms-6.5

mod code;
mod code_builder;
mod instructions;
mod label;

pub use code::*;
pub use code_builder::*;
pub use instructions::*;
pub use label::*;
