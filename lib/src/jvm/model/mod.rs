//! Editable representations of classes
//!
//! This is the representation the weaver works on. Everything is owned and cloneable, so a unit
//! can be parsed once, inspected by the policy, and then rewritten into a new model without
//! touching the original.
//!
//!   - __Class__ is represented using [`ClassModel`]
//!   - __Method__ is represented using [`MethodModel`]
//!   - __Field__ is represented using [`FieldModel`]

mod class;
mod field;
mod method;

pub use class::*;
pub use field::*;
pub use method::*;
