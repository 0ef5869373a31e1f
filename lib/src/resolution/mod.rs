//! Looking up classes other than the one being woven
//!
//! Weaving one unit sometimes needs metadata about other units: ancestors (to find inherited
//! methods which need bridges), owners of fields and methods accessed across a boundary (to find
//! opt-outs), and `package-info` units (to find opt-in markers). All of that goes through a
//! [`ClassResolver`]. Lookups are best-effort: callers always have a conservative answer for
//! when a class can't be found.

mod hierarchy;
mod loader;

pub use hierarchy::*;
pub use loader::*;
