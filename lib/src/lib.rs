//! Load-time weaving of runtime checks for type qualifiers
//!
//! Classes are handed over as they load, parsed into an editable model ([`jvm::model`]),
//! rewritten so that values flowing into _checked_ code from anywhere else get verified against
//! the qualifiers on the declarations they flow into ([`weave`]), and handed back. Which checks
//! go where is up to an [`policy::InstrumentationStrategy`]; what a check looks like and which
//! qualifiers demand one is up to a [`checkers::RuntimeChecker`]. Failed checks end up in the
//! [`runtime::RuntimeVerifier`].
//!
//! The [`agent`] module ties this together behind the hook a host calls for every loaded unit.

pub mod agent;
pub mod checkers;
pub mod jvm;
pub mod policy;
pub mod qualifiers;
pub mod resolution;
pub mod runtime;
pub mod scope;
mod util;
pub mod weave;
