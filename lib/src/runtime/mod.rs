//! Runtime side of woven checks
//!
//! Woven code calls into a small runtime surface: a per-qualifier verification routine (see
//! [`crate::checkers`]) which, on failure, builds a [`Violation`] and reports it to the
//! [`RuntimeVerifier`]. What happens next is up to the installed [`ViolationHandler`]:
//!
//!   - [`ThrowingViolationHandler`] (the default) terminates the call with an error
//!   - [`LoggingViolationHandler`] logs the violation and carries on
//!   - [`ReportingViolationHandler`] writes one `[VIOLATION] ...` line per violation
//!   - [`RecordingViolationHandler`] keeps the violations around for inspection
//!
//! Violations are blamed on a stack frame, picked according to the [`AttributionKind`] baked into
//! the check when it was woven.

mod handlers;
mod verifier;
mod violation;

pub use handlers::*;
pub use verifier::*;
pub use violation::*;
