use crate::jvm;
use std::fmt;

/// Failure to weave a class
///
/// Each of these leaves the class as it was: there is no partially woven output.
#[derive(Debug)]
pub enum Error {
    /// Rewriting the body of a method failed (eg. the result is not stack-sound)
    Method(String, jvm::Error),

    /// Emitting a bridge failed
    Bridge(String, jvm::Error),
}

impl Error {
    /// Signature of the method being generated when weaving failed
    pub fn method(&self) -> &str {
        match self {
            Error::Method(method, _) | Error::Bridge(method, _) => method,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Method(method, err) => write!(f, "cannot weave method {}: {}", method, err),
            Error::Bridge(method, err) => write!(f, "cannot emit bridge {}: {}", method, err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Method(_, err) | Error::Bridge(_, err) => Some(err),
        }
    }
}
