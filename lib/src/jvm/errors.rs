use super::verifier::VerifierError;
use super::{DescriptorError, SynLabel};
use std::fmt;

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// Input bytes do not describe a well-formed unit
    Malformed(String),

    /// Two places in the code claim to be the same label (indicates a bug)
    DuplicateLabel(SynLabel),

    /// Code is not stack-sound
    VerifierError(VerifierError),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<DescriptorError> for Error {
    fn from(err: DescriptorError) -> Error {
        Error::Malformed(format!("invalid descriptor: {}", err))
    }
}

impl From<VerifierError> for Error {
    fn from(err: VerifierError) -> Error {
        Error::VerifierError(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "IO error: {}", err),
            Error::Malformed(msg) => write!(f, "malformed unit: {}", msg),
            Error::DuplicateLabel(label) => write!(f, "label {:?} is placed twice", label),
            Error::VerifierError(err) => write!(f, "verification failed: {}", err),
        }
    }
}

impl std::error::Error for Error {}
