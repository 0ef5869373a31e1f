use crate::qualifiers::RegistryError;
use crate::{jvm, weave};
use std::fmt;

/// Invalid configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    UnknownChecker(String),
    UnknownHandler(String),

    /// The checker's qualifier registry could not be built
    Registry(RegistryError),

    /// A flag had a value other than `true` or `false`
    InvalidFlag {
        key: String,
        value: String,
    },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::UnknownChecker(name) => write!(f, "unknown checker '{}'", name),
            SettingsError::UnknownHandler(name) => {
                write!(f, "unknown violation handler '{}'", name)
            }
            SettingsError::Registry(err) => write!(f, "checker is misconfigured: {}", err),
            SettingsError::InvalidFlag { key, value } => {
                write!(f, "'{}' is not a valid value for {}", value, key)
            }
        }
    }
}

impl std::error::Error for SettingsError {}

impl From<RegistryError> for SettingsError {
    fn from(err: RegistryError) -> SettingsError {
        SettingsError::Registry(err)
    }
}

/// Reason a loaded unit was passed through unmodified
#[derive(Debug)]
pub enum TransformError {
    /// Bytes could not be parsed, or the woven class could not be emitted
    Codec(jvm::Error),

    Weave(weave::Error),

    /// Bytes describe a class other than the one being loaded
    NameMismatch {
        expected: String,
        found: String,
    },

    /// Weaving panicked
    Panic(String),
}

impl From<jvm::Error> for TransformError {
    fn from(err: jvm::Error) -> TransformError {
        TransformError::Codec(err)
    }
}

impl From<weave::Error> for TransformError {
    fn from(err: weave::Error) -> TransformError {
        TransformError::Weave(err)
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::Codec(err) => err.fmt(f),
            TransformError::Weave(err) => err.fmt(f),
            TransformError::NameMismatch { expected, found } => {
                write!(f, "expected class {} but found {}", expected, found)
            }
            TransformError::Panic(message) => write!(f, "panicked: {}", message),
        }
    }
}

impl std::error::Error for TransformError {}
