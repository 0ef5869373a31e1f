use crate::jvm::{BinaryName, UnqualifiedName};
use std::fmt;

/// Kind of program point at which a check was inserted
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProgramPoint {
    /// Parameter on method entry
    Parameter(u16),

    FieldRead {
        owner: BinaryName,
        name: UnqualifiedName,
    },

    FieldWrite {
        owner: BinaryName,
        name: UnqualifiedName,
    },

    /// Value returned by the method
    Return,

    /// Value returned by an unchecked override of a checked method
    OverrideReturn,

    ArrayLoad,

    ArrayStore,

    LocalStore(u16),

    /// Value returned by a call
    InvokeResult {
        owner: BinaryName,
        name: UnqualifiedName,
    },

    /// Parameter on entry to a bridge
    BridgeParameter(u16),

    /// Value returned through a bridge
    BridgeReturn,
}

impl fmt::Display for ProgramPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramPoint::Parameter(index) => write!(f, "parameter {}", index),
            ProgramPoint::FieldRead { owner, name } => write!(f, "read of {}.{}", owner, name),
            ProgramPoint::FieldWrite { owner, name } => write!(f, "write of {}.{}", owner, name),
            ProgramPoint::Return => f.write_str("return"),
            ProgramPoint::OverrideReturn => f.write_str("overriding return"),
            ProgramPoint::ArrayLoad => f.write_str("array load"),
            ProgramPoint::ArrayStore => f.write_str("array store"),
            ProgramPoint::LocalStore(slot) => write!(f, "store to local {}", slot),
            ProgramPoint::InvokeResult { owner, name } => {
                write!(f, "result of {}.{}", owner, name)
            }
            ProgramPoint::BridgeParameter(index) => write!(f, "bridge parameter {}", index),
            ProgramPoint::BridgeReturn => f.write_str("bridge return"),
        }
    }
}
