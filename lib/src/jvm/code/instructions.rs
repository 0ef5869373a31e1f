//! Instruction AST for method bodies
//!
//! The representation is a little more convenient than the raw bytecode:
//!
//!   - The "wide" instruction and short forms (`iload_0`, `ldc_w`, ...) don't show up at all.
//!     Loads and stores always carry a full `u16` slot, constants are inlined.
//!
//!   - Some instructions (like the branches) get abstracted into one instruction with a field.
//!     This helps with repetitive pattern matches.
//!
//!   - Symbolic references (fields, methods, classes) are inlined instead of being constant pool
//!     indices, so the instructions can be inspected and re-emitted without a constant pool.
//!
//!   - Some instructions (like `jsr` or `invokedynamic`) are just omitted.

use crate::jvm::{BaseType, BinaryName, FieldType, MethodDescriptor, RefType, TypeKind};
use crate::jvm::{RenderDescriptor, SynLabel, UnqualifiedName};
use std::fmt;

/// Non-branching JVM bytecode instruction
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(Constant), // covers `ldc`, `ldc_w`, and `ldc2_w`
    ILoad(u16),    // covers `iload`, `iload{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // covers `istore`, `istore{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType), // covers `ishr`, `ishl`, and `iushr`
    LSh(ShiftType), // covers `lshr`, `lshl`, and `lushr`
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode), // covers `fcmpl` and `fcmpg`
    DCmp(CompareMode), // covers `dcmpl` and `dcmpg`
    GetStatic(FieldRef),
    PutStatic(FieldRef),
    GetField(FieldRef),
    PutField(FieldRef),
    Invoke(InvokeType, MethodRef),
    New(BinaryName),
    NewArray(BaseType),
    ANewArray(RefType),
    ArrayLength,
    CheckCast(RefType),
    InstanceOf(RefType),
    MonitorEnter,
    MonitorExit,
}

/// Branching JVM bytecode instruction
///
/// Conditional branches fall through to the next element when the condition does not hold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchInstruction {
    If(OrdComparison, SynLabel), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, SynLabel), // covers `if_icmpeq`, `if_icmpne`, ... `if_icmple`
    IfACmp(EqComparison, SynLabel), // covers `if_acmpeq`, `if_acmpne`
    IfNull(EqComparison, SynLabel), // covers `ifnull`, `ifnonnull`
    Goto(SynLabel),                 // covers `goto` and `goto_w`
    TableSwitch {
        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len()`
        default: SynLabel,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<SynLabel>,
    },
    LookupSwitch {
        /// Jump target if there is no corresponding key
        default: SynLabel,

        /// Jump targets (sorted so that the keys are ascending)
        targets: Vec<(i32, SynLabel)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    AThrow,
}

impl BranchInstruction {
    /// Can execution continue on to the next element?
    pub fn falls_through(&self) -> bool {
        matches!(
            self,
            BranchInstruction::If(_, _)
                | BranchInstruction::IfICmp(_, _)
                | BranchInstruction::IfACmp(_, _)
                | BranchInstruction::IfNull(_, _)
        )
    }

    /// Labels this instruction may jump to (not including fall through)
    pub fn jump_targets(&self) -> Vec<SynLabel> {
        use BranchInstruction::*;

        match self {
            If(_, target) | IfICmp(_, target) | IfACmp(_, target) | IfNull(_, target) => {
                vec![*target]
            }
            Goto(target) => vec![*target],
            TableSwitch {
                default, targets, ..
            } => std::iter::once(*default).chain(targets.iter().copied()).collect(),
            LookupSwitch { default, targets } => std::iter::once(*default)
                .chain(targets.iter().map(|&(_, target)| target))
                .collect(),
            _ => vec![],
        }
    }

    /// Return instruction appropriate for a value of the given kind
    pub const fn return_of(kind: TypeKind) -> BranchInstruction {
        match kind {
            TypeKind::Int => BranchInstruction::IReturn,
            TypeKind::Long => BranchInstruction::LReturn,
            TypeKind::Float => BranchInstruction::FReturn,
            TypeKind::Double => BranchInstruction::DReturn,
            TypeKind::Reference => BranchInstruction::AReturn,
            TypeKind::Void => BranchInstruction::Return,
        }
    }

    /// Is this one of the return instructions?
    pub const fn is_return(&self) -> bool {
        matches!(
            self,
            BranchInstruction::IReturn
                | BranchInstruction::LReturn
                | BranchInstruction::FReturn
                | BranchInstruction::DReturn
                | BranchInstruction::AReturn
                | BranchInstruction::Return
        )
    }
}

impl Instruction {
    /// Load instruction appropriate for a local of the given kind
    ///
    /// There is no way to load a `void`, so that just produces a `nop`.
    pub const fn load_of(kind: TypeKind, slot: u16) -> Instruction {
        match kind {
            TypeKind::Int => Instruction::ILoad(slot),
            TypeKind::Long => Instruction::LLoad(slot),
            TypeKind::Float => Instruction::FLoad(slot),
            TypeKind::Double => Instruction::DLoad(slot),
            TypeKind::Reference => Instruction::ALoad(slot),
            TypeKind::Void => Instruction::Nop,
        }
    }
}

/// Constant loaded by `ldc`
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Class(RefType),
}

impl Constant {
    pub const fn kind(&self) -> TypeKind {
        match self {
            Constant::Integer(_) => TypeKind::Int,
            Constant::Float(_) => TypeKind::Float,
            Constant::Long(_) => TypeKind::Long,
            Constant::Double(_) => TypeKind::Double,
            Constant::String(_) | Constant::Class(_) => TypeKind::Reference,
        }
    }
}

/// Symbolic reference to a field
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub owner: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: FieldType,
}

impl FieldRef {
    pub fn kind(&self) -> TypeKind {
        TypeKind::from(&self.descriptor)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.owner, self.name, self.descriptor.render())
    }
}

/// Symbolic reference to a method
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub owner: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor.render())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface(u8), // argument slot count, as encoded by `invokeinterface`
}

impl InvokeType {
    /// Does the invocation consume a receiver in addition to the arguments?
    pub const fn has_receiver(&self) -> bool {
        !matches!(self, InvokeType::Static)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShiftType {
    Left,
    ArithmeticRight,
    LogicalRight,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompareMode {
    L,
    G,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OrdComparison {
    EQ,
    NE,
    LT,
    GE,
    GT,
    LE,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}
