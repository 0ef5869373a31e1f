//! Encoding of method bodies
//!
//! Instructions use their JVM opcodes, but operands are written out inline (names and descriptors
//! are strings, locals are always `u16`, labels are `u32`) instead of going through a constant
//! pool and byte offsets.

use super::malformed;
use crate::jvm::code::{
    BranchInstruction, Code, CodeElement, CompareMode, Constant, EqComparison, ExceptionHandler,
    FieldRef, Instruction, InvokeType, MethodRef, OrdComparison, ShiftType, SynLabel,
};
use crate::jvm::{BaseType, BinaryName, Deserialize, Error, FieldType, MethodDescriptor};
use crate::jvm::{RefType, Serialize, UnqualifiedName};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Error as IoError, ErrorKind, Result};

const TAG_INSTRUCTION: u8 = 0;
const TAG_BRANCH: u8 = 1;
const TAG_LABEL: u8 = 2;
const TAG_LINE_NUMBER: u8 = 3;

impl Serialize for SynLabel {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        let id = u32::try_from(self.id())
            .map_err(|_| IoError::new(ErrorKind::InvalidInput, "Label id is too large"))?;
        id.serialize(writer)
    }
}

impl Deserialize for SynLabel {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(SynLabel::new(u32::deserialize(reader)? as usize))
    }
}

impl Serialize for Code {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.max_stack.serialize(writer)?;
        self.max_locals.serialize(writer)?;

        // Method bodies can easily have more than `u16::MAX` elements
        let len = u32::try_from(self.elements.len())
            .map_err(|_| IoError::new(ErrorKind::InvalidInput, "Method body is too long"))?;
        len.serialize(writer)?;
        for element in &self.elements {
            element.serialize(writer)?;
        }

        self.exception_handlers.serialize(writer)
    }
}

impl Deserialize for Code {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let max_stack = u16::deserialize(reader)?;
        let max_locals = u16::deserialize(reader)?;
        let len = u32::deserialize(reader)?;
        let mut elements = vec![];
        for _ in 0..len {
            elements.push(CodeElement::deserialize(reader)?);
        }
        let exception_handlers = Vec::<ExceptionHandler>::deserialize(reader)?;
        Ok(Code {
            max_stack,
            max_locals,
            elements,
            exception_handlers,
        })
    }
}

impl Serialize for ExceptionHandler {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.start.serialize(writer)?;
        self.end.serialize(writer)?;
        self.handler.serialize(writer)?;
        self.catch_type.serialize(writer)
    }
}

impl Deserialize for ExceptionHandler {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(ExceptionHandler {
            start: SynLabel::deserialize(reader)?,
            end: SynLabel::deserialize(reader)?,
            handler: SynLabel::deserialize(reader)?,
            catch_type: Option::<BinaryName>::deserialize(reader)?,
        })
    }
}

impl Serialize for CodeElement {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        match self {
            CodeElement::Instruction(insn) => {
                TAG_INSTRUCTION.serialize(writer)?;
                insn.serialize(writer)
            }
            CodeElement::Branch(insn) => {
                TAG_BRANCH.serialize(writer)?;
                insn.serialize(writer)
            }
            CodeElement::Label(label) => {
                TAG_LABEL.serialize(writer)?;
                label.serialize(writer)
            }
            CodeElement::LineNumber(line) => {
                TAG_LINE_NUMBER.serialize(writer)?;
                line.serialize(writer)
            }
        }
    }
}

impl Deserialize for CodeElement {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(match u8::deserialize(reader)? {
            TAG_INSTRUCTION => CodeElement::Instruction(Instruction::deserialize(reader)?),
            TAG_BRANCH => CodeElement::Branch(BranchInstruction::deserialize(reader)?),
            TAG_LABEL => CodeElement::Label(SynLabel::deserialize(reader)?),
            TAG_LINE_NUMBER => CodeElement::LineNumber(u16::deserialize(reader)?),
            other => return Err(malformed(format!("Invalid code element tag {}", other))),
        })
    }
}

impl Serialize for Instruction {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        use Instruction::*;

        if let Some(opcode) = simple_opcode(self) {
            return opcode.serialize(writer);
        }

        match self {
            BiPush(value) => {
                0x10u8.serialize(writer)?;
                value.serialize(writer)
            }
            SiPush(value) => {
                0x11u8.serialize(writer)?;
                value.serialize(writer)
            }
            Ldc(constant) => {
                0x12u8.serialize(writer)?;
                constant.serialize(writer)
            }
            ILoad(slot) => local_instruction(writer, 0x15, *slot),
            LLoad(slot) => local_instruction(writer, 0x16, *slot),
            FLoad(slot) => local_instruction(writer, 0x17, *slot),
            DLoad(slot) => local_instruction(writer, 0x18, *slot),
            ALoad(slot) => local_instruction(writer, 0x19, *slot),
            IStore(slot) => local_instruction(writer, 0x36, *slot),
            LStore(slot) => local_instruction(writer, 0x37, *slot),
            FStore(slot) => local_instruction(writer, 0x38, *slot),
            DStore(slot) => local_instruction(writer, 0x39, *slot),
            AStore(slot) => local_instruction(writer, 0x3a, *slot),
            IInc(slot, amount) => {
                0x84u8.serialize(writer)?;
                slot.serialize(writer)?;
                amount.serialize(writer)
            }
            GetStatic(field) => field_instruction(writer, 0xb2, field),
            PutStatic(field) => field_instruction(writer, 0xb3, field),
            GetField(field) => field_instruction(writer, 0xb4, field),
            PutField(field) => field_instruction(writer, 0xb5, field),
            Invoke(typ, method) => {
                match typ {
                    InvokeType::Virtual => 0xb6u8.serialize(writer)?,
                    InvokeType::Special => 0xb7u8.serialize(writer)?,
                    InvokeType::Static => 0xb8u8.serialize(writer)?,
                    InvokeType::Interface(count) => {
                        0xb9u8.serialize(writer)?;
                        count.serialize(writer)?;
                    }
                }
                method.owner.serialize(writer)?;
                method.name.serialize(writer)?;
                method.descriptor.serialize(writer)
            }
            New(class) => {
                0xbbu8.serialize(writer)?;
                class.serialize(writer)
            }
            NewArray(element_type) => {
                0xbcu8.serialize(writer)?;
                array_type_code(*element_type).serialize(writer)
            }
            ANewArray(ref_type) => {
                0xbdu8.serialize(writer)?;
                ref_type.serialize(writer)
            }
            CheckCast(ref_type) => {
                0xc0u8.serialize(writer)?;
                ref_type.serialize(writer)
            }
            InstanceOf(ref_type) => {
                0xc1u8.serialize(writer)?;
                ref_type.serialize(writer)
            }
            other => Err(IoError::new(
                ErrorKind::InvalidInput,
                format!("No encoding for {:?}", other),
            )),
        }
    }
}

impl Deserialize for Instruction {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        use Instruction::*;

        let opcode = u8::deserialize(reader)?;
        if let Some(insn) = simple_instruction(opcode) {
            return Ok(insn);
        }

        Ok(match opcode {
            0x10 => BiPush(i8::deserialize(reader)?),
            0x11 => SiPush(i16::deserialize(reader)?),
            0x12 => Ldc(Constant::deserialize(reader)?),
            0x15 => ILoad(u16::deserialize(reader)?),
            0x16 => LLoad(u16::deserialize(reader)?),
            0x17 => FLoad(u16::deserialize(reader)?),
            0x18 => DLoad(u16::deserialize(reader)?),
            0x19 => ALoad(u16::deserialize(reader)?),
            0x36 => IStore(u16::deserialize(reader)?),
            0x37 => LStore(u16::deserialize(reader)?),
            0x38 => FStore(u16::deserialize(reader)?),
            0x39 => DStore(u16::deserialize(reader)?),
            0x3a => AStore(u16::deserialize(reader)?),
            0x84 => IInc(u16::deserialize(reader)?, i16::deserialize(reader)?),
            0xb2 => GetStatic(FieldRef::deserialize(reader)?),
            0xb3 => PutStatic(FieldRef::deserialize(reader)?),
            0xb4 => GetField(FieldRef::deserialize(reader)?),
            0xb5 => PutField(FieldRef::deserialize(reader)?),
            0xb6 => Invoke(InvokeType::Virtual, MethodRef::deserialize(reader)?),
            0xb7 => Invoke(InvokeType::Special, MethodRef::deserialize(reader)?),
            0xb8 => Invoke(InvokeType::Static, MethodRef::deserialize(reader)?),
            0xb9 => {
                let count = u8::deserialize(reader)?;
                Invoke(InvokeType::Interface(count), MethodRef::deserialize(reader)?)
            }
            0xbb => New(BinaryName::deserialize(reader)?),
            0xbc => NewArray(array_type_from_code(u8::deserialize(reader)?)?),
            0xbd => ANewArray(RefType::deserialize(reader)?),
            0xc0 => CheckCast(RefType::deserialize(reader)?),
            0xc1 => InstanceOf(RefType::deserialize(reader)?),
            other => return Err(malformed(format!("Invalid opcode {:#04x}", other))),
        })
    }
}

impl Serialize for BranchInstruction {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        use BranchInstruction::*;

        match self {
            If(comparison, target) => {
                (0x99u8 + ord_comparison_offset(*comparison)).serialize(writer)?;
                target.serialize(writer)
            }
            IfICmp(comparison, target) => {
                (0x9fu8 + ord_comparison_offset(*comparison)).serialize(writer)?;
                target.serialize(writer)
            }
            IfACmp(EqComparison::EQ, target) => jump_instruction(writer, 0xa5, target),
            IfACmp(EqComparison::NE, target) => jump_instruction(writer, 0xa6, target),
            Goto(target) => jump_instruction(writer, 0xa7, target),
            TableSwitch {
                default,
                low,
                targets,
            } => {
                0xaau8.serialize(writer)?;
                default.serialize(writer)?;
                low.serialize(writer)?;
                targets.serialize(writer)
            }
            LookupSwitch { default, targets } => {
                0xabu8.serialize(writer)?;
                default.serialize(writer)?;
                targets.serialize(writer)
            }
            IReturn => 0xacu8.serialize(writer),
            LReturn => 0xadu8.serialize(writer),
            FReturn => 0xaeu8.serialize(writer),
            DReturn => 0xafu8.serialize(writer),
            AReturn => 0xb0u8.serialize(writer),
            Return => 0xb1u8.serialize(writer),
            AThrow => 0xbfu8.serialize(writer),
            IfNull(EqComparison::EQ, target) => jump_instruction(writer, 0xc6, target),
            IfNull(EqComparison::NE, target) => jump_instruction(writer, 0xc7, target),
        }
    }
}

impl Deserialize for BranchInstruction {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        use BranchInstruction::*;

        let opcode = u8::deserialize(reader)?;
        Ok(match opcode {
            0x99..=0x9e => If(ord_comparison(opcode - 0x99), SynLabel::deserialize(reader)?),
            0x9f..=0xa4 => IfICmp(ord_comparison(opcode - 0x9f), SynLabel::deserialize(reader)?),
            0xa5 => IfACmp(EqComparison::EQ, SynLabel::deserialize(reader)?),
            0xa6 => IfACmp(EqComparison::NE, SynLabel::deserialize(reader)?),
            0xa7 => Goto(SynLabel::deserialize(reader)?),
            0xaa => TableSwitch {
                default: SynLabel::deserialize(reader)?,
                low: i32::deserialize(reader)?,
                targets: Vec::<SynLabel>::deserialize(reader)?,
            },
            0xab => LookupSwitch {
                default: SynLabel::deserialize(reader)?,
                targets: Vec::<(i32, SynLabel)>::deserialize(reader)?,
            },
            0xac => IReturn,
            0xad => LReturn,
            0xae => FReturn,
            0xaf => DReturn,
            0xb0 => AReturn,
            0xb1 => Return,
            0xbf => AThrow,
            0xc6 => IfNull(EqComparison::EQ, SynLabel::deserialize(reader)?),
            0xc7 => IfNull(EqComparison::NE, SynLabel::deserialize(reader)?),
            other => return Err(malformed(format!("Invalid branch opcode {:#04x}", other))),
        })
    }
}

/// Constants use the same tags as the corresponding constant pool entries
impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        match self {
            Constant::Integer(value) => {
                3u8.serialize(writer)?;
                value.serialize(writer)
            }
            Constant::Float(value) => {
                4u8.serialize(writer)?;
                value.serialize(writer)
            }
            Constant::Long(value) => {
                5u8.serialize(writer)?;
                value.serialize(writer)
            }
            Constant::Double(value) => {
                6u8.serialize(writer)?;
                value.serialize(writer)
            }
            Constant::Class(ref_type) => {
                7u8.serialize(writer)?;
                ref_type.serialize(writer)
            }
            Constant::String(value) => {
                8u8.serialize(writer)?;
                value.serialize(writer)
            }
        }
    }
}

impl Deserialize for Constant {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(match u8::deserialize(reader)? {
            3 => Constant::Integer(i32::deserialize(reader)?),
            4 => Constant::Float(f32::deserialize(reader)?),
            5 => Constant::Long(i64::deserialize(reader)?),
            6 => Constant::Double(f64::deserialize(reader)?),
            7 => Constant::Class(RefType::deserialize(reader)?),
            8 => Constant::String(String::deserialize(reader)?),
            other => return Err(malformed(format!("Invalid constant tag {}", other))),
        })
    }
}

impl Deserialize for FieldRef {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(FieldRef {
            owner: BinaryName::deserialize(reader)?,
            name: UnqualifiedName::deserialize(reader)?,
            descriptor: FieldType::deserialize(reader)?,
        })
    }
}

impl Deserialize for MethodRef {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(MethodRef {
            owner: BinaryName::deserialize(reader)?,
            name: UnqualifiedName::deserialize(reader)?,
            descriptor: MethodDescriptor::deserialize(reader)?,
        })
    }
}

fn local_instruction<W: WriteBytesExt>(writer: &mut W, opcode: u8, slot: u16) -> Result<()> {
    opcode.serialize(writer)?;
    slot.serialize(writer)
}

fn field_instruction<W: WriteBytesExt>(writer: &mut W, opcode: u8, field: &FieldRef) -> Result<()> {
    opcode.serialize(writer)?;
    field.owner.serialize(writer)?;
    field.name.serialize(writer)?;
    field.descriptor.serialize(writer)
}

fn jump_instruction<W: WriteBytesExt>(writer: &mut W, opcode: u8, target: &SynLabel) -> Result<()> {
    opcode.serialize(writer)?;
    target.serialize(writer)
}

/// Opcodes of comparisons are laid out in the order `eq`, `ne`, `lt`, `ge`, `gt`, `le`
const fn ord_comparison_offset(comparison: OrdComparison) -> u8 {
    match comparison {
        OrdComparison::EQ => 0,
        OrdComparison::NE => 1,
        OrdComparison::LT => 2,
        OrdComparison::GE => 3,
        OrdComparison::GT => 4,
        OrdComparison::LE => 5,
    }
}

const fn ord_comparison(offset: u8) -> OrdComparison {
    match offset {
        0 => OrdComparison::EQ,
        1 => OrdComparison::NE,
        2 => OrdComparison::LT,
        3 => OrdComparison::GE,
        4 => OrdComparison::GT,
        _ => OrdComparison::LE,
    }
}

/// Codes used by `newarray`
const fn array_type_code(element_type: BaseType) -> u8 {
    match element_type {
        BaseType::Boolean => 4,
        BaseType::Char => 5,
        BaseType::Float => 6,
        BaseType::Double => 7,
        BaseType::Byte => 8,
        BaseType::Short => 9,
        BaseType::Int => 10,
        BaseType::Long => 11,
    }
}

fn array_type_from_code(code: u8) -> std::result::Result<BaseType, Error> {
    Ok(match code {
        4 => BaseType::Boolean,
        5 => BaseType::Char,
        6 => BaseType::Float,
        7 => BaseType::Double,
        8 => BaseType::Byte,
        9 => BaseType::Short,
        10 => BaseType::Int,
        11 => BaseType::Long,
        other => return Err(malformed(format!("Invalid array type code {}", other))),
    })
}

/// Opcode of instructions which have no operands
fn simple_opcode(insn: &Instruction) -> Option<u8> {
    use Instruction::*;

    Some(match insn {
        Nop => 0x00,
        AConstNull => 0x01,
        IConstM1 => 0x02,
        IConst0 => 0x03,
        IConst1 => 0x04,
        IConst2 => 0x05,
        IConst3 => 0x06,
        IConst4 => 0x07,
        IConst5 => 0x08,
        LConst0 => 0x09,
        LConst1 => 0x0a,
        FConst0 => 0x0b,
        FConst1 => 0x0c,
        FConst2 => 0x0d,
        DConst0 => 0x0e,
        DConst1 => 0x0f,
        IALoad => 0x2e,
        LALoad => 0x2f,
        FALoad => 0x30,
        DALoad => 0x31,
        AALoad => 0x32,
        BALoad => 0x33,
        CALoad => 0x34,
        SALoad => 0x35,
        IAStore => 0x4f,
        LAStore => 0x50,
        FAStore => 0x51,
        DAStore => 0x52,
        AAStore => 0x53,
        BAStore => 0x54,
        CAStore => 0x55,
        SAStore => 0x56,
        Pop => 0x57,
        Pop2 => 0x58,
        Dup => 0x59,
        DupX1 => 0x5a,
        DupX2 => 0x5b,
        Dup2 => 0x5c,
        Dup2X1 => 0x5d,
        Dup2X2 => 0x5e,
        Swap => 0x5f,
        IAdd => 0x60,
        LAdd => 0x61,
        FAdd => 0x62,
        DAdd => 0x63,
        ISub => 0x64,
        LSub => 0x65,
        FSub => 0x66,
        DSub => 0x67,
        IMul => 0x68,
        LMul => 0x69,
        FMul => 0x6a,
        DMul => 0x6b,
        IDiv => 0x6c,
        LDiv => 0x6d,
        FDiv => 0x6e,
        DDiv => 0x6f,
        IRem => 0x70,
        LRem => 0x71,
        FRem => 0x72,
        DRem => 0x73,
        INeg => 0x74,
        LNeg => 0x75,
        FNeg => 0x76,
        DNeg => 0x77,
        ISh(ShiftType::Left) => 0x78,
        LSh(ShiftType::Left) => 0x79,
        ISh(ShiftType::ArithmeticRight) => 0x7a,
        LSh(ShiftType::ArithmeticRight) => 0x7b,
        ISh(ShiftType::LogicalRight) => 0x7c,
        LSh(ShiftType::LogicalRight) => 0x7d,
        IAnd => 0x7e,
        LAnd => 0x7f,
        IOr => 0x80,
        LOr => 0x81,
        IXor => 0x82,
        LXor => 0x83,
        I2L => 0x85,
        I2F => 0x86,
        I2D => 0x87,
        L2I => 0x88,
        L2F => 0x89,
        L2D => 0x8a,
        F2I => 0x8b,
        F2L => 0x8c,
        F2D => 0x8d,
        D2I => 0x8e,
        D2L => 0x8f,
        D2F => 0x90,
        I2B => 0x91,
        I2C => 0x92,
        I2S => 0x93,
        LCmp => 0x94,
        FCmp(CompareMode::L) => 0x95,
        FCmp(CompareMode::G) => 0x96,
        DCmp(CompareMode::L) => 0x97,
        DCmp(CompareMode::G) => 0x98,
        ArrayLength => 0xbe,
        MonitorEnter => 0xc2,
        MonitorExit => 0xc3,
        _ => return None,
    })
}

fn simple_instruction(opcode: u8) -> Option<Instruction> {
    use Instruction::*;

    Some(match opcode {
        0x00 => Nop,
        0x01 => AConstNull,
        0x02 => IConstM1,
        0x03 => IConst0,
        0x04 => IConst1,
        0x05 => IConst2,
        0x06 => IConst3,
        0x07 => IConst4,
        0x08 => IConst5,
        0x09 => LConst0,
        0x0a => LConst1,
        0x0b => FConst0,
        0x0c => FConst1,
        0x0d => FConst2,
        0x0e => DConst0,
        0x0f => DConst1,
        0x2e => IALoad,
        0x2f => LALoad,
        0x30 => FALoad,
        0x31 => DALoad,
        0x32 => AALoad,
        0x33 => BALoad,
        0x34 => CALoad,
        0x35 => SALoad,
        0x4f => IAStore,
        0x50 => LAStore,
        0x51 => FAStore,
        0x52 => DAStore,
        0x53 => AAStore,
        0x54 => BAStore,
        0x55 => CAStore,
        0x56 => SAStore,
        0x57 => Pop,
        0x58 => Pop2,
        0x59 => Dup,
        0x5a => DupX1,
        0x5b => DupX2,
        0x5c => Dup2,
        0x5d => Dup2X1,
        0x5e => Dup2X2,
        0x5f => Swap,
        0x60 => IAdd,
        0x61 => LAdd,
        0x62 => FAdd,
        0x63 => DAdd,
        0x64 => ISub,
        0x65 => LSub,
        0x66 => FSub,
        0x67 => DSub,
        0x68 => IMul,
        0x69 => LMul,
        0x6a => FMul,
        0x6b => DMul,
        0x6c => IDiv,
        0x6d => LDiv,
        0x6e => FDiv,
        0x6f => DDiv,
        0x70 => IRem,
        0x71 => LRem,
        0x72 => FRem,
        0x73 => DRem,
        0x74 => INeg,
        0x75 => LNeg,
        0x76 => FNeg,
        0x77 => DNeg,
        0x78 => ISh(ShiftType::Left),
        0x79 => LSh(ShiftType::Left),
        0x7a => ISh(ShiftType::ArithmeticRight),
        0x7b => LSh(ShiftType::ArithmeticRight),
        0x7c => ISh(ShiftType::LogicalRight),
        0x7d => LSh(ShiftType::LogicalRight),
        0x7e => IAnd,
        0x7f => LAnd,
        0x80 => IOr,
        0x81 => LOr,
        0x82 => IXor,
        0x83 => LXor,
        0x85 => I2L,
        0x86 => I2F,
        0x87 => I2D,
        0x88 => L2I,
        0x89 => L2F,
        0x8a => L2D,
        0x8b => F2I,
        0x8c => F2L,
        0x8d => F2D,
        0x8e => D2I,
        0x8f => D2L,
        0x90 => D2F,
        0x91 => I2B,
        0x92 => I2C,
        0x93 => I2S,
        0x94 => LCmp,
        0x95 => FCmp(CompareMode::L),
        0x96 => FCmp(CompareMode::G),
        0x97 => DCmp(CompareMode::L),
        0x98 => DCmp(CompareMode::G),
        0xbe => ArrayLength,
        0xc2 => MonitorEnter,
        0xc3 => MonitorExit,
        _ => return None,
    })
}
