//! Reading and writing unit images
//!
//! The weaver itself only works on [`ClassModel`]s. Getting those from bytes (and back) goes
//! through a [`ClassCodec`], so that hosts with their own class file handling can plug it in.
//!
//! The default [`UnitImageCodec`] reads and writes a compact binary "unit image", which follows
//! class file conventions without needing a constant pool:
//!
//!   - a magic number followed by a `u16` format version
//!   - big-endian integers, `u16` length-prefixed sequences and strings
//!   - names and descriptors as strings in their JVM syntax
//!   - annotation element and type annotation tags as in class files
//!   - instructions using their JVM opcodes (see [`code`])

mod code;

use crate::jvm::annotations::{
    Annotation, AnnotationValue, TypeAnnotation, TypePathStep, TypeTarget,
};
use crate::jvm::model::{ClassModel, FieldModel, MethodModel};
use crate::jvm::{
    BinaryName, ClassAccessFlags, Deserialize, Error, FieldAccessFlags, FieldType,
    MethodAccessFlags, MethodDescriptor, Name, ParseDescriptor, RefType, RenderDescriptor,
    Serialize, UnqualifiedName,
};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Result};

/// Conversion between raw bytes and the editable class model
pub trait ClassCodec: Send + Sync {
    /// Parse raw bytes into a class
    fn parse(&self, bytes: &[u8]) -> std::result::Result<ClassModel, Error>;

    /// Encode a class back into raw bytes
    fn emit(&self, class: &ClassModel) -> std::result::Result<Vec<u8>, Error>;
}

/// Codec for the unit image format
#[derive(Copy, Clone, Debug, Default)]
pub struct UnitImageCodec;

impl UnitImageCodec {
    pub const MAGIC: u32 = 0x5157_5549;
    pub const VERSION: u16 = 1;
}

impl ClassCodec for UnitImageCodec {
    fn parse(&self, bytes: &[u8]) -> std::result::Result<ClassModel, Error> {
        let mut reader = Cursor::new(bytes);

        let magic = u32::deserialize(&mut reader)?;
        if magic != Self::MAGIC {
            return Err(malformed(format!("Bad magic number {:#010x}", magic)));
        }
        let version = u16::deserialize(&mut reader)?;
        if version != Self::VERSION {
            return Err(malformed(format!("Unsupported format version {}", version)));
        }

        let class = ClassModel::deserialize(&mut reader)?;
        let consumed = reader.position();
        if consumed != bytes.len() as u64 {
            let leftover = bytes.len() as u64 - consumed;
            return Err(malformed(format!("{} bytes of trailing data", leftover)));
        }
        Ok(class)
    }

    fn emit(&self, class: &ClassModel) -> std::result::Result<Vec<u8>, Error> {
        let mut bytes = vec![];
        Self::MAGIC.serialize(&mut bytes)?;
        Self::VERSION.serialize(&mut bytes)?;
        class.serialize(&mut bytes)?;
        Ok(bytes)
    }
}

pub(crate) fn malformed(message: String) -> Error {
    Error::Malformed(message)
}

impl Serialize for BinaryName {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.as_str().serialize(writer)
    }
}

impl Deserialize for BinaryName {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        BinaryName::from_string(String::deserialize(reader)?).map_err(malformed)
    }
}

impl Serialize for UnqualifiedName {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.as_str().serialize(writer)
    }
}

impl Deserialize for UnqualifiedName {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        UnqualifiedName::from_string(String::deserialize(reader)?).map_err(malformed)
    }
}

/// Descriptors are written out as their string rendering
fn parse_descriptor<D: ParseDescriptor, R: ReadBytesExt>(
    reader: &mut R,
) -> std::result::Result<D, Error> {
    let descriptor = String::deserialize(reader)?;
    D::parse(&descriptor)
        .map_err(|err| malformed(format!("Invalid descriptor '{}': {}", descriptor, err)))
}

impl Serialize for FieldType {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.render().serialize(writer)
    }
}

impl Deserialize for FieldType {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        parse_descriptor(reader)
    }
}

impl Serialize for RefType {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.render().serialize(writer)
    }
}

impl Deserialize for RefType {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        parse_descriptor(reader)
    }
}

impl Serialize for MethodDescriptor {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.render().serialize(writer)
    }
}

impl Deserialize for MethodDescriptor {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        parse_descriptor(reader)
    }
}

impl Serialize for AnnotationValue {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        match self {
            AnnotationValue::String(value) => {
                b's'.serialize(writer)?;
                value.serialize(writer)
            }
            AnnotationValue::Int(value) => {
                b'I'.serialize(writer)?;
                value.serialize(writer)
            }
            AnnotationValue::Boolean(value) => {
                b'Z'.serialize(writer)?;
                value.serialize(writer)
            }
            AnnotationValue::Class(value) => {
                b'c'.serialize(writer)?;
                value.serialize(writer)
            }
            AnnotationValue::Array(values) => {
                b'['.serialize(writer)?;
                values.serialize(writer)
            }
        }
    }
}

impl Deserialize for AnnotationValue {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(match u8::deserialize(reader)? {
            b's' => AnnotationValue::String(String::deserialize(reader)?),
            b'I' => AnnotationValue::Int(i32::deserialize(reader)?),
            b'Z' => AnnotationValue::Boolean(bool::deserialize(reader)?),
            b'c' => AnnotationValue::Class(FieldType::deserialize(reader)?),
            b'[' => AnnotationValue::Array(Vec::deserialize(reader)?),
            other => {
                let msg = format!("Invalid annotation element tag '{}'", other as char);
                return Err(malformed(msg));
            }
        })
    }
}

impl Serialize for Annotation {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.type_name.serialize(writer)?;
        self.elements.serialize(writer)
    }
}

impl Deserialize for Annotation {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(Annotation {
            type_name: BinaryName::deserialize(reader)?,
            elements: Vec::deserialize(reader)?,
        })
    }
}

impl Serialize for TypeAnnotation {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        match self.target {
            TypeTarget::Field => 0x13u8.serialize(writer)?,
            TypeTarget::MethodReturn => 0x14u8.serialize(writer)?,
            TypeTarget::FormalParameter(index) => {
                0x16u8.serialize(writer)?;
                index.serialize(writer)?;
            }
            TypeTarget::LocalVariable(slot) => {
                0x40u8.serialize(writer)?;
                slot.serialize(writer)?;
            }
        }
        self.path.serialize(writer)?;
        self.annotation.serialize(writer)
    }
}

impl Deserialize for TypeAnnotation {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let target = match u8::deserialize(reader)? {
            0x13 => TypeTarget::Field,
            0x14 => TypeTarget::MethodReturn,
            0x16 => TypeTarget::FormalParameter(u16::deserialize(reader)?),
            0x40 => TypeTarget::LocalVariable(u16::deserialize(reader)?),
            other => {
                let msg = format!("Invalid type annotation target {:#04x}", other);
                return Err(malformed(msg));
            }
        };
        Ok(TypeAnnotation {
            target,
            path: Vec::deserialize(reader)?,
            annotation: Annotation::deserialize(reader)?,
        })
    }
}

impl Serialize for TypePathStep {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        match self {
            TypePathStep::ArrayElement => (0u8, 0u8).serialize(writer),
            TypePathStep::Nested => (1u8, 0u8).serialize(writer),
            TypePathStep::Wildcard => (2u8, 0u8).serialize(writer),
            TypePathStep::TypeArgument(index) => (3u8, *index).serialize(writer),
        }
    }
}

impl Deserialize for TypePathStep {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(match <(u8, u8)>::deserialize(reader)? {
            (0, _) => TypePathStep::ArrayElement,
            (1, _) => TypePathStep::Nested,
            (2, _) => TypePathStep::Wildcard,
            (3, index) => TypePathStep::TypeArgument(index),
            (other, _) => return Err(malformed(format!("Invalid type path kind {}", other))),
        })
    }
}

impl Serialize for FieldModel {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.access_flags.serialize(writer)?;
        self.name.serialize(writer)?;
        self.descriptor.serialize(writer)?;
        self.annotations.serialize(writer)?;
        self.type_annotations.serialize(writer)
    }
}

impl Deserialize for FieldModel {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(FieldModel {
            access_flags: FieldAccessFlags::deserialize(reader)?,
            name: UnqualifiedName::deserialize(reader)?,
            descriptor: FieldType::deserialize(reader)?,
            annotations: Vec::deserialize(reader)?,
            type_annotations: Vec::deserialize(reader)?,
        })
    }
}

impl Serialize for MethodModel {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.access_flags.serialize(writer)?;
        self.name.serialize(writer)?;
        self.descriptor.serialize(writer)?;
        self.annotations.serialize(writer)?;
        self.parameter_annotations.serialize(writer)?;
        self.type_annotations.serialize(writer)?;
        self.code.serialize(writer)
    }
}

impl Deserialize for MethodModel {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(MethodModel {
            access_flags: MethodAccessFlags::deserialize(reader)?,
            name: UnqualifiedName::deserialize(reader)?,
            descriptor: MethodDescriptor::deserialize(reader)?,
            annotations: Vec::deserialize(reader)?,
            parameter_annotations: Vec::deserialize(reader)?,
            type_annotations: Vec::deserialize(reader)?,
            code: Option::deserialize(reader)?,
        })
    }
}

impl Serialize for ClassModel {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.access_flags.serialize(writer)?;
        self.name.serialize(writer)?;
        self.superclass.serialize(writer)?;
        self.interfaces.serialize(writer)?;
        self.source_file.serialize(writer)?;
        self.annotations.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)
    }
}

impl Deserialize for ClassModel {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(ClassModel {
            access_flags: ClassAccessFlags::deserialize(reader)?,
            name: BinaryName::deserialize(reader)?,
            superclass: Option::deserialize(reader)?,
            interfaces: Vec::deserialize(reader)?,
            source_file: Option::deserialize(reader)?,
            annotations: Vec::deserialize(reader)?,
            fields: Vec::deserialize(reader)?,
            methods: Vec::deserialize(reader)?,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{
        BranchInstruction, CodeBuilder, Constant, EqComparison, FieldRef, Instruction,
        InvokeType, LabelGenerator, MethodRef,
    };

    fn sample_class() -> std::result::Result<ClassModel, Error> {
        let mut class = ClassModel::new(
            BinaryName::from_str("me/Greeter").map_err(malformed)?,
            Some(BinaryName::OBJECT),
            ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
        );
        class.source_file = Some(String::from("Greeter.java"));
        class.annotations.push(
            Annotation::marker(BinaryName::ANNOTATEDFOR).with_element(
                UnqualifiedName::VALUE,
                AnnotationValue::Array(vec![AnnotationValue::String(String::from("nullness"))]),
            ),
        );

        let name = UnqualifiedName::from_str("name").map_err(malformed)?;
        let mut field = FieldModel::new(
            name.clone(),
            FieldType::object(BinaryName::STRING),
            FieldAccessFlags::PRIVATE,
        );
        field
            .type_annotations
            .push(TypeAnnotation::new(TypeTarget::Field, Annotation::marker(BinaryName::NULLABLE)));
        class.add_field(field);

        let descriptor = MethodDescriptor::parse("(Ljava/lang/String;)Ljava/lang/String;")?;
        let mut method = MethodModel::new(
            UnqualifiedName::from_str("greet").map_err(malformed)?,
            descriptor,
            MethodAccessFlags::PUBLIC,
        );
        method.parameter_annotations = vec![vec![Annotation::marker(BinaryName::NONNULL)]];

        let mut code = CodeBuilder::new(2);
        let fallback = code.fresh_label();
        code.push_line_number(12);
        code.push_instruction(Instruction::ALoad(1));
        code.push_branch_instruction(BranchInstruction::IfNull(EqComparison::EQ, fallback));
        code.push_instruction(Instruction::ALoad(0));
        code.push_instruction(Instruction::GetField(FieldRef {
            owner: class.name.clone(),
            name,
            descriptor: FieldType::object(BinaryName::STRING),
        }));
        code.push_instruction(Instruction::ALoad(1));
        code.push_instruction(Instruction::Invoke(
            InvokeType::Virtual,
            MethodRef {
                owner: BinaryName::STRING,
                name: UnqualifiedName::from_str("concat").map_err(malformed)?,
                descriptor: MethodDescriptor::parse("(Ljava/lang/String;)Ljava/lang/String;")?,
            },
        ));
        code.push_branch_instruction(BranchInstruction::AReturn);
        code.place_label(fallback)?;
        code.push_instruction(Instruction::Ldc(Constant::String(String::from("nobody"))));
        code.push_branch_instruction(BranchInstruction::AReturn);
        method.code = Some(code.result(vec![])?);
        class.add_method(method);

        Ok(class)
    }

    #[test]
    fn emitted_classes_parse_back() -> std::result::Result<(), Error> {
        let class = sample_class()?;
        let bytes = UnitImageCodec.emit(&class)?;
        assert_eq!(UnitImageCodec.parse(&bytes)?, class);
        Ok(())
    }

    #[test]
    fn rejects_bad_input() -> std::result::Result<(), Error> {
        let bytes = UnitImageCodec.emit(&sample_class()?)?;

        // Bad magic
        let mut bad_magic = bytes.clone();
        bad_magic[0] ^= 0xff;
        assert!(matches!(
            UnitImageCodec.parse(&bad_magic),
            Err(Error::Malformed(_))
        ));

        // Truncated
        assert!(UnitImageCodec.parse(&bytes[..bytes.len() - 3]).is_err());

        // Trailing garbage
        let mut trailing = bytes;
        trailing.push(0);
        assert!(matches!(
            UnitImageCodec.parse(&trailing),
            Err(Error::Malformed(_))
        ));
        Ok(())
    }

    #[test]
    fn descriptor_errors_are_malformed_units() {
        let err: Error = MethodDescriptor::parse("(Ljava/lang/String;").unwrap_err().into();
        match err {
            Error::Malformed(message) => assert!(message.contains("invalid descriptor")),
            other => panic!("unexpected error {}", other),
        }
    }
}
