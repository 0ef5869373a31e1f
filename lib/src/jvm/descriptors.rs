//! Field and method descriptors
//!
//! See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.3>

use super::{BinaryName, Name};
use crate::util::Width;
use std::fmt;

/// Descriptor that didn't parse
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DescriptorError {
    /// Byte offset into the descriptor where things went wrong
    pub position: usize,
    pub message: String,
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at offset {})", self.message, self.position)
    }
}

impl std::error::Error for DescriptorError {}

pub trait RenderDescriptor {
    /// Descriptor string
    fn render(&self) -> String {
        let mut rendered = String::new();
        self.render_to(&mut rendered);
        rendered
    }

    /// Append the descriptor string
    fn render_to(&self, out: &mut String);
}

pub trait ParseDescriptor: Sized {
    /// Parse a whole descriptor string
    fn parse(source: &str) -> Result<Self, DescriptorError> {
        let mut reader = DescriptorReader { source, position: 0 };
        let parsed = Self::read(&mut reader)?;
        if reader.position < source.len() {
            return Err(reader.error("trailing characters"));
        }
        Ok(parsed)
    }

    /// Parse a descriptor off the front of the reader
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, DescriptorError>;
}

/// Cursor into a descriptor string
pub struct DescriptorReader<'a> {
    source: &'a str,
    position: usize,
}

impl<'a> DescriptorReader<'a> {
    fn peek(&self) -> Option<char> {
        self.source[self.position..].chars().next()
    }

    fn next(&mut self) -> Option<char> {
        let next = self.peek()?;
        self.position += next.len_utf8();
        Some(next)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.position += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> DescriptorError {
        DescriptorError {
            position: self.position,
            message: message.into(),
        }
    }
}

/// Primitive value types
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    const ALL: [(BaseType, char); 8] = [
        (BaseType::Byte, 'B'),
        (BaseType::Char, 'C'),
        (BaseType::Double, 'D'),
        (BaseType::Float, 'F'),
        (BaseType::Int, 'I'),
        (BaseType::Long, 'J'),
        (BaseType::Short, 'S'),
        (BaseType::Boolean, 'Z'),
    ];

    pub fn descriptor_char(&self) -> char {
        Self::ALL
            .iter()
            .find(|(base_type, _)| base_type == self)
            .map_or('V', |(_, c)| *c)
    }

    pub fn from_descriptor_char(c: char) -> Option<BaseType> {
        Self::ALL
            .iter()
            .find(|(_, descriptor)| *descriptor == c)
            .map(|(base_type, _)| *base_type)
    }
}

impl Width for BaseType {
    fn width(&self) -> usize {
        if matches!(self, BaseType::Double | BaseType::Long) {
            2
        } else {
            1
        }
    }
}

impl RenderDescriptor for BaseType {
    fn render_to(&self, out: &mut String) {
        out.push(self.descriptor_char());
    }
}

impl ParseDescriptor for BaseType {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, DescriptorError> {
        match reader.peek() {
            Some(c) => match BaseType::from_descriptor_char(c) {
                Some(base_type) => {
                    reader.next();
                    Ok(base_type)
                }
                None => Err(reader.error(format!("'{}' is not a primitive type", c))),
            },
            None => Err(reader.error("expected a primitive type")),
        }
    }
}

impl RenderDescriptor for BinaryName {
    fn render_to(&self, out: &mut String) {
        out.push('L');
        out.push_str(self.as_str());
        out.push(';');
    }
}

impl ParseDescriptor for BinaryName {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, DescriptorError> {
        if !reader.eat('L') {
            return Err(reader.error("expected 'L'"));
        }
        let start = reader.position;
        let length = reader.source[start..]
            .find(';')
            .ok_or_else(|| reader.error("unterminated class name"))?;
        let name = BinaryName::from_str(&reader.source[start..start + length])
            .map_err(|message| reader.error(message))?;
        reader.position = start + length + 1;
        Ok(name)
    }
}

/// Reference type
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum RefType {
    Object(BinaryName),

    /// Array with the given element type
    Array(Box<FieldType>),
}

impl RefType {
    pub const fn object(class_name: BinaryName) -> RefType {
        RefType::Object(class_name)
    }

    pub fn array(element_type: FieldType) -> RefType {
        RefType::Array(Box::new(element_type))
    }
}

impl RenderDescriptor for RefType {
    fn render_to(&self, out: &mut String) {
        match self {
            RefType::Object(class_name) => class_name.render_to(out),
            RefType::Array(element_type) => {
                out.push('[');
                element_type.render_to(out);
            }
        }
    }
}

impl ParseDescriptor for RefType {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, DescriptorError> {
        if reader.eat('[') {
            FieldType::read(reader).map(RefType::array)
        } else if reader.peek() == Some('L') {
            BinaryName::read(reader).map(RefType::Object)
        } else {
            Err(reader.error("expected a reference type"))
        }
    }
}

/// Type of a field, parameter, return value, or local variable
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldType {
    Base(BaseType),
    Ref(RefType),
}

impl Width for FieldType {
    fn width(&self) -> usize {
        match self {
            FieldType::Base(base_type) => base_type.width(),
            FieldType::Ref(_) => 1,
        }
    }
}

impl FieldType {
    pub fn array(element_type: FieldType) -> FieldType {
        FieldType::Ref(RefType::array(element_type))
    }

    pub const fn object(class_name: BinaryName) -> FieldType {
        FieldType::Ref(RefType::Object(class_name))
    }

    pub const fn int() -> FieldType {
        FieldType::Base(BaseType::Int)
    }

    pub const fn long() -> FieldType {
        FieldType::Base(BaseType::Long)
    }

    pub const fn double() -> FieldType {
        FieldType::Base(BaseType::Double)
    }

    pub const fn boolean() -> FieldType {
        FieldType::Base(BaseType::Boolean)
    }

    pub const fn is_reference(&self) -> bool {
        matches!(self, FieldType::Ref(_))
    }
}

impl RenderDescriptor for FieldType {
    fn render_to(&self, out: &mut String) {
        match self {
            FieldType::Base(base_type) => base_type.render_to(out),
            FieldType::Ref(ref_type) => ref_type.render_to(out),
        }
    }
}

impl ParseDescriptor for FieldType {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, DescriptorError> {
        match reader.peek() {
            Some('L' | '[') => RefType::read(reader).map(FieldType::Ref),
            _ => BaseType::read(reader).map(FieldType::Base),
        }
    }
}

/// Signature of a method
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct MethodDescriptor {
    pub parameters: Vec<FieldType>,

    /// `None` for `void`
    pub return_type: Option<FieldType>,
}

impl MethodDescriptor {
    /// Slots taken up by the parameters (and the receiver, if there is one)
    pub fn parameter_length(&self, has_this_param: bool) -> usize {
        self.parameters.width() + usize::from(has_this_param)
    }

    /// Erased kind of the returned value
    pub fn return_kind(&self) -> TypeKind {
        self.return_type
            .as_ref()
            .map_or(TypeKind::Void, TypeKind::from)
    }
}

impl RenderDescriptor for MethodDescriptor {
    fn render_to(&self, out: &mut String) {
        out.push('(');
        for parameter in &self.parameters {
            parameter.render_to(out);
        }
        out.push(')');
        match &self.return_type {
            Some(return_type) => return_type.render_to(out),
            None => out.push('V'),
        }
    }
}

impl ParseDescriptor for MethodDescriptor {
    fn read(reader: &mut DescriptorReader<'_>) -> Result<Self, DescriptorError> {
        if !reader.eat('(') {
            return Err(reader.error("expected '('"));
        }
        let mut parameters = vec![];
        while !reader.eat(')') {
            if reader.peek().is_none() {
                return Err(reader.error("unterminated parameter list"));
            }
            parameters.push(FieldType::read(reader)?);
        }
        let return_type = if reader.eat('V') {
            None
        } else {
            Some(FieldType::read(reader)?)
        };
        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }
}

/// Erased category of a value at some program point
///
/// This is what the weaver reasons about: it only needs to know if a value is a reference (and so
/// may be checked) and how many slots it takes up. Sub-`int` primitives are all `Int`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeKind {
    Int,
    Long,
    Float,
    Double,
    Reference,
    Void,
}

impl TypeKind {
    /// Number of local variable (or operand stack) slots taken by a value of this kind
    pub const fn slot_size(&self) -> usize {
        match self {
            TypeKind::Void => 0,
            TypeKind::Long | TypeKind::Double => 2,
            _ => 1,
        }
    }

    pub const fn is_reference(&self) -> bool {
        matches!(self, TypeKind::Reference)
    }
}

impl From<&FieldType> for TypeKind {
    fn from(field_type: &FieldType) -> TypeKind {
        match field_type {
            FieldType::Ref(_) => TypeKind::Reference,
            FieldType::Base(BaseType::Long) => TypeKind::Long,
            FieldType::Base(BaseType::Double) => TypeKind::Double,
            FieldType::Base(BaseType::Float) => TypeKind::Float,
            FieldType::Base(_) => TypeKind::Int,
        }
    }
}
