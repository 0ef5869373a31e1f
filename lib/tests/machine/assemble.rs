//! Shorthands for putting together classes in tests

use qualweave::jvm::annotations::Annotation;
use qualweave::jvm::code::{
    BranchInstruction, CodeBuilder, CodeElement, FieldRef, Instruction, MethodRef,
};
use qualweave::jvm::model::{ClassModel, FieldModel, MethodModel};
use qualweave::jvm::{
    BinaryName, ClassAccessFlags, FieldAccessFlags, FieldType, MethodAccessFlags,
    MethodDescriptor, Name, ParseDescriptor, UnqualifiedName,
};

pub fn name(name: &str) -> BinaryName {
    BinaryName::from_str(name).unwrap()
}

pub fn member(name: &str) -> UnqualifiedName {
    UnqualifiedName::from_str(name).unwrap()
}

pub fn method_ref(owner: &str, method: &str, descriptor: &str) -> MethodRef {
    MethodRef {
        owner: name(owner),
        name: member(method),
        descriptor: MethodDescriptor::parse(descriptor).unwrap(),
    }
}

pub fn field_ref(owner: &str, field: &str, descriptor: &str) -> FieldRef {
    FieldRef {
        owner: name(owner),
        name: member(field),
        descriptor: FieldType::parse(descriptor).unwrap(),
    }
}

pub fn insn(instruction: Instruction) -> CodeElement {
    CodeElement::Instruction(instruction)
}

pub fn branch(instruction: BranchInstruction) -> CodeElement {
    CodeElement::Branch(instruction)
}

/// Class with source file `<simple name>.java`
pub fn class(class_name: &str, superclass: &str) -> ClassModel {
    let mut class = ClassModel::new(
        name(class_name),
        Some(name(superclass)),
        ClassAccessFlags::PUBLIC,
    );
    let simple_name = class_name.rsplit('/').next().unwrap_or(class_name);
    class.source_file = Some(format!("{}.java", simple_name));
    class
}

pub fn method(
    method_name: &str,
    descriptor: &str,
    access_flags: MethodAccessFlags,
    max_locals: u16,
    elements: Vec<CodeElement>,
) -> MethodModel {
    let descriptor = MethodDescriptor::parse(descriptor).unwrap();
    let mut method = MethodModel::new(member(method_name), descriptor, access_flags);
    let mut code = CodeBuilder::new(max_locals);
    for element in elements {
        code.push_element(element).unwrap();
    }
    method.code = Some(code.result(vec![]).unwrap());
    method
}

pub fn static_method(
    method_name: &str,
    descriptor: &str,
    max_locals: u16,
    elements: Vec<CodeElement>,
) -> MethodModel {
    let flags = MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC;
    method(method_name, descriptor, flags, max_locals, elements)
}

pub fn field(field_name: &str, descriptor: &str, access_flags: FieldAccessFlags) -> FieldModel {
    FieldModel::new(
        member(field_name),
        FieldType::parse(descriptor).unwrap(),
        access_flags,
    )
}

pub fn nonnull() -> Annotation {
    Annotation::marker(BinaryName::NONNULL)
}

pub fn nullable() -> Annotation {
    Annotation::marker(BinaryName::NULLABLE)
}
