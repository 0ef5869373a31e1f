use crate::jvm::annotations::Annotation;
use crate::jvm::model::{FieldModel, MethodModel};
use crate::jvm::{BinaryName, ClassAccessFlags, MethodDescriptor, UnqualifiedName};

/// Editable representation of a class
#[derive(Clone, Debug, PartialEq)]
pub struct ClassModel {
    /// The current class
    pub name: BinaryName,

    /// Direct superclass (only `java/lang/Object` has none)
    pub superclass: Option<BinaryName>,

    pub interfaces: Vec<BinaryName>,

    pub access_flags: ClassAccessFlags,

    /// Source file, used when reporting locations
    pub source_file: Option<String>,

    /// Declaration annotations on the class
    pub annotations: Vec<Annotation>,

    pub fields: Vec<FieldModel>,

    pub methods: Vec<MethodModel>,
}

impl ClassModel {
    /// Create a new class with no members
    pub fn new(
        name: BinaryName,
        superclass: Option<BinaryName>,
        access_flags: ClassAccessFlags,
    ) -> ClassModel {
        ClassModel {
            name,
            superclass,
            interfaces: vec![],
            access_flags,
            source_file: None,
            annotations: vec![],
            fields: vec![],
            methods: vec![],
        }
    }

    /// Find a field declared directly on this class
    pub fn find_field(&self, name: &UnqualifiedName) -> Option<&FieldModel> {
        self.fields.iter().find(|field| &field.name == name)
    }

    /// Find a method declared directly on this class
    pub fn find_method(
        &self,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor,
    ) -> Option<&MethodModel> {
        self.methods
            .iter()
            .find(|method| &method.name == name && &method.descriptor == descriptor)
    }

    /// Add a method to the class
    pub fn add_method(&mut self, method: MethodModel) {
        self.methods.push(method);
    }

    /// Add a field to the class
    pub fn add_field(&mut self, field: FieldModel) {
        self.fields.push(field);
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }
}
