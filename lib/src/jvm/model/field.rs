use crate::jvm::annotations::{Annotation, TypeAnnotation};
use crate::jvm::{FieldAccessFlags, FieldType, UnqualifiedName};

#[derive(Clone, Debug, PartialEq)]
pub struct FieldModel {
    pub name: UnqualifiedName,
    pub descriptor: FieldType,
    pub access_flags: FieldAccessFlags,

    /// Declaration annotations
    pub annotations: Vec<Annotation>,

    /// Type annotations (all targeting the field type)
    pub type_annotations: Vec<TypeAnnotation>,
}

impl FieldModel {
    pub fn new(
        name: UnqualifiedName,
        descriptor: FieldType,
        access_flags: FieldAccessFlags,
    ) -> FieldModel {
        FieldModel {
            name,
            descriptor,
            access_flags,
            annotations: vec![],
            type_annotations: vec![],
        }
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }
}
