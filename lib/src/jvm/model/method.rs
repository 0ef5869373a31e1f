use crate::jvm::annotations::{Annotation, TypeAnnotation};
use crate::jvm::code::Code;
use crate::jvm::{MethodAccessFlags, MethodDescriptor, RenderDescriptor, UnqualifiedName};

#[derive(Clone, Debug, PartialEq)]
pub struct MethodModel {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
    pub access_flags: MethodAccessFlags,

    /// Declaration annotations on the method itself
    pub annotations: Vec<Annotation>,

    /// Declaration annotations on each formal parameter
    ///
    /// This may be shorter than the number of parameters (missing entries have no annotations).
    pub parameter_annotations: Vec<Vec<Annotation>>,

    /// Type annotations on the return type, the parameter types, and local variables
    pub type_annotations: Vec<TypeAnnotation>,

    /// Method body (absent for `abstract` and `native` methods)
    pub code: Option<Code>,
}

impl MethodModel {
    pub fn new(
        name: UnqualifiedName,
        descriptor: MethodDescriptor,
        access_flags: MethodAccessFlags,
    ) -> MethodModel {
        MethodModel {
            name,
            descriptor,
            access_flags,
            annotations: vec![],
            parameter_annotations: vec![],
            type_annotations: vec![],
            code: None,
        }
    }

    /// Name and descriptor, which is what overriding is based on (eg. `getValue()Ljava/lang/String;`)
    pub fn signature(&self) -> String {
        format!("{}{}", self.name, self.descriptor.render())
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// Is this a constructor or static initializer?
    pub fn is_initializer(&self) -> bool {
        self.name == UnqualifiedName::INIT || self.name == UnqualifiedName::CLINIT
    }
}
