//! Annotations and the qualifiers extracted from them
//!
//! Annotations come in two flavours:
//!
//!   - __declaration__ annotations attach to a class, field, method, or method parameter
//!   - __type__ annotations attach to a use of a type, and may point inside that type (eg. at the
//!     element type of an array) through a [`TypePathStep`] path
//!
//! The weaver does not care about that distinction, so [`annotations_of`] flattens both into
//! [`QualifierRef`]s for a given [`Element`].

use super::model::{FieldModel, MethodModel};
use super::{BinaryName, FieldType, UnqualifiedName};

/// Value of an annotation element
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AnnotationValue {
    String(String),
    Int(i32),
    Boolean(bool),
    Class(FieldType),
    Array(Vec<AnnotationValue>),
}

/// Annotation along with its element values
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Annotation {
    pub type_name: BinaryName,
    pub elements: Vec<(UnqualifiedName, AnnotationValue)>,
}

impl Annotation {
    /// Annotation with no elements
    pub fn marker(type_name: BinaryName) -> Annotation {
        Annotation {
            type_name,
            elements: vec![],
        }
    }

    pub fn with_element(mut self, name: UnqualifiedName, value: AnnotationValue) -> Annotation {
        self.elements.push((name, value));
        self
    }

    /// Find the value of the first element with a given name
    pub fn element(&self, name: &UnqualifiedName) -> Option<&AnnotationValue> {
        self.elements
            .iter()
            .find(|(element_name, _)| element_name == name)
            .map(|(_, value)| value)
    }
}

/// What part of a declaration a type annotation is on
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeTarget {
    Field,
    MethodReturn,
    FormalParameter(u16),
    LocalVariable(u16),
}

/// One step into a type annotation's type
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypePathStep {
    ArrayElement,
    Nested,
    Wildcard,
    TypeArgument(u8),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TypeAnnotation {
    pub target: TypeTarget,

    /// Empty when the annotation is on the outermost type
    pub path: Vec<TypePathStep>,

    pub annotation: Annotation,
}

impl TypeAnnotation {
    pub fn new(target: TypeTarget, annotation: Annotation) -> TypeAnnotation {
        TypeAnnotation {
            target,
            path: vec![],
            annotation,
        }
    }
}

/// Element which a qualifier is attached to
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum QualifierTarget {
    Parameter(u16),
    Field,
    Return,
    LocalVariable(u16),
}

/// Applied qualifier
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct QualifierRef {
    /// Identity of the qualifier (the annotation type)
    pub qualifier: BinaryName,

    pub target: QualifierTarget,

    /// Path to a nested type (eg. array elements), empty for the element itself
    pub nesting: Vec<TypePathStep>,
}

impl QualifierRef {
    /// Does the qualifier apply to the element itself (and not some type nested inside it)?
    pub fn is_top_level(&self) -> bool {
        self.nesting.is_empty()
    }
}

/// Annotatable element of a class
#[derive(Copy, Clone, Debug)]
pub enum Element<'a> {
    Parameter(&'a MethodModel, u16),
    Return(&'a MethodModel),
    Field(&'a FieldModel),
    LocalVariable(&'a MethodModel, u16),
}

/// Collect every qualifier attached to an element
///
/// Declaration annotations on a method are treated as applying to its return value.
pub fn annotations_of(element: Element<'_>) -> Vec<QualifierRef> {
    let no_annotations: &[Annotation] = &[];
    let (target, declared, type_annotations) = match element {
        Element::Parameter(method, index) => (
            QualifierTarget::Parameter(index),
            method
                .parameter_annotations
                .get(index as usize)
                .map_or(no_annotations, Vec::as_slice),
            method.type_annotations.as_slice(),
        ),
        Element::Return(method) => (
            QualifierTarget::Return,
            method.annotations.as_slice(),
            method.type_annotations.as_slice(),
        ),
        Element::Field(field) => (
            QualifierTarget::Field,
            field.annotations.as_slice(),
            field.type_annotations.as_slice(),
        ),
        Element::LocalVariable(method, slot) => (
            QualifierTarget::LocalVariable(slot),
            no_annotations,
            method.type_annotations.as_slice(),
        ),
    };

    let declared = declared.iter().map(|annotation| QualifierRef {
        qualifier: annotation.type_name.clone(),
        target,
        nesting: vec![],
    });
    let typed = type_annotations
        .iter()
        .filter(|type_annotation| target_matches(type_annotation.target, target))
        .map(|type_annotation| QualifierRef {
            qualifier: type_annotation.annotation.type_name.clone(),
            target,
            nesting: type_annotation.path.clone(),
        });
    declared.chain(typed).collect()
}

fn target_matches(type_target: TypeTarget, target: QualifierTarget) -> bool {
    match (type_target, target) {
        (TypeTarget::Field, QualifierTarget::Field) => true,
        (TypeTarget::MethodReturn, QualifierTarget::Return) => true,
        (TypeTarget::FormalParameter(i), QualifierTarget::Parameter(j)) => i == j,
        (TypeTarget::LocalVariable(i), QualifierTarget::LocalVariable(j)) => i == j,
        _ => false,
    }
}
