use crate::jvm::annotations::{Annotation, AnnotationValue};
use crate::jvm::model::ClassModel;
use crate::jvm::{BinaryName, Name, UnqualifiedName};
use crate::resolution::ClassResolver;
use dashmap::DashMap;
use std::sync::Arc;

/// Discovers units which opt into a qualifier system with an `@AnnotatedFor` marker
///
/// A unit is opted in if either it or the `package-info` unit of its package carries
/// `@qualweave.qual.AnnotatedFor` with the system name among its `value`s. Package lookups go
/// through the resolver, so the answer for each package is cached (the cache may be raced, but
/// every writer computes the same answer).
pub struct MarkerLookup {
    system: String,
    resolver: Arc<dyn ClassResolver>,

    /// Whether each package (by name, empty for the unnamed package) is marked
    package_cache: DashMap<String, bool>,
}

impl MarkerLookup {
    pub fn new(system: impl Into<String>, resolver: Arc<dyn ClassResolver>) -> MarkerLookup {
        MarkerLookup {
            system: system.into(),
            resolver,
            package_cache: DashMap::new(),
        }
    }

    /// Name of the qualifier system the marker must mention
    pub fn system(&self) -> &str {
        &self.system
    }

    /// Is this class (or its package) marked?
    pub fn has_marker(&self, class: &ClassModel) -> bool {
        annotated_for(&class.annotations, &self.system) || self.package_has_marker(&class.name)
    }

    /// Is the class with this name (or its package) marked?
    ///
    /// If the class can't be loaded, only the package is considered.
    pub fn is_marked(&self, name: &BinaryName) -> bool {
        match self.resolver.load(name) {
            Ok(class) => self.has_marker(&class),
            Err(err) => {
                log::debug!("Marker lookup for {} fell back to its package: {}", name, err);
                self.package_has_marker(name)
            }
        }
    }

    /// Is the package enclosing this class marked?
    pub fn package_has_marker(&self, name: &BinaryName) -> bool {
        let package = name.package();
        let key = package
            .as_ref()
            .map_or_else(String::new, |package| package.as_str().to_owned());
        if let Some(cached) = self.package_cache.get(&key) {
            return *cached;
        }

        let package_info = match package {
            Some(package) => package.join(UnqualifiedName::PACKAGEINFO),
            None => BinaryName::PACKAGEINFO,
        };
        let marked = match self.resolver.load(&package_info) {
            Ok(info) => annotated_for(&info.annotations, &self.system),
            Err(err) => {
                log::debug!("No package marker for {}: {}", name, err);
                false
            }
        };
        if marked {
            log::info!("Package of {} is annotated for {}", name, self.system);
        }
        self.package_cache.insert(key, marked);
        marked
    }
}

/// Does one of the annotations mark the element as written for the given system?
pub fn annotated_for(annotations: &[Annotation], system: &str) -> bool {
    annotations
        .iter()
        .filter(|annotation| annotation.type_name == BinaryName::ANNOTATEDFOR)
        .filter_map(|annotation| annotation.element(&UnqualifiedName::VALUE))
        .any(|value| match value {
            AnnotationValue::String(name) => name == system,
            AnnotationValue::Array(values) => values
                .iter()
                .any(|value| matches!(value, AnnotationValue::String(name) if name == system)),
            _ => false,
        })
}
