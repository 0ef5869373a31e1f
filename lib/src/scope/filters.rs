use super::ScopeFilter;
use crate::jvm::{BinaryName, Name};
use std::collections::HashSet;

/// Rejects platform classes and the runtime support classes of this crate
///
/// Instrumenting either would be unsafe: the checks call into the runtime support classes, so
/// instrumenting those recurses forever.
#[derive(Clone, Debug)]
pub struct FrameworkSafetyFilter {
    prefixes: Vec<String>,
}

impl FrameworkSafetyFilter {
    pub const DEFAULT_PREFIXES: [&'static str; 5] = ["java/", "javax/", "sun/", "jdk/", "qualweave/"];

    pub fn new() -> FrameworkSafetyFilter {
        FrameworkSafetyFilter {
            prefixes: Self::DEFAULT_PREFIXES
                .iter()
                .map(|prefix| String::from(*prefix))
                .collect(),
        }
    }

    /// Also reject classes under the given prefix (eg. `org/gradle/`)
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> FrameworkSafetyFilter {
        self.prefixes.push(prefix.into());
        self
    }
}

impl Default for FrameworkSafetyFilter {
    fn default() -> FrameworkSafetyFilter {
        FrameworkSafetyFilter::new()
    }
}

impl ScopeFilter for FrameworkSafetyFilter {
    fn test(&self, class: &BinaryName) -> bool {
        !self.prefixes.iter().any(|prefix| class.starts_with(prefix))
    }
}

/// Accepts exactly the listed classes
#[derive(Clone, Debug, Default)]
pub struct ClassListFilter {
    classes: HashSet<String>,
}

impl ClassListFilter {
    /// Build from class names in any of the usual spellings (`a.b.C`, `a/b/C`, `/a/b/C.class`)
    pub fn new<S: AsRef<str>>(classes: impl IntoIterator<Item = S>) -> ClassListFilter {
        ClassListFilter {
            classes: classes
                .into_iter()
                .filter_map(|class| Self::normalize(class.as_ref()))
                .collect(),
        }
    }

    /// Turn a class name into the internal spelling (`None` if there is nothing left)
    pub fn normalize(class: &str) -> Option<String> {
        let class = class.trim();
        let class = class.strip_prefix('/').unwrap_or(class);
        let class = class.strip_suffix(".class").unwrap_or(class);
        if class.is_empty() {
            None
        } else {
            Some(class.replace('.', "/"))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }
}

impl ScopeFilter for ClassListFilter {
    fn test(&self, class: &BinaryName) -> bool {
        self.classes.contains(class.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn safety_filter() -> Result<(), String> {
        let filter = FrameworkSafetyFilter::new().with_prefix("org/gradle/");
        assert!(!filter.test(&BinaryName::OBJECT));
        assert!(!filter.test(&BinaryName::NULLNESSRUNTIMEVERIFIER));
        assert!(!filter.test(&BinaryName::from_str("jdk/internal/Misc")?));
        assert!(!filter.test(&BinaryName::from_str("org/gradle/Worker")?));
        assert!(filter.test(&BinaryName::from_str("com/example/App")?));

        // Prefixes are namespaces, not arbitrary string prefixes
        assert!(filter.test(&BinaryName::from_str("javafoo/Thing")?));
        Ok(())
    }

    #[test]
    fn class_list_spellings() -> Result<(), String> {
        let filter = ClassListFilter::new(["com.example.A", "com/example/B", "/com/example/C.class", " "]);
        assert_eq!(filter.len(), 3);
        for name in ["com/example/A", "com/example/B", "com/example/C"] {
            assert!(filter.test(&BinaryName::from_str(name)?), "{}", name);
        }
        assert!(!filter.test(&BinaryName::from_str("com/example/D")?));
        Ok(())
    }
}
