use crate::jvm::codec::{ClassCodec, UnitImageCodec};
use crate::jvm::model::ClassModel;
use crate::jvm::{BinaryName, Name};
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
pub enum LookupError {
    /// No class with this name could be found
    NotFound(BinaryName),

    /// A class was found, but its contents could not be parsed
    Malformed(BinaryName, String),

    Io(BinaryName, std::io::Error),
}

impl LookupError {
    /// Class that was being looked up
    pub fn class_name(&self) -> &BinaryName {
        match self {
            LookupError::NotFound(name) => name,
            LookupError::Malformed(name, _) => name,
            LookupError::Io(name, _) => name,
        }
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupError::NotFound(name) => write!(f, "class {} not found", name),
            LookupError::Malformed(name, reason) => {
                write!(f, "class {} is malformed: {}", name, reason)
            }
            LookupError::Io(name, err) => write!(f, "failed to read class {}: {}", name, err),
        }
    }
}

impl std::error::Error for LookupError {}

/// Source of class metadata
pub trait ClassResolver: Send + Sync {
    fn load(&self, name: &BinaryName) -> Result<ClassModel, LookupError>;
}

impl<R: ClassResolver + ?Sized> ClassResolver for Arc<R> {
    fn load(&self, name: &BinaryName) -> Result<ClassModel, LookupError> {
        (**self).load(name)
    }
}

/// Resolver over classes held in memory
#[derive(Clone, Debug, Default)]
pub struct MapResolver {
    classes: HashMap<BinaryName, ClassModel>,
}

impl MapResolver {
    pub fn new() -> MapResolver {
        MapResolver::default()
    }

    /// Add a class (replacing any previous class by the same name)
    pub fn insert(&mut self, class: ClassModel) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn with(mut self, class: ClassModel) -> MapResolver {
        self.insert(class);
        self
    }
}

impl FromIterator<ClassModel> for MapResolver {
    fn from_iter<I: IntoIterator<Item = ClassModel>>(classes: I) -> MapResolver {
        let mut resolver = MapResolver::new();
        for class in classes {
            resolver.insert(class);
        }
        resolver
    }
}

impl ClassResolver for MapResolver {
    fn load(&self, name: &BinaryName) -> Result<ClassModel, LookupError> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(name.clone()))
    }
}

/// Resolver reading `<root>/<binary name>.unit` files
pub struct DirectoryResolver {
    root: PathBuf,
    codec: Arc<dyn ClassCodec>,
}

impl DirectoryResolver {
    pub const EXTENSION: &'static str = "unit";

    pub fn new(root: impl Into<PathBuf>) -> DirectoryResolver {
        DirectoryResolver::with_codec(root, Arc::new(UnitImageCodec))
    }

    pub fn with_codec(root: impl Into<PathBuf>, codec: Arc<dyn ClassCodec>) -> DirectoryResolver {
        DirectoryResolver {
            root: root.into(),
            codec,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the unit for a given class would be
    pub fn path_of(&self, name: &BinaryName) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(name.as_str().split('/'));
        path.set_extension(Self::EXTENSION);
        path
    }
}

impl ClassResolver for DirectoryResolver {
    fn load(&self, name: &BinaryName) -> Result<ClassModel, LookupError> {
        let path = self.path_of(name);
        let bytes = std::fs::read(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => LookupError::NotFound(name.clone()),
            _ => LookupError::Io(name.clone(), err),
        })?;
        let class = self
            .codec
            .parse(&bytes)
            .map_err(|err| LookupError::Malformed(name.clone(), err.to_string()))?;
        if &class.name != name {
            let reason = format!("{} declares class {}", path.display(), class.name);
            return Err(LookupError::Malformed(name.clone(), reason));
        }
        Ok(class)
    }
}

/// Resolver trying several other resolvers in order
///
/// The first resolver to find the class wins. If no resolver finds it, the first error other
/// than [`LookupError::NotFound`] is returned (if there is one).
#[derive(Default)]
pub struct ChainResolver {
    resolvers: Vec<Arc<dyn ClassResolver>>,
}

impl ChainResolver {
    pub fn new(resolvers: Vec<Arc<dyn ClassResolver>>) -> ChainResolver {
        ChainResolver { resolvers }
    }

    pub fn push(&mut self, resolver: Arc<dyn ClassResolver>) {
        self.resolvers.push(resolver);
    }
}

impl ClassResolver for ChainResolver {
    fn load(&self, name: &BinaryName) -> Result<ClassModel, LookupError> {
        let mut first_error = None;
        for resolver in &self.resolvers {
            match resolver.load(name) {
                Ok(class) => return Ok(class),
                Err(LookupError::NotFound(_)) => (),
                Err(err) => {
                    log::debug!("Lookup of {} failed: {}", name, err);
                    first_error.get_or_insert(err);
                }
            }
        }
        Err(first_error.unwrap_or_else(|| LookupError::NotFound(name.clone())))
    }
}
