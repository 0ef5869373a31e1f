use std::borrow::Cow;
use std::fmt;

macro_rules! name_type {
    ($(#[$meta:meta])* $ty:ident) => {
        $(#[$meta])*
        #[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
        pub struct $ty(Cow<'static, str>);

        impl $ty {
            const fn name(value: &'static str) -> $ty {
                $ty(Cow::Borrowed(value))
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

name_type! {
    /// Names of methods and fields
    ///
    /// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.2>
    UnqualifiedName
}

name_type! {
    /// Slash-separated names of classes, interfaces, and annotation types (eg. `java/lang/Object`)
    ///
    /// See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
    BinaryName
}

/// Validated name
pub trait Name: Sized + AsRef<str> {
    /// Reason the string is not a valid name, if there is one
    fn check_valid(name: impl AsRef<str>) -> Result<(), String>;

    fn as_cow(&self) -> &Cow<'static, str>;

    fn as_str(&self) -> &str {
        self.as_cow()
    }

    fn from_string(name: String) -> Result<Self, String>;

    fn from_str(name: &str) -> Result<Self, String> {
        Self::from_string(String::from(name))
    }
}

const ILLEGAL_CHARACTERS: [char; 4] = ['.', ';', '[', '/'];

impl Name for UnqualifiedName {
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        match name.as_ref() {
            "" => Err(String::from("Unqualified name is empty")),
            name => match name.find(&ILLEGAL_CHARACTERS[..]) {
                Some(index) => Err(format!(
                    "Unqualified name '{}' has an illegal character at {}",
                    name, index
                )),
                None => Ok(()),
            },
        }
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name).map(|()| UnqualifiedName(Cow::Owned(name)))
    }
}

impl Name for BinaryName {
    /// Every `/`-separated segment must be a valid unqualified name
    fn check_valid(name: impl AsRef<str>) -> Result<(), String> {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(String::from("Binary name is empty"));
        }
        for segment in name.split('/') {
            UnqualifiedName::check_valid(segment)
                .map_err(|err| format!("Binary name '{}': {}", name, err))?;
        }
        Ok(())
    }

    fn as_cow(&self) -> &Cow<'static, str> {
        &self.0
    }

    fn from_string(name: String) -> Result<Self, String> {
        Self::check_valid(&name).map(|()| BinaryName(Cow::Owned(name)))
    }
}

impl UnqualifiedName {
    // Special unqualified names - only these are allowed to have angle brackets in them
    pub const INIT: Self = Self::name("<init>");
    pub const CLINIT: Self = Self::name("<clinit>");

    pub const PACKAGEINFO: Self = Self::name("package-info");
    pub const VALUE: Self = Self::name("value");

    // Members of the runtime support classes
    pub const CHECKNOTNULL: Self = Self::name("checkNotNull");
    pub const CALLER: Self = Self::name("CALLER");
    pub const LOCAL: Self = Self::name("LOCAL");
}

impl BinaryName {
    /// Join segments from the other name onto the end of this binary name
    pub fn join(&self, other: impl Name) -> BinaryName {
        BinaryName(Cow::Owned(format!("{}/{}", self.as_str(), other.as_str())))
    }

    /// Enclosing package of the class (eg. `java/lang` for `java/lang/Object`)
    ///
    /// Classes in the unnamed package have no enclosing package.
    pub fn package(&self) -> Option<BinaryName> {
        self.as_str()
            .rsplit_once('/')
            .map(|(package, _)| BinaryName(Cow::Owned(package.to_owned())))
    }

    /// Class declaring package-level annotations for the package enclosing this class
    pub fn package_info(&self) -> Option<BinaryName> {
        self.package()
            .map(|package| package.join(UnqualifiedName::PACKAGEINFO))
    }

    /// Does this name fall under the given namespace prefix (eg. `java/`)?
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.as_str().starts_with(prefix)
    }

    /// `package-info` unit of the unnamed package
    pub const PACKAGEINFO: Self = Self::name("package-info");

    // JDK names
    pub const OBJECT: Self = Self::name("java/lang/Object");
    pub const STRING: Self = Self::name("java/lang/String");
    pub const CLASS: Self = Self::name("java/lang/Class");
    pub const THROWABLE: Self = Self::name("java/lang/Throwable");

    // Qualifiers understood by the nullness checker
    pub const NONNULL: Self = Self::name("org/checkerframework/checker/nullness/qual/NonNull");
    pub const NULLABLE: Self = Self::name("org/checkerframework/checker/nullness/qual/Nullable");

    // Runtime support classes referenced from woven code
    pub const ANNOTATEDFOR: Self = Self::name("qualweave/qual/AnnotatedFor");
    pub const ATTRIBUTIONKIND: Self = Self::name("qualweave/runtime/AttributionKind");
    pub const NULLNESSRUNTIMEVERIFIER: Self =
        Self::name("qualweave/checker/nullness/NullnessRuntimeVerifier");
}
