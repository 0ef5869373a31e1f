use super::SettingsError;
use crate::checkers::nullness::SYSTEM_NAME;
use crate::runtime::HandlerKind;
use std::fmt;

/// How much of the program gets woven
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EnforcementMode {
    /// Only checked classes are woven
    Standard,

    /// Every scanned class is woven, so that unchecked code can't poison checked state
    Global,
}

impl fmt::Display for EnforcementMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnforcementMode::Standard => f.write_str("standard"),
            EnforcementMode::Global => f.write_str("global"),
        }
    }
}

/// Configuration of the weaver
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Name of the qualifier system to enforce (see [`crate::checkers::checker_by_name`])
    pub checker: String,

    pub mode: EnforcementMode,

    /// Explicitly checked classes (when empty, every class outside of the platform is checked,
    /// unless markers are trusted)
    pub checked_classes: Vec<String>,

    /// Treat classes and packages with an `@AnnotatedFor` marker for the system as checked
    pub trust_annotated_for: bool,

    /// Violation handler to install (`None` keeps whatever is installed)
    pub handler: Option<HandlerKind>,
}

impl Settings {
    pub const CHECKER: &'static str = "runtime.checker";
    pub const CLASSES: &'static str = "runtime.classes";
    pub const GLOBAL: &'static str = "runtime.global";
    pub const TRUST_ANNOTATED_FOR: &'static str = "runtime.trustAnnotatedFor";
    pub const HANDLER: &'static str = "runtime.handler";

    /// Standard-mode settings for a checker
    pub fn new(checker: impl Into<String>) -> Settings {
        Settings {
            checker: checker.into(),
            mode: EnforcementMode::Standard,
            checked_classes: vec![],
            trust_annotated_for: false,
            handler: None,
        }
    }

    /// Read settings from `runtime.*` properties
    ///
    /// Other properties are ignored. Class lists are comma separated, flags are `true` or
    /// `false` (in any case), and a blank value counts as unset.
    pub fn from_properties<K, V>(
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Settings, SettingsError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut settings = Settings::new(SYSTEM_NAME);
        for (key, value) in properties {
            let (key, value) = (key.as_ref(), value.as_ref().trim());
            if value.is_empty() {
                continue;
            }
            match key {
                Settings::CHECKER => settings.checker = value.to_owned(),
                Settings::CLASSES => {
                    settings.checked_classes = value
                        .split(',')
                        .map(str::trim)
                        .filter(|class| !class.is_empty())
                        .map(String::from)
                        .collect();
                }
                Settings::GLOBAL => {
                    settings.mode = if parse_flag(key, value)? {
                        EnforcementMode::Global
                    } else {
                        EnforcementMode::Standard
                    };
                }
                Settings::TRUST_ANNOTATED_FOR => {
                    settings.trust_annotated_for = parse_flag(key, value)?;
                }
                Settings::HANDLER => {
                    let handler = HandlerKind::from_name(value)
                        .ok_or_else(|| SettingsError::UnknownHandler(value.to_owned()))?;
                    settings.handler = Some(handler);
                }
                _ => (),
            }
        }
        Ok(settings)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, SettingsError> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(SettingsError::InvalidFlag {
            key: key.to_owned(),
            value: value.to_owned(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn from_properties() {
        let settings = Settings::from_properties([
            ("java.home", "/usr/lib/jvm"),
            ("runtime.classes", "com.example.App, com/example/Lib,,"),
            ("runtime.global", "TRUE"),
            ("runtime.handler", "qualweave.runtime.LoggingViolationHandler"),
            ("runtime.trustAnnotatedFor", ""),
        ])
        .unwrap();
        assert_eq!(settings.checker, "nullness");
        assert_eq!(settings.mode, EnforcementMode::Global);
        assert_eq!(
            settings.checked_classes,
            vec![String::from("com.example.App"), String::from("com/example/Lib")]
        );
        assert!(!settings.trust_annotated_for);
        assert_eq!(settings.handler, Some(HandlerKind::Logging));
    }

    #[test]
    fn defaults() {
        let settings = Settings::from_properties(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(settings, Settings::new("nullness"));
    }

    #[test]
    fn invalid_values() {
        assert_eq!(
            Settings::from_properties([("runtime.global", "yes please")]),
            Err(SettingsError::InvalidFlag {
                key: String::from("runtime.global"),
                value: String::from("yes please"),
            })
        );
        assert_eq!(
            Settings::from_properties([("runtime.handler", "Mystery")]),
            Err(SettingsError::UnknownHandler(String::from("Mystery")))
        );
    }
}
