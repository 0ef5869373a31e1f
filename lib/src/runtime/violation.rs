use crate::jvm::UnqualifiedName;
use std::fmt;

/// Which stack frame a violation is blamed on
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttributionKind {
    /// The method containing the check
    Local,

    /// The caller of the method containing the check
    Caller,
}

impl AttributionKind {
    /// Name of the corresponding constant on the runtime `AttributionKind` enum
    pub const fn field_name(&self) -> UnqualifiedName {
        match self {
            AttributionKind::Local => UnqualifiedName::LOCAL,
            AttributionKind::Caller => UnqualifiedName::CALLER,
        }
    }
}

/// Failed runtime check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// Name of the qualifier system whose check failed (eg. `Nullness`)
    pub checker: String,

    pub message: String,

    pub attribution: AttributionKind,
}

/// One frame of the live call stack
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackFrame {
    /// Binary name of the class (eg. `com/example/App`)
    pub class_name: String,

    pub method_name: String,

    /// Source file, if known
    pub file: Option<String>,

    /// Source line, if known
    pub line: Option<u32>,
}

impl StackFrame {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> StackFrame {
        StackFrame {
            class_name: class_name.into(),
            method_name: method_name.into(),
            file: None,
            line: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> StackFrame {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    /// Source location in `file:line` form
    pub fn location(&self) -> String {
        format!(
            "{}:{}",
            self.file.as_deref().unwrap_or("Unknown"),
            self.line.unwrap_or(0)
        )
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}({})",
            self.class_name.replace('/', "."),
            self.method_name,
            self.location()
        )
    }
}

/// Access to the live call stack
pub trait StackWalker {
    /// Frames of the current stack, innermost first
    fn frames(&self) -> Vec<StackFrame>;
}

impl StackWalker for [StackFrame] {
    fn frames(&self) -> Vec<StackFrame> {
        self.to_vec()
    }
}

impl StackWalker for Vec<StackFrame> {
    fn frames(&self) -> Vec<StackFrame> {
        self.clone()
    }
}

/// Error terminating a call which failed a check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViolationError {
    pub violation: Violation,

    /// Frame the violation was attributed to
    pub location: Option<StackFrame>,
}

impl fmt::Display for ViolationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} Violation] {}",
            self.violation.checker, self.violation.message
        )?;
        if let Some(location) = &self.location {
            write!(f, " (at {})", location)?;
        }
        Ok(())
    }
}

impl std::error::Error for ViolationError {}
