use super::{resolve_attribution, StackFrame, StackWalker, Violation, ViolationError};
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

/// Decides what happens when a check fails
pub trait ViolationHandler: Send + Sync {
    /// Handle a violation
    ///
    /// Returning an error terminates the call containing the check.
    fn handle_violation(
        &self,
        violation: &Violation,
        stack: &dyn StackWalker,
    ) -> Result<(), ViolationError>;
}

fn attributed_frame(violation: &Violation, stack: &dyn StackWalker) -> Option<StackFrame> {
    let frames = stack.frames();
    resolve_attribution(&frames, violation.attribution).cloned()
}

/// Terminates the call with an error
#[derive(Copy, Clone, Debug, Default)]
pub struct ThrowingViolationHandler;

impl ViolationHandler for ThrowingViolationHandler {
    fn handle_violation(
        &self,
        violation: &Violation,
        stack: &dyn StackWalker,
    ) -> Result<(), ViolationError> {
        Err(ViolationError {
            violation: violation.clone(),
            location: attributed_frame(violation, stack),
        })
    }
}

/// Logs the violation at `error` level and carries on
#[derive(Copy, Clone, Debug, Default)]
pub struct LoggingViolationHandler;

impl ViolationHandler for LoggingViolationHandler {
    fn handle_violation(
        &self,
        violation: &Violation,
        stack: &dyn StackWalker,
    ) -> Result<(), ViolationError> {
        match attributed_frame(violation, stack) {
            Some(frame) => log::error!(
                "[RuntimeFramework - {}] {} (at {})",
                violation.checker,
                violation.message,
                frame
            ),
            None => log::error!(
                "[RuntimeFramework - {}] {}",
                violation.checker,
                violation.message
            ),
        }
        Ok(())
    }
}

/// Writes one line per violation and carries on
///
/// Lines have the form `[VIOLATION] <file>:<line> (<checker>) <message>`, which test harnesses
/// match on.
pub struct ReportingViolationHandler<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> ReportingViolationHandler<W> {
    pub fn new(out: W) -> ReportingViolationHandler<W> {
        ReportingViolationHandler {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn format_line(violation: &Violation, frame: Option<&StackFrame>) -> String {
        let location = frame.map_or_else(|| String::from("Unknown:0"), StackFrame::location);
        format!(
            "[VIOLATION] {} ({}) {}",
            location, violation.checker, violation.message
        )
    }
}

impl<W: Write + Send> ViolationHandler for ReportingViolationHandler<W> {
    fn handle_violation(
        &self,
        violation: &Violation,
        stack: &dyn StackWalker,
    ) -> Result<(), ViolationError> {
        let frame = attributed_frame(violation, stack);
        let line = Self::format_line(violation, frame.as_ref());
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            log::warn!("Failed to report violation ({}): {}", err, line);
        }
        Ok(())
    }
}

/// Violation along with the frame it was attributed to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedViolation {
    pub violation: Violation,
    pub location: Option<StackFrame>,
}

/// Keeps every violation in memory and carries on
#[derive(Default)]
pub struct RecordingViolationHandler {
    violations: Mutex<Vec<RecordedViolation>>,
}

impl RecordingViolationHandler {
    pub fn new() -> RecordingViolationHandler {
        RecordingViolationHandler::default()
    }

    /// Violations recorded so far
    pub fn violations(&self) -> Vec<RecordedViolation> {
        self.violations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return violations recorded so far
    pub fn take(&self) -> Vec<RecordedViolation> {
        std::mem::take(&mut *self.violations.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl ViolationHandler for RecordingViolationHandler {
    fn handle_violation(
        &self,
        violation: &Violation,
        stack: &dyn StackWalker,
    ) -> Result<(), ViolationError> {
        let location = attributed_frame(violation, stack);
        self.violations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedViolation {
                violation: violation.clone(),
                location,
            });
        Ok(())
    }
}

/// Built-in handlers, by configuration name
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HandlerKind {
    Throwing,
    Logging,
    Reporting,
}

impl HandlerKind {
    /// Parse a configured handler name
    ///
    /// Besides the short names (`throwing`, `logging`, `reporting`), the handler class names
    /// (`ThrowingViolationHandler`, ...) are also understood, with or without a package.
    pub fn from_name(name: &str) -> Option<HandlerKind> {
        let name = name.trim();
        let simple_name = name.rsplit(&['.', '/'][..]).next().unwrap_or(name);
        let simple_name = simple_name
            .strip_suffix("ViolationHandler")
            .unwrap_or(simple_name);
        match simple_name.to_ascii_lowercase().as_str() {
            "throwing" | "throw" => Some(HandlerKind::Throwing),
            "logging" | "log" => Some(HandlerKind::Logging),
            "reporting" | "report" | "testviolation" => Some(HandlerKind::Reporting),
            _ => None,
        }
    }

    /// Instantiate the handler (reporting handlers write to standard output)
    pub fn create(&self) -> Arc<dyn ViolationHandler> {
        match self {
            HandlerKind::Throwing => Arc::new(ThrowingViolationHandler),
            HandlerKind::Logging => Arc::new(LoggingViolationHandler),
            HandlerKind::Reporting => Arc::new(ReportingViolationHandler::new(std::io::stdout())),
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Throwing => write!(f, "throwing"),
            HandlerKind::Logging => write!(f, "logging"),
            HandlerKind::Reporting => write!(f, "reporting"),
        }
    }
}
