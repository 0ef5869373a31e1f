use super::{
    AttributionKind, StackFrame, StackWalker, ThrowingViolationHandler, Violation, ViolationError,
    ViolationHandler,
};
use std::sync::{Arc, PoisonError, RwLock};

/// Prefix of classes belonging to the runtime itself, which never get blamed for violations
pub const FRAMEWORK_PREFIX: &str = "qualweave/";

static GLOBAL: RuntimeVerifier = RuntimeVerifier::new();

/// Entry point for failed checks
///
/// The handler sits behind a single lock which is only written when the configuration changes,
/// so reporting never waits on anything but other configuration changes.
pub struct RuntimeVerifier {
    /// Installed handler (`None` means the default throwing handler)
    handler: RwLock<Option<Arc<dyn ViolationHandler>>>,
}

impl RuntimeVerifier {
    /// Verifier using the default throwing handler
    pub const fn new() -> RuntimeVerifier {
        RuntimeVerifier {
            handler: RwLock::new(None),
        }
    }

    pub fn with_handler(handler: Arc<dyn ViolationHandler>) -> RuntimeVerifier {
        RuntimeVerifier {
            handler: RwLock::new(Some(handler)),
        }
    }

    /// Process-wide verifier, which woven code reports to
    pub fn global() -> &'static RuntimeVerifier {
        &GLOBAL
    }

    /// Swap in a new handler
    pub fn set_handler(&self, handler: Arc<dyn ViolationHandler>) {
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Go back to the default handler
    pub fn reset_handler(&self) {
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Currently installed handler
    pub fn handler(&self) -> Arc<dyn ViolationHandler> {
        let handler = self.handler.read().unwrap_or_else(PoisonError::into_inner);
        match &*handler {
            Some(handler) => handler.clone(),
            None => Arc::new(ThrowingViolationHandler),
        }
    }

    /// Pass a violation on to the handler
    pub fn report(&self, violation: Violation, stack: &dyn StackWalker) -> Result<(), ViolationError> {
        self.handler().handle_violation(&violation, stack)
    }
}

impl Default for RuntimeVerifier {
    fn default() -> RuntimeVerifier {
        RuntimeVerifier::new()
    }
}

/// Find the frame a violation should be blamed on
///
/// Frames belonging to the runtime itself are skipped. The first remaining frame is the one that
/// contains the check, which is the answer for [`AttributionKind::Local`]. For
/// [`AttributionKind::Caller`], it is the frame after that.
pub fn resolve_attribution(stack: &[StackFrame], kind: AttributionKind) -> Option<&StackFrame> {
    let mut user_frames = stack
        .iter()
        .skip_while(|frame| frame.class_name.starts_with(FRAMEWORK_PREFIX));
    match kind {
        AttributionKind::Local => user_frames.next(),
        AttributionKind::Caller => user_frames.nth(1),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::runtime::RecordingViolationHandler;

    fn stack() -> Vec<StackFrame> {
        vec![
            StackFrame::new("qualweave/checker/nullness/NullnessRuntimeVerifier", "checkNotNull"),
            StackFrame::new("app/Service", "handle").at("Service.java", 12),
            StackFrame::new("app/Main", "main").at("Main.java", 5),
        ]
    }

    #[test]
    fn attribution() {
        let stack = stack();
        let local = resolve_attribution(&stack, AttributionKind::Local).unwrap();
        assert_eq!(local.location(), "Service.java:12");
        let caller = resolve_attribution(&stack, AttributionKind::Caller).unwrap();
        assert_eq!(caller.location(), "Main.java:5");

        assert_eq!(resolve_attribution(&stack[2..], AttributionKind::Caller), None);
    }

    #[test]
    fn handlers_are_swappable() {
        let verifier = RuntimeVerifier::new();
        let violation = Violation {
            checker: String::from("Nullness"),
            message: String::from("Parameter 0 must be NonNull"),
            attribution: AttributionKind::Caller,
        };

        let err = verifier.report(violation.clone(), &stack()).unwrap_err();
        assert_eq!(err.to_string(), "[Nullness Violation] Parameter 0 must be NonNull (at app.Main.main(Main.java:5))");

        let recorder = Arc::new(RecordingViolationHandler::new());
        verifier.set_handler(recorder.clone());
        assert!(verifier.report(violation.clone(), &stack()).is_ok());
        assert_eq!(recorder.violations().len(), 1);

        verifier.reset_handler();
        assert!(verifier.report(violation, &stack()).is_err());
    }
}
