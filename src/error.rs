//! Error types for shutdown coordination.

use std::sync::Arc;

use thiserror::Error;

use crate::action::BoxError;

/// Aggregate outcome of a shutdown pass.
///
/// All callers that raced on the same pass observe the same value, so the
/// type is cheaply cloneable.
#[derive(Debug, Clone, Error)]
pub enum ShutdownError {
    /// One or more actions reported a failure. Every failure observed during
    /// the pass is retained, in arrival order.
    #[error("{} shutdown action(s) failed (first: {})", .0.len(), .0[0])]
    ActionsFailed(Arc<[ActionFailure]>),

    /// The context supplied to the pass was cancelled before every action
    /// finished. Actions still in flight keep running in the background.
    #[error("shutdown cut short by context cancellation ({completed} of {total} actions finished)")]
    Interrupted { completed: usize, total: usize },

    /// The caller's own context was cancelled while waiting for a pass run
    /// by another caller. The pass itself is unaffected.
    #[error("context cancelled while waiting for shutdown to complete")]
    Cancelled,
}

impl ShutdownError {
    /// Individual action failures, if this outcome carries any.
    pub fn failures(&self) -> &[ActionFailure] {
        match self {
            ShutdownError::ActionsFailed(failures) => failures,
            _ => &[],
        }
    }
}

/// A single action's failure, as observed by the executor.
#[derive(Debug, Clone)]
pub struct ActionFailure {
    name: Option<Arc<str>>,
    error: Arc<dyn std::error::Error + Send + Sync>,
}

impl ActionFailure {
    pub(crate) fn new(name: Option<Arc<str>>, error: BoxError) -> Self {
        Self {
            name,
            error: Arc::from(error),
        }
    }

    pub(crate) fn panicked(name: Option<Arc<str>>, message: String) -> Self {
        Self::new(name, Box::new(ActionPanic { message }))
    }

    /// The name the action was registered under, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The error the action returned (or the recovered panic).
    pub fn error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.error.as_ref()
    }
}

impl std::fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}: {}", name, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Failure recorded for an action that panicked instead of returning.
#[derive(Debug, Clone, Error)]
#[error("panic recovered during shutdown: {message}")]
pub struct ActionPanic {
    message: String,
}

impl ActionPanic {
    /// The panic payload, rendered as text.
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_failure_display_includes_name() {
        let failure = ActionFailure::new(Some("db-pool".into()), "connection reset".into());
        assert_eq!(failure.to_string(), "db-pool: connection reset");

        let unnamed = ActionFailure::new(None, "connection reset".into());
        assert_eq!(unnamed.to_string(), "connection reset");
    }

    #[test]
    fn aggregate_display_counts_failures() {
        let failures: Arc<[ActionFailure]> = vec![
            ActionFailure::new(Some("kafka".into()), "flush timed out".into()),
            ActionFailure::new(None, "boom".into()),
        ]
        .into();
        let err = ShutdownError::ActionsFailed(failures);
        assert_eq!(
            err.to_string(),
            "2 shutdown action(s) failed (first: kafka: flush timed out)"
        );
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn interrupted_display_reports_progress() {
        let err = ShutdownError::Interrupted {
            completed: 1,
            total: 3,
        };
        assert_eq!(
            err.to_string(),
            "shutdown cut short by context cancellation (1 of 3 actions finished)"
        );
        assert!(err.failures().is_empty());
    }

    #[test]
    fn panic_failure_keeps_payload_message() {
        let failure = ActionFailure::panicked(Some("cache".into()), "index out of bounds".into());
        assert_eq!(
            failure.to_string(),
            "cache: panic recovered during shutdown: index out of bounds"
        );
        let panic = failure
            .error()
            .downcast_ref::<ActionPanic>()
            .expect("panic failures carry an ActionPanic");
        assert_eq!(panic.message(), "index out of bounds");
    }
}
