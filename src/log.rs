//! Pluggable sink for shutdown progress messages.
//!
//! The coordinator reports progress through this trait so that library users
//! can route messages into their own logging setup, or silence them
//! entirely. The sink is observability only; no implementation can change
//! what the coordinator does.

/// Leveled sink for human-readable shutdown progress.
pub trait Logger: Send + Sync {
    /// Report normal progress.
    fn info(&self, message: &str);

    /// Report a failure observed during shutdown.
    fn error(&self, message: &str);
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn info(&self, _message: &str) {}

    fn error(&self, _message: &str) {}
}

/// Forwards messages to the `tracing` ecosystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "offramp", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "offramp", "{message}");
    }
}
