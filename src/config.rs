//! Shutdown configuration schema and loading.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Grace period granted to a signal-triggered shutdown pass when none is
/// configured.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Termination signals the listener can watch for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// SIGTERM.
    #[serde(alias = "SIGTERM")]
    Terminate,
    /// SIGINT (Ctrl+C).
    #[serde(alias = "SIGINT")]
    Interrupt,
    /// SIGHUP.
    #[serde(alias = "SIGHUP")]
    Hangup,
    /// SIGQUIT.
    #[serde(alias = "SIGQUIT")]
    Quit,
}

impl Signal {
    #[cfg(unix)]
    pub(crate) fn kind(self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;
        match self {
            Signal::Terminate => SignalKind::terminate(),
            Signal::Interrupt => SignalKind::interrupt(),
            Signal::Hangup => SignalKind::hangup(),
            Signal::Quit => SignalKind::quit(),
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Signal::Terminate => "SIGTERM",
            Signal::Interrupt => "SIGINT",
            Signal::Hangup => "SIGHUP",
            Signal::Quit => "SIGQUIT",
        };
        f.write_str(name)
    }
}

/// Configuration for the shutdown coordinator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShutdownConfig {
    /// Grace period for signal-triggered shutdown, in seconds.
    pub grace_period_secs: u64,
    /// Signals that trigger shutdown. Empty disables the listener.
    pub signals: Vec<Signal>,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: DEFAULT_GRACE_PERIOD.as_secs(),
            signals: Vec::new(),
        }
    }
}

impl ShutdownConfig {
    /// The configured grace period.
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ShutdownConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grace_period_secs == 0 {
            return Err(ConfigError::Invalid(
                "grace_period_secs must be greater than zero".to_string(),
            ));
        }
        for (i, sig) in self.signals.iter().enumerate() {
            if self.signals[..i].contains(sig) {
                return Err(ConfigError::Invalid(format!("duplicate signal {sig}")));
            }
        }
        Ok(())
    }
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value: {0}")]
    Invalid(String),
}
