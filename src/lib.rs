//! Graceful-shutdown coordination for async services.
//!
//! # Data Flow
//! ```text
//! Running:
//!     subsystems ──register / register_named──▶ action registry
//!
//! Shutdown:
//!     OS signal (signal.rs) ──grace-bounded ctx──▶ trigger
//!     explicit caller ──────────own ctx──────────▶ trigger
//!                                                    │ first caller wins
//!                                                    ▼
//!                         drain registry ─▶ run actions concurrently,
//!                         reverse registration launch order
//!                                                    │
//!                                                    ▼
//!                         aggregate outcome ─▶ every caller, same value
//! ```
//!
//! # Design Decisions
//! - Exactly one drain pass per coordinator, however many triggers race
//! - Action failures and panics are contained; only the caller's context
//!   can cut a pass short, and even then in-flight actions keep running
//! - Progress reporting goes through a replaceable [`Logger`] sink and
//!   never influences control flow

mod action;
pub mod closer;
pub mod config;
pub mod error;
pub mod global;
pub mod log;
mod signal;

pub use action::BoxError;
pub use closer::Closer;
pub use config::{ConfigError, ShutdownConfig, Signal, DEFAULT_GRACE_PERIOD};
pub use error::{ActionFailure, ActionPanic, ShutdownError};
pub use log::{Logger, NoopLogger, TracingLogger};

// Re-exported so callers can build trigger contexts without naming the
// underlying crate.
pub use tokio_util::sync::CancellationToken;
