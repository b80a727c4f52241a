//! Process-wide coordinator for ambient registration.
//!
//! Library code deep in a call graph often cannot be handed a [`Closer`]
//! explicitly. This module offers a single process-wide instance behind an
//! explicitly-initialized accessor:
//!
//! - call [`init`] once at process start to install a configured
//!   coordinator, or
//! - skip [`init`] and let the first ambient use install a default wired to
//!   [`NoopLogger`]; [`set_logger`] can upgrade it later.
//!
//! Prefer passing a [`Closer`] explicitly where the call graph allows it.

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::action::BoxError;
use crate::closer::Closer;
use crate::config::Signal;
use crate::error::ShutdownError;
use crate::log::{Logger, NoopLogger};

static GLOBAL: OnceLock<Closer> = OnceLock::new();

/// Install the process-wide coordinator.
///
/// Must run before the first ambient use; afterwards the installed
/// coordinator is immutable. Returns the rejected instance if one was
/// already installed.
pub fn init(closer: Closer) -> Result<(), Closer> {
    GLOBAL.set(closer)
}

/// The process-wide coordinator.
///
/// Installs a [`NoopLogger`]-backed default if [`init`] was never called.
pub fn instance() -> &'static Closer {
    GLOBAL.get_or_init(|| Closer::with_logger(Arc::new(NoopLogger)))
}

/// Register a cleanup action with the process-wide coordinator.
pub fn register<F, Fut>(action: F)
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    instance().register(action);
}

/// Register a named cleanup action with the process-wide coordinator.
pub fn register_named<F, Fut>(name: impl Into<Arc<str>>, action: F)
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    instance().register_named(name, action);
}

/// Trigger the process-wide coordinator.
pub async fn trigger(ctx: CancellationToken) -> Result<(), ShutdownError> {
    instance().trigger(ctx).await
}

/// Replace the process-wide coordinator's progress sink.
pub fn set_logger(logger: Arc<dyn Logger>) {
    instance().set_logger(logger);
}

/// Start the signal listener on the process-wide coordinator.
pub fn listen(signals: &[Signal], grace: Duration) -> std::io::Result<()> {
    instance().listen(signals, grace)
}
