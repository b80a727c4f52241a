//! Registered cleanup actions and the fault barrier around them.
//!
//! # Responsibilities
//! - Type-erase user-supplied cleanup closures
//! - Convert panics into per-action failures (panics never cross the task
//!   boundary)
//! - Decorate named actions with closing/closed log lines and timing

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::ActionFailure;
use crate::log::Logger;

/// Opaque error returned by a cleanup action.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed future produced by a cleanup action.
pub(crate) type ActionFuture = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send>>;

/// One queued cleanup action. The name, when present, drives the
/// closing/closed log decoration; it never changes the action's outcome.
pub(crate) struct RegisteredAction {
    pub(crate) name: Option<Arc<str>>,
    pub(crate) body: Box<dyn FnOnce(CancellationToken) -> ActionFuture + Send>,
}

impl RegisteredAction {
    pub(crate) fn new<F, Fut>(name: Option<Arc<str>>, action: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            name,
            body: Box::new(move |ctx| Box::pin(action(ctx))),
        }
    }
}

/// Drive one action to completion behind a panic barrier.
///
/// A recovered panic becomes an [`ActionFailure`] for this action alone;
/// sibling actions and the executor never observe the unwind.
pub(crate) async fn run_guarded(
    name: Option<Arc<str>>,
    fut: ActionFuture,
    logger: Arc<dyn Logger>,
) -> Result<(), ActionFailure> {
    if let Some(n) = &name {
        logger.info(&format!("closing {n}..."));
    }
    let start = Instant::now();

    let outcome = AssertUnwindSafe(fut).catch_unwind().await;

    let elapsed = start.elapsed();
    match outcome {
        Ok(Ok(())) => {
            if let Some(n) = &name {
                logger.info(&format!("{n} closed successfully in {elapsed:?}"));
            }
            Ok(())
        }
        Ok(Err(error)) => {
            if let Some(n) = &name {
                logger.error(&format!("error closing {n}: {error} (took {elapsed:?})"));
            }
            Err(ActionFailure::new(name, error))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            logger.error(&format!("panic in shutdown action: {message}"));
            Err(ActionFailure::panicked(name, message))
        }
    }
}

/// Render a panic payload as text. Non-string payloads get a placeholder.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
