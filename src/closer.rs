//! Shutdown coordination.
//!
//! # Responsibilities
//! - Keep an ordered registry of cleanup actions
//! - Run exactly one drain pass, however many triggers race
//! - Launch actions concurrently in reverse registration order
//! - Aggregate failures and honor the caller's cancellation context
//!
//! # Design Decisions
//! - Actions run as independent tasks; a failing or panicking action never
//!   stops its siblings
//! - The pass can only be cut short by the caller's context, and even then
//!   in-flight actions keep running in the background
//! - Every caller of [`Closer::trigger`] observes the same aggregate outcome

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::action::{run_guarded, BoxError, RegisteredAction};
use crate::config::Signal;
use crate::error::{ActionFailure, ShutdownError};
use crate::log::{Logger, TracingLogger};
use crate::signal;

/// Coordinator for graceful shutdown.
///
/// Subsystems register cleanup actions while the process runs; the first
/// call to [`trigger`](Closer::trigger) drains the registry and runs every
/// action concurrently, launching them in reverse registration order so
/// late-wired dependents shut down before their dependencies.
///
/// The handle is cheap to clone; clones share the same registry and the
/// same single execution pass.
#[derive(Clone)]
pub struct Closer {
    shared: Arc<Shared>,
}

struct Shared {
    /// Registered actions, in registration order. Drained atomically when
    /// the pass is admitted.
    actions: Mutex<Vec<RegisteredAction>>,
    /// One-shot latch: flips to true when the first trigger is admitted.
    triggered: AtomicBool,
    /// Aggregate outcome, written once by the admitted caller.
    outcome: OnceLock<Result<(), ShutdownError>>,
    /// Completion broadcast. Flips to true after the outcome is stored.
    done: watch::Sender<bool>,
    /// Replaceable progress sink. Observability only.
    logger: RwLock<Arc<dyn Logger>>,
}

impl Closer {
    /// Create a coordinator that reports progress through [`TracingLogger`].
    pub fn new() -> Self {
        Self::with_logger(Arc::new(TracingLogger))
    }

    /// Create a coordinator with a custom progress sink.
    pub fn with_logger(logger: Arc<dyn Logger>) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                actions: Mutex::new(Vec::new()),
                triggered: AtomicBool::new(false),
                outcome: OnceLock::new(),
                done,
                logger: RwLock::new(logger),
            }),
        }
    }

    /// Replace the progress sink.
    pub fn set_logger(&self, logger: Arc<dyn Logger>) {
        let mut guard = self
            .shared
            .logger
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = logger;
    }

    pub(crate) fn logger(&self) -> Arc<dyn Logger> {
        self.shared
            .logger
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Register a cleanup action.
    ///
    /// The action receives the cancellation context of the pass that runs
    /// it. Registration is a no-op once shutdown has started.
    pub fn register<F, Fut>(&self, action: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.push(RegisteredAction::new(None, action));
    }

    /// Register a cleanup action under a name.
    ///
    /// The name decorates the run with `closing <name>...` and a
    /// closed/failed line carrying the elapsed duration. The decoration
    /// never changes the action's outcome.
    pub fn register_named<F, Fut>(&self, name: impl Into<Arc<str>>, action: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.push(RegisteredAction::new(Some(name.into()), action));
    }

    fn push(&self, action: RegisteredAction) {
        let mut actions = self
            .shared
            .actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // The flag is checked under the registry lock so a registration
        // either lands before the drain snapshot or is dropped, never both.
        if self.shared.triggered.load(Ordering::SeqCst) {
            drop(actions);
            let label = action.name.as_deref().unwrap_or("unnamed action");
            self.logger()
                .error(&format!("shutdown already started, dropping late registration of {label}"));
            return;
        }
        actions.push(action);
    }

    /// Number of actions currently queued.
    pub fn pending(&self) -> usize {
        self.shared
            .actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Start listening for the given OS signals.
    ///
    /// On signal arrival the listener triggers shutdown with a context
    /// bounded by `grace`. An empty signal list disables the listener. The
    /// listener exits silently if shutdown is triggered by other means
    /// first.
    pub fn listen(&self, signals: &[Signal], grace: Duration) -> std::io::Result<()> {
        signal::spawn_listener(self.clone(), signals, grace)
    }

    /// Run every registered action and return the aggregate outcome.
    ///
    /// The first caller to arrive runs the pass; concurrent and later
    /// callers wait for it and observe the same outcome. `ctx` bounds the
    /// caller's involvement: for the admitted caller it bounds the whole
    /// pass, for a waiting caller it bounds only the wait.
    pub async fn trigger(&self, ctx: CancellationToken) -> Result<(), ShutdownError> {
        let admitted = !self.shared.triggered.swap(true, Ordering::SeqCst);
        if admitted {
            let result = self.execute(&ctx).await;
            let _ = self.shared.outcome.set(result.clone());
            // send_replace stores the value even when nobody subscribed yet,
            // so later waiters still observe completion.
            self.shared.done.send_replace(true);
            return result;
        }

        let wait_done = async {
            let mut done = self.shared.done.subscribe();
            let _ = done.wait_for(|finished| *finished).await;
        };
        tokio::select! {
            _ = wait_done => self
                .shared
                .outcome
                .get()
                .cloned()
                .expect("outcome is stored before completion is broadcast"),
            _ = ctx.cancelled() => Err(ShutdownError::Cancelled),
        }
    }

    /// [`trigger`](Closer::trigger) with a context that cancels itself
    /// after `timeout`.
    pub async fn trigger_with_timeout(&self, timeout: Duration) -> Result<(), ShutdownError> {
        let ctx = CancellationToken::new();
        let deadline = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            deadline.cancel();
        });
        self.trigger(ctx).await
    }

    /// Wait until the shutdown pass has finished, successfully or not.
    pub async fn done(&self) {
        let mut done = self.shared.done.subscribe();
        let _ = done.wait_for(|finished| *finished).await;
    }

    /// The aggregate outcome, once a pass has finished.
    pub fn outcome(&self) -> Option<Result<(), ShutdownError>> {
        self.shared.outcome.get().cloned()
    }

    pub(crate) fn done_receiver(&self) -> watch::Receiver<bool> {
        self.shared.done.subscribe()
    }

    /// One drain pass. Runs at most once per coordinator.
    async fn execute(&self, ctx: &CancellationToken) -> Result<(), ShutdownError> {
        let logger = self.logger();

        let actions = {
            let mut guard = self
                .shared
                .actions
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        let total = actions.len();
        if total == 0 {
            logger.info("no shutdown actions registered");
            return Ok(());
        }

        logger.info(&format!("starting graceful shutdown of {total} action(s)"));

        let (tx, mut rx) = mpsc::channel::<Result<(), ActionFailure>>(total);
        // Launch in reverse registration order: the future is constructed
        // here, synchronously, so launch order is strict even though the
        // actions then run concurrently. The channel is sized to the action
        // count and every producer sends exactly once, so sends never block
        // and the channel closes once the last producer is done.
        for action in actions.into_iter().rev() {
            let name = action.name.clone();
            let action_ctx = ctx.clone();
            match std::panic::catch_unwind(AssertUnwindSafe(move || (action.body)(action_ctx))) {
                Ok(fut) => {
                    let tx = tx.clone();
                    let logger = Arc::clone(&logger);
                    tokio::spawn(async move {
                        let outcome = run_guarded(name, fut, logger).await;
                        let _ = tx.send(outcome).await;
                    });
                }
                Err(payload) => {
                    let message = crate::action::panic_message(payload.as_ref());
                    logger.error(&format!("panic in shutdown action: {message}"));
                    let _ = tx.try_send(Err(ActionFailure::panicked(name, message)));
                }
            }
        }
        drop(tx);

        let mut failures: Vec<ActionFailure> = Vec::new();
        let mut completed = 0usize;
        let cut_short = loop {
            tokio::select! {
                _ = ctx.cancelled() => break true,
                item = rx.recv() => match item {
                    Some(Ok(())) => completed += 1,
                    Some(Err(failure)) => {
                        completed += 1;
                        logger.error(&format!("error during shutdown: {failure}"));
                        failures.push(failure);
                    }
                    None => break false,
                },
            }
        };

        if cut_short {
            logger.error(&format!(
                "shutdown cut short by context cancellation ({completed} of {total} actions finished)"
            ));
            // In-flight actions are not killed; keep collecting so their
            // eventual outcomes still reach the log.
            let straggler_logger = Arc::clone(&logger);
            tokio::spawn(async move {
                while let Some(outcome) = rx.recv().await {
                    if let Err(failure) = outcome {
                        straggler_logger
                            .error(&format!("shutdown action failed after cancellation: {failure}"));
                    }
                }
                straggler_logger.info("remaining shutdown actions finished after cancellation");
            });
            return Err(ShutdownError::Interrupted { completed, total });
        }

        if failures.is_empty() {
            logger.info("all resources closed successfully");
            Ok(())
        } else {
            Err(ShutdownError::ActionsFailed(failures.into()))
        }
    }
}

impl Default for Closer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Closer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Closer")
            .field("pending", &self.pending())
            .field("triggered", &self.shared.triggered.load(Ordering::SeqCst))
            .finish()
    }
}
