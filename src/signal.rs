//! OS signal listener.
//!
//! Bridges termination signals into a grace-bounded shutdown trigger. The
//! listener also watches the coordinator's completion broadcast so that a
//! manual trigger racing with it makes the listener exit instead of
//! triggering twice.
//!
//! On Unix each configured signal gets its own stream; elsewhere the
//! listener falls back to Ctrl+C regardless of the configured set.

use std::time::Duration;

use crate::closer::Closer;
use crate::config::Signal;

/// Install handlers and spawn the listener task.
///
/// Handler installation happens before spawning so registration errors
/// surface to the caller. An empty signal list disables the listener.
pub(crate) fn spawn_listener(
    closer: Closer,
    signals: &[Signal],
    grace: Duration,
) -> std::io::Result<()> {
    if signals.is_empty() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        let mut streams = Vec::with_capacity(signals.len());
        for sig in signals {
            streams.push((*sig, tokio::signal::unix::signal(sig.kind())?));
        }
        tokio::spawn(listen_unix(closer, streams, grace));
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(listen_ctrl_c(closer, grace));
        Ok(())
    }
}

#[cfg(unix)]
async fn listen_unix(
    closer: Closer,
    mut streams: Vec<(Signal, tokio::signal::unix::Signal)>,
    grace: Duration,
) {
    let mut done = closer.done_receiver();
    let any_signal = async {
        let waits = streams
            .iter_mut()
            .map(|(sig, stream)| {
                let sig = *sig;
                Box::pin(async move {
                    stream.recv().await;
                    sig
                })
            })
            .collect::<Vec<_>>();
        let (sig, _, _) = futures_util::future::select_all(waits).await;
        sig
    };

    let wait_done = async {
        let _ = done.wait_for(|finished| *finished).await;
    };
    tokio::select! {
        sig = any_signal => trigger_from_signal(&closer, sig, grace).await,
        // Shutdown was already triggered manually; nothing left to do.
        _ = wait_done => {}
    }
}

#[cfg(not(unix))]
async fn listen_ctrl_c(closer: Closer, grace: Duration) {
    let mut done = closer.done_receiver();
    let wait_done = async {
        let _ = done.wait_for(|finished| *finished).await;
    };
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if result.is_ok() {
                trigger_from_signal(&closer, Signal::Interrupt, grace).await;
            }
        }
        _ = wait_done => {}
    }
}

async fn trigger_from_signal(closer: &Closer, sig: Signal, grace: Duration) {
    closer
        .logger()
        .info(&format!("{sig} received, starting graceful shutdown..."));

    match closer.trigger_with_timeout(grace).await {
        Ok(()) => {}
        Err(err) => {
            closer
                .logger()
                .error(&format!("error closing resources: {err}"));
        }
    }
}
