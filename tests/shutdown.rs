//! Integration tests for the shutdown coordinator's concurrency contract.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use offramp::{ActionPanic, CancellationToken, Closer, NoopLogger, ShutdownError};

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_triggers_run_one_pass_with_one_outcome() {
    let closer = Closer::with_logger(Arc::new(NoopLogger));
    let runs = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let runs = runs.clone();
        closer.register(move |_ctx| async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }

    let mut handles = Vec::new();
    for _ in 0..8 {
        let closer = closer.clone();
        handles.push(tokio::spawn(async move {
            closer.trigger(CancellationToken::new()).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    // Three registered actions, each attempted exactly once.
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_caller_observes_the_same_failure() {
    let closer = Closer::with_logger(Arc::new(NoopLogger));
    closer.register_named("db-pool", |_ctx| async { Err("boom".into()) });

    let mut handles = Vec::new();
    for _ in 0..4 {
        let closer = closer.clone();
        handles.push(tokio::spawn(async move {
            closer.trigger(CancellationToken::new()).await
        }));
    }
    for handle in handles {
        let err = handle.await.unwrap().expect_err("the action fails");
        let failures = err.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name(), Some("db-pool"));
        assert_eq!(failures[0].error().to_string(), "boom");
    }
}

#[tokio::test]
async fn actions_launch_in_reverse_registration_order() {
    let closer = Closer::with_logger(Arc::new(NoopLogger));
    let order = Arc::new(Mutex::new(Vec::new()));
    for label in ["first", "second", "third"] {
        let order = order.clone();
        closer.register(move |_ctx| {
            order.lock().unwrap().push(label);
            async { Ok(()) }
        });
    }

    closer
        .trigger(CancellationToken::new())
        .await
        .expect("all actions succeed");

    assert_eq!(*order.lock().unwrap(), ["third", "second", "first"]);
}

#[tokio::test]
async fn panic_in_one_action_does_not_abort_siblings() {
    let closer = Closer::with_logger(Arc::new(NoopLogger));
    let finished = Arc::new(AtomicUsize::new(0));

    let f = finished.clone();
    closer.register_named("first", move |_ctx| async move {
        f.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    closer.register_named("second", |_ctx| async { panic!("poisoned cleanup") });
    let f = finished.clone();
    closer.register_named("third", move |_ctx| async move {
        f.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let err = closer
        .trigger(CancellationToken::new())
        .await
        .expect_err("the panicking action must surface");

    assert_eq!(finished.load(Ordering::SeqCst), 2);
    let failures = err.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].name(), Some("second"));
    assert!(failures[0].error().downcast_ref::<ActionPanic>().is_some());
}

#[tokio::test(start_paused = true)]
async fn deadline_cuts_the_pass_short_while_the_action_keeps_running() {
    let closer = Closer::with_logger(Arc::new(NoopLogger));
    closer.register_named("slow", |_ctx| async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(())
    });

    let before = tokio::time::Instant::now();
    let err = closer
        .trigger_with_timeout(Duration::from_millis(100))
        .await
        .expect_err("the deadline fires long before the action finishes");

    assert!(matches!(
        err,
        ShutdownError::Interrupted {
            completed: 0,
            total: 1
        }
    ));
    // Returned at the deadline, not after the action's 10 seconds.
    assert!(before.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn straggler_outcomes_are_logged_after_cancellation() {
    let logger = Arc::new(common::RecordingLogger::default());
    let closer = Closer::with_logger(logger.clone());
    closer.register_named("slow-failing", |_ctx| async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Err("too late".into())
    });

    let err = closer
        .trigger_with_timeout(Duration::from_millis(100))
        .await
        .expect_err("the deadline fires first");
    assert!(matches!(err, ShutdownError::Interrupted { .. }));

    // Let the in-flight action finish; its outcome should still reach the log.
    tokio::time::sleep(Duration::from_secs(11)).await;
    let messages = logger.messages();
    assert!(messages
        .iter()
        .any(|m| m.contains("failed after cancellation") && m.contains("too late")));
    assert!(messages
        .iter()
        .any(|m| m.contains("remaining shutdown actions finished after cancellation")));
}

#[tokio::test(start_paused = true)]
async fn cancelled_waiter_does_not_affect_the_pass() {
    let closer = Closer::with_logger(Arc::new(NoopLogger));
    closer.register(|_ctx| async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(())
    });

    let winner = {
        let closer = closer.clone();
        tokio::spawn(async move { closer.trigger(CancellationToken::new()).await })
    };
    // Let the winner get admitted and start the pass.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let waiter_ctx = CancellationToken::new();
    waiter_ctx.cancel();
    let waiter = closer.trigger(waiter_ctx).await;
    assert!(matches!(waiter, Err(ShutdownError::Cancelled)));

    // The pass itself still runs to successful completion.
    assert!(winner.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn registration_during_a_pass_never_joins_it() {
    let closer = Closer::with_logger(Arc::new(NoopLogger));
    closer.register(|_ctx| async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(())
    });

    let winner = {
        let closer = closer.clone();
        tokio::spawn(async move { closer.trigger(CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let late_ran = Arc::new(AtomicBool::new(false));
    let flag = late_ran.clone();
    closer.register(move |_ctx| async move {
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });

    assert!(winner.await.unwrap().is_ok());
    assert!(!late_ran.load(Ordering::SeqCst));
    assert_eq!(closer.pending(), 0);
}
