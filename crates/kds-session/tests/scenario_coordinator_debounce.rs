//! Coordinator timing scenarios, run against a paused clock so the
//! quiet-period arithmetic is exact.

use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;

use kds_session::{UpdateCoordinator, DEBOUNCE_QUIET_PERIOD};

#[tokio::test(start_paused = true)]
async fn idle_signal_triggers_an_immediate_refresh() {
    let (coord, mut rx) = UpdateCoordinator::new();

    coord.on_signal();

    assert!(rx.try_recv().is_ok());
    assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
}

#[tokio::test(start_paused = true)]
async fn signals_during_a_mutation_coalesce_into_one_refresh() {
    let (coord, mut rx) = UpdateCoordinator::new();

    coord.begin_mutation();
    for _ in 0..5 {
        coord.on_signal();
    }
    assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);

    coord.finish_mutation(true);

    // Nothing fires before the quiet period elapses.
    tokio::time::sleep(DEBOUNCE_QUIET_PERIOD - Duration::from_millis(1)).await;
    assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert!(rx.try_recv().is_ok());
    assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
}

#[tokio::test(start_paused = true)]
async fn a_signal_while_the_timer_is_pending_restarts_the_countdown() {
    let (coord, mut rx) = UpdateCoordinator::new();

    coord.begin_mutation();
    coord.on_signal();
    coord.finish_mutation(true); // arms the timer

    tokio::time::sleep(Duration::from_millis(100)).await;
    coord.on_signal(); // idle but pending: countdown restarts

    // 250ms after the first arming, 150ms after the restart: still quiet.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(rx.try_recv().is_ok());
    assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
}

#[tokio::test(start_paused = true)]
async fn failed_mutation_schedules_a_rollback_refresh() {
    let (coord, mut rx) = UpdateCoordinator::new();

    coord.begin_mutation();
    coord.finish_mutation(false);
    assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);

    tokio::time::sleep(DEBOUNCE_QUIET_PERIOD + Duration::from_millis(10)).await;
    assert!(rx.try_recv().is_ok());
}

#[tokio::test(start_paused = true)]
async fn refresh_waits_for_every_overlapping_mutation() {
    let (coord, mut rx) = UpdateCoordinator::new();

    coord.begin_mutation();
    coord.begin_mutation();
    coord.on_signal();

    coord.finish_mutation(true);
    assert_eq!(coord.in_flight(), 1);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);

    coord.finish_mutation(true);
    tokio::time::sleep(DEBOUNCE_QUIET_PERIOD + Duration::from_millis(10)).await;
    assert!(rx.try_recv().is_ok());
    assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_the_pending_timer() {
    let (coord, mut rx) = UpdateCoordinator::new();

    coord.begin_mutation();
    coord.on_signal();
    coord.finish_mutation(true); // arms the timer
    coord.shutdown();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);

    // Signals after shutdown are ignored too.
    coord.on_signal();
    assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
}
