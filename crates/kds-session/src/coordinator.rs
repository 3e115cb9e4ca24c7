//! Optimistic-update coordination.
//!
//! A refresh arriving while a local mutation is in flight would clobber
//! the optimistic view with stale authoritative data, so external refresh
//! triggers are deferred behind an in-flight counter and replayed — once,
//! debounced — after the burst settles.
//!
//! Guarantee: exactly one authoritative refresh eventually fires after the
//! last mutation/signal in a burst; no refresh is silently dropped.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Quiet period before a coalesced refresh fires. Resettable: every
/// scheduling while a timer is pending restarts the countdown.
pub const DEBOUNCE_QUIET_PERIOD: Duration = Duration::from_millis(200);

#[derive(Default)]
struct CoordState {
    in_flight: u32,
    pending_refresh: bool,
    debounce: Option<JoinHandle<()>>,
    closed: bool,
}

/// Per-session coordinator. Cheap to clone; all clones share one state.
///
/// The consumer side of the refresh channel (returned by [`new`]) is where
/// authoritative re-fetches actually happen — the coordinator only decides
/// *when* one is due.
///
/// [`new`]: UpdateCoordinator::new
#[derive(Clone)]
pub struct UpdateCoordinator {
    state: Arc<Mutex<CoordState>>,
    refresh_tx: mpsc::UnboundedSender<()>,
}

impl UpdateCoordinator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<()>) {
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        (
            Self {
                state: Arc::new(Mutex::new(CoordState::default())),
                refresh_tx,
            },
            refresh_rx,
        )
    }

    /// A local mutation (or an authoritative fetch) is starting.
    pub fn begin_mutation(&self) {
        let mut st = self.state.lock().expect("coordinator state poisoned");
        st.in_flight += 1;
    }

    /// The mutation finished. A failed mutation always schedules a refresh
    /// so the next authoritative fetch rolls the optimistic state back.
    pub fn finish_mutation(&self, ok: bool) {
        let mut st = self.state.lock().expect("coordinator state poisoned");
        st.in_flight = st.in_flight.saturating_sub(1);
        if !ok {
            st.pending_refresh = true;
        }
        if st.in_flight == 0 && st.pending_refresh {
            st.pending_refresh = false;
            self.schedule_debounced(&mut st);
        }
    }

    /// An external change signal arrived (fan-out).
    ///
    /// Busy: defer by flagging. Idle with a timer pending: reset the
    /// timer. Idle otherwise: refresh immediately.
    pub fn on_signal(&self) {
        let mut st = self.state.lock().expect("coordinator state poisoned");
        if st.closed {
            return;
        }
        if st.in_flight > 0 {
            st.pending_refresh = true;
            debug!("refresh deferred behind in-flight mutation");
        } else if st.debounce.is_some() {
            self.schedule_debounced(&mut st);
        } else {
            let _ = self.refresh_tx.send(());
        }
    }

    /// Number of mutations currently in flight.
    pub fn in_flight(&self) -> u32 {
        self.state.lock().expect("coordinator state poisoned").in_flight
    }

    /// Cancel any pending debounce timer. After this no refresh trigger
    /// will fire — teardown must not leave orphaned timers.
    pub fn shutdown(&self) {
        let mut st = self.state.lock().expect("coordinator state poisoned");
        st.closed = true;
        st.pending_refresh = false;
        if let Some(handle) = st.debounce.take() {
            handle.abort();
        }
    }

    /// (Re)start the quiet-period timer; any previous timer is cancelled
    /// so only the last schedule can fire.
    fn schedule_debounced(&self, st: &mut CoordState) {
        if st.closed {
            return;
        }
        if let Some(previous) = st.debounce.take() {
            previous.abort();
        }

        let state = Arc::clone(&self.state);
        let tx = self.refresh_tx.clone();
        st.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(DEBOUNCE_QUIET_PERIOD).await;
            let mut st = state.lock().expect("coordinator state poisoned");
            st.debounce = None;
            if !st.closed {
                let _ = tx.send(());
            }
        }));
    }
}
