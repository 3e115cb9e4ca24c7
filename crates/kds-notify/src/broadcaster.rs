//! Session registry and event delivery.
//!
//! The broadcaster is an explicit object with injected lifecycle — no
//! ambient global registry. It tracks session attachment but does not own
//! session lifecycle: a [`SessionHandle`] deregisters itself on drop, and
//! delivery to a closed channel prunes the entry instead of failing the
//! broadcast.

use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::UpdateEvent;

struct SessionEntry {
    id: Uuid,
    tx: mpsc::UnboundedSender<UpdateEvent>,
}

struct Inner {
    sessions: Vec<SessionEntry>,
    subscribed: bool,
    closed: bool,
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// Fan-out hub: one per process, cloneable handle shared by the change
/// listener and every place sessions are created.
///
/// The registry mutex is held only for registry surgery, never across an
/// await; the expected session count is tens, not thousands.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Mutex<Inner>>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sessions: Vec::new(),
                subscribed: false,
                closed: false,
            })),
        }
    }

    /// Attach a session and hand back its event receiver. After
    /// [`shutdown`][Broadcaster::shutdown] the handle is returned already
    /// closed (its first `recv` yields `None`).
    pub fn attach(&self) -> SessionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let mut inner = self.inner.lock().expect("broadcaster registry poisoned");
        if !inner.closed {
            inner.sessions.push(SessionEntry { id, tx });
            debug!(session = %id, total = inner.sessions.len(), "session attached");
        }

        SessionHandle {
            id,
            rx,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a session from the registry. Idempotent; also called from
    /// [`SessionHandle`]'s drop.
    pub fn detach(&self, id: Uuid) {
        detach_from(&self.inner, id);
    }

    /// Run `start` exactly once over the broadcaster's lifetime — the
    /// guard for establishing the single underlying change-channel
    /// subscription on first attach. Returns whether this call ran it.
    ///
    /// The subscription is intentionally not torn down when the last
    /// session detaches; with a small bounded display count the idle
    /// listener is cheaper than resubscribe churn.
    pub fn ensure_subscribed(&self, start: impl FnOnce()) -> bool {
        {
            let mut inner = self.inner.lock().expect("broadcaster registry poisoned");
            if inner.subscribed || inner.closed {
                return false;
            }
            inner.subscribed = true;
        }
        // Lock released first: `start` typically captures a clone of this
        // broadcaster and may re-enter it.
        start();
        true
    }

    /// Deliver an event to every attached session. Sessions whose channel
    /// has closed are pruned and delivery continues to the rest. Returns
    /// the number of sessions that received the event.
    pub fn publish(&self, event: UpdateEvent) -> usize {
        let mut inner = self.inner.lock().expect("broadcaster registry poisoned");

        let before = inner.sessions.len();
        inner.sessions.retain(|s| {
            let ok = s.tx.send(event).is_ok();
            if !ok {
                warn!(session = %s.id, "dropping dead session from fan-out registry");
            }
            ok
        });

        let delivered = inner.sessions.len();
        debug!(
            delivered,
            pruned = before - delivered,
            order_id = event.order_id,
            "change event fanned out"
        );
        delivered
    }

    pub fn session_count(&self) -> usize {
        self.inner
            .lock()
            .expect("broadcaster registry poisoned")
            .sessions
            .len()
    }

    /// Injected lifecycle: close the registry. Existing handles see their
    /// channels end; later attaches are not registered.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock().expect("broadcaster registry poisoned");
        inner.closed = true;
        inner.sessions.clear();
    }
}

fn detach_from(registry: &Arc<Mutex<Inner>>, id: Uuid) {
    let mut inner = registry.lock().expect("broadcaster registry poisoned");
    inner.sessions.retain(|s| s.id != id);
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Receiving end of one session's attachment. Dropping the handle detaches
/// the session (the registry holds only a weak reference back, so a handle
/// outliving its broadcaster is harmless).
pub struct SessionHandle {
    id: Uuid,
    rx: mpsc::UnboundedReceiver<UpdateEvent>,
    registry: Weak<Mutex<Inner>>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event, or `None` once the broadcaster is gone or shut down.
    pub async fn recv(&mut self) -> Option<UpdateEvent> {
        self.rx.recv().await
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            detach_from(&registry, self.id);
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
