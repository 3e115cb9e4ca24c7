//! Shared runtime state for kds-display.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The state owns the
//! store seam and the fan-out broadcaster; the Postgres LISTEN bridge is
//! started lazily on the first stream subscription.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use kds_db::KdsStore;
use kds_notify::{spawn_change_listener, Broadcaster};

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in the health response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Authoritative store (Postgres in production, in-memory in tests).
    pub store: Arc<dyn KdsStore>,
    /// Fan-out hub bridging store change notifications to SSE streams.
    pub broadcaster: Broadcaster,
    /// Static build metadata.
    pub build: BuildInfo,
    /// Pool the LISTEN bridge connects through. `None` in tests, which
    /// leaves the broadcaster publish-driven only.
    listen_pool: Option<PgPool>,
}

impl AppState {
    pub fn new(store: Arc<dyn KdsStore>, listen_pool: Option<PgPool>) -> Self {
        Self {
            store,
            broadcaster: Broadcaster::new(),
            build: BuildInfo {
                service: "kds-display",
                version: env!("CARGO_PKG_VERSION"),
            },
            listen_pool,
        }
    }

    /// Start the Postgres LISTEN bridge on first call; later calls are
    /// no-ops. Returns whether this call started it.
    pub fn ensure_listener(&self) -> bool {
        let Some(pool) = self.listen_pool.clone() else {
            return false;
        };
        let broadcaster = self.broadcaster.clone();
        self.broadcaster.ensure_subscribed(move || {
            spawn_change_listener(pool, broadcaster);
        })
    }
}
