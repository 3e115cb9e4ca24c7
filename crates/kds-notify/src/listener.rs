//! Postgres LISTEN source for the broadcaster.

use std::time::Duration;

use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{Broadcaster, UpdateEvent};

/// NOTIFY channel raised by the store's row-change triggers.
pub const CHANNEL: &str = "kds_order_update";

/// Fixed backoff between reconnect attempts; retries are unbounded.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Spawn the task that bridges the store's notification channel into the
/// broadcaster.
///
/// Transient channel failures are retried forever on a fixed delay — the
/// task never gives up while the process runs. Malformed payloads are
/// logged and skipped; they still count as a reason for consumers to have
/// refreshed recently, but we cannot fabricate an order id for them.
///
/// The returned handle is owned by the caller; aborting it is the
/// shutdown path.
pub fn spawn_change_listener(pool: PgPool, broadcaster: Broadcaster) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match listen_once(&pool, &broadcaster).await {
                Ok(()) => warn!("change listener stream ended; reconnecting"),
                Err(e) => warn!(error = %e, "change listener failed; reconnecting"),
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    })
}

/// One LISTEN lifetime: connect, subscribe, pump events until the
/// connection breaks.
async fn listen_once(pool: &PgPool, broadcaster: &Broadcaster) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(CHANNEL).await?;
    info!(channel = CHANNEL, "listening for store change notifications");

    loop {
        let notification = listener.recv().await?;
        match serde_json::from_str::<UpdateEvent>(notification.payload()) {
            Ok(event) => {
                broadcaster.publish(event);
            }
            Err(e) => {
                warn!(
                    payload = notification.payload(),
                    error = %e,
                    "ignoring malformed change notification"
                );
            }
        }
    }
}
