//! One display's session: mode-specific fetches, optimistic mutations,
//! and the fetch-on-signal loop.

use std::sync::Arc;

use tracing::{info, warn};

use kds_core::{
    apply_item_action, cascade_items, derive_order_status, ItemAction, Order, OrderQuery,
    OrderStatus,
};
use kds_db::{KdsStore, StoreError};
use kds_notify::{Broadcaster, RECONNECT_DELAY};

use crate::UpdateCoordinator;

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Viewing context of a display, each with its own order filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Orders still being prepared.
    Kitchen,
    /// Orders ready for handoff (plus those still cooking).
    Pickup,
    /// Everything, most recently touched first, for corrections.
    Recall,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Kitchen => "kitchen",
            Mode::Pickup => "pickup",
            Mode::Recall => "recall",
        }
    }

    /// The authoritative query this mode refreshes from.
    pub fn query(&self) -> OrderQuery {
        match self {
            Mode::Kitchen => OrderQuery::by_status(OrderStatus::Pending),
            Mode::Pickup => OrderQuery::by_statuses(OrderStatus::Ready, OrderStatus::Pending),
            Mode::Recall => OrderQuery::all_recent_first(),
        }
    }

    /// Whether an order in `status` belongs on this display at all. Used
    /// to drop an order from the local view as soon as an optimistic
    /// transition moves it off-screen.
    pub fn shows(&self, status: OrderStatus) -> bool {
        match self {
            Mode::Kitchen => status == OrderStatus::Pending,
            Mode::Pickup => matches!(status, OrderStatus::Pending | OrderStatus::Ready),
            Mode::Recall => true,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DisplaySession
// ---------------------------------------------------------------------------

/// A long-lived per-display subscription plus its local order snapshot.
///
/// The snapshot is optimistic and possibly stale; it is always subordinate
/// to the next authoritative refresh. All session logic runs on one
/// logical task with suspension points at store calls, so no two
/// mutations from the same session interleave their visible effects.
pub struct DisplaySession {
    mode: Mode,
    store: Arc<dyn KdsStore>,
    coordinator: UpdateCoordinator,
    refresh_rx: tokio::sync::mpsc::UnboundedReceiver<()>,
    orders: Vec<Order>,
    connected: bool,
}

impl DisplaySession {
    pub fn new(mode: Mode, store: Arc<dyn KdsStore>) -> Self {
        let (coordinator, refresh_rx) = UpdateCoordinator::new();
        Self {
            mode,
            store,
            coordinator,
            refresh_rx,
            orders: Vec::new(),
            connected: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Local (optimistic) view of the orders for this mode.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Whether the real-time channel is currently believed up.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn coordinator(&self) -> &UpdateCoordinator {
        &self.coordinator
    }

    /// Whether the coordinator has a refresh trigger queued for us.
    pub fn refresh_requested(&mut self) -> bool {
        self.refresh_rx.try_recv().is_ok()
    }

    /// An external change signal arrived; the coordinator decides whether
    /// it fires now, coalesces, or waits out an in-flight mutation.
    pub fn handle_signal(&mut self) {
        self.coordinator.on_signal();
    }

    /// Authoritative refresh: replace the local snapshot with the store's
    /// answer for this mode. Counted as in-flight so a signal arriving
    /// mid-fetch coalesces instead of stacking fetches.
    pub async fn refresh(&mut self) -> Result<(), StoreError> {
        self.coordinator.begin_mutation();
        let result = self.store.fetch_orders(self.mode.query()).await;
        let ok = result.is_ok();
        let out = match result {
            Ok(orders) => {
                self.orders = orders;
                Ok(())
            }
            Err(e) => Err(e),
        };
        self.coordinator.finish_mutation(ok);
        out
    }

    /// Toggle one item, optimistically then authoritatively.
    ///
    /// The local copy is updated before the store call; the order's status
    /// is re-derived locally with the same rules the store applies, and a
    /// disagreement with the authoritative answer is treated as staleness
    /// and resolved by flagging a refresh.
    pub async fn toggle_item(
        &mut self,
        order_id: i64,
        item_id: i64,
        action: ItemAction,
    ) -> Result<(), StoreError> {
        let Some(idx) = self.orders.iter().position(|o| o.id == order_id) else {
            return Err(StoreError::NotFound(format!("order {order_id}")));
        };

        self.coordinator.begin_mutation();

        // Optimistic: apply the toggle and the derived order transition
        // locally so the display updates without waiting on the store.
        let derived = {
            let order = &mut self.orders[idx];
            if let Some(item) = order.items.iter_mut().find(|i| i.id == item_id) {
                apply_item_action(item, action);
            }
            let derived = derive_order_status(order.status, &order.items);
            order.status = derived;
            derived
        };
        self.drop_offscreen_orders();

        let result = self.store.set_item_status(item_id, action).await;
        match &result {
            Ok(update) => {
                if update.order_status != derived {
                    // Client and server disagreeing means our snapshot was
                    // stale; the queued refresh restores truth.
                    warn!(
                        order_id,
                        local = %derived,
                        authoritative = %update.order_status,
                        "optimistic status disagrees with store; refreshing"
                    );
                    self.coordinator.on_signal();
                }
            }
            Err(e) => warn!(item_id, error = %e, "item toggle failed"),
        }

        let ok = result.is_ok();
        self.coordinator.finish_mutation(ok);
        result.map(|_| ())
    }

    /// Set a whole order's status, optimistically then authoritatively.
    /// The item-quantity cascade mirrors the store's unless suppressed.
    pub async fn set_order_status(
        &mut self,
        order_id: i64,
        status: OrderStatus,
        skip_item_sync: bool,
    ) -> Result<(), StoreError> {
        self.coordinator.begin_mutation();

        if let Some(order) = self.orders.iter_mut().find(|o| o.id == order_id) {
            order.status = status;
            if !skip_item_sync {
                cascade_items(status, &mut order.items);
            }
        }
        self.drop_offscreen_orders();

        let result = self.store.set_order_status(order_id, status, skip_item_sync).await;
        if let Err(e) = &result {
            warn!(order_id, status = %status, error = %e, "order status change failed");
        }

        let ok = result.is_ok();
        self.coordinator.finish_mutation(ok);
        result.map(|_| ())
    }

    /// Drive the session against a broadcaster: fetch once, then alternate
    /// between change signals and coordinator-approved refreshes. On
    /// channel loss the session is marked disconnected and re-attaches on
    /// a fixed delay, forever.
    pub async fn run(&mut self, broadcaster: &Broadcaster) {
        let mut handle = broadcaster.attach();
        self.connected = true;
        if let Err(e) = self.refresh().await {
            warn!(mode = %self.mode, error = %e, "initial fetch failed");
        }

        loop {
            tokio::select! {
                event = handle.recv() => match event {
                    Some(_) => self.handle_signal(),
                    None => {
                        self.connected = false;
                        warn!(mode = %self.mode, "realtime link lost; reconnecting");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                        handle = broadcaster.attach();
                        self.connected = true;
                        info!(mode = %self.mode, "realtime link re-established");
                        self.handle_signal();
                    }
                },
                Some(()) = self.refresh_rx.recv() => {
                    if let Err(e) = self.refresh().await {
                        warn!(mode = %self.mode, error = %e, "refresh failed");
                    }
                }
            }
        }
    }

    /// Tear the session down: cancels the debounce timer so nothing fires
    /// after this returns.
    pub fn close(&mut self) {
        self.coordinator.shutdown();
        self.connected = false;
    }

    fn drop_offscreen_orders(&mut self) {
        let mode = self.mode;
        self.orders.retain(|o| mode.shows(o.status));
    }
}
