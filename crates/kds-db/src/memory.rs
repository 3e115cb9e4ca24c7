//! In-memory reference implementation of [`KdsStore`] (testkit).
//!
//! Mirrors the Postgres store's semantics exactly — same validation, same
//! cascades, same authoritative reconciliation — so session and router
//! tests can run without a database and still exercise the real rules.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use kds_core::{
    apply_item_action, cascade_items, derive_order_status, Item, ItemAction, NewOrder, Order,
    OrderBy, OrderQuery, OrderStatus, ACTIVE_WINDOW_HOURS,
};

use crate::{ItemUpdate, KdsStore, OrderUpdate, StoreError};

#[derive(Debug, Default)]
struct MemoryInner {
    orders: Vec<Order>,
    next_order_id: i64,
    next_item_id: i64,
}

/// In-memory [`KdsStore`]. Interior mutability only; safe to share behind
/// an `Arc` across tasks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                orders: Vec::new(),
                next_order_id: 1,
                next_item_id: 1,
            }),
        }
    }

    /// Snapshot of every order, for test assertions.
    pub fn snapshot(&self) -> Vec<Order> {
        self.inner.lock().expect("memory store poisoned").orders.clone()
    }

    /// One order by internal id, for test assertions.
    pub fn order(&self, order_id: i64) -> Option<Order> {
        self.inner
            .lock()
            .expect("memory store poisoned")
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
    }
}

#[async_trait]
impl KdsStore for MemoryStore {
    async fn fetch_orders(&self, query: OrderQuery) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let cutoff = Utc::now() - Duration::hours(ACTIVE_WINDOW_HOURS);

        let mut out: Vec<Order> = inner
            .orders
            .iter()
            .filter(|o| match (query.status, query.status2) {
                (Some(a), Some(b)) => (o.status == a || o.status == b) && o.updated_at >= cutoff,
                (Some(a), None) => o.status == a && o.updated_at >= cutoff,
                (None, _) => o.updated_at >= cutoff,
            })
            .cloned()
            .collect();

        match query.order_by {
            OrderBy::IdAsc => out.sort_by_key(|o| o.id),
            OrderBy::IdDesc => out.sort_by(|a, b| b.id.cmp(&a.id)),
            OrderBy::UpdatedAtDesc => out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
            OrderBy::CreatedAtDesc => out.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        }

        Ok(out)
    }

    async fn create_order(&self, new: NewOrder) -> Result<i64, StoreError> {
        new.validate()?;

        let mut inner = self.inner.lock().expect("memory store poisoned");
        let now = Utc::now();

        let order_id = inner.next_order_id;
        inner.next_order_id += 1;

        let mut items = Vec::with_capacity(new.items.len());
        for ni in &new.items {
            let item_id = inner.next_item_id;
            inner.next_item_id += 1;
            items.push(Item {
                id: item_id,
                kitchen_order_id: order_id,
                item_name: ni.item_name.clone(),
                quantity: ni.quantity,
                prepared_quantity: ni.prepared_quantity,
                fulfilled_quantity: ni.fulfilled_quantity,
                station: ni.station.clone(),
                special_instructions: ni.special_instructions.clone(),
                created_at: now,
                updated_at: now,
            });
        }

        inner.orders.push(Order {
            id: order_id,
            pos_order_id: new.pos_order_id,
            order_number: new.order_number,
            status: new.status,
            name: new.name.clone(),
            created_at: now,
            updated_at: now,
            items,
        });

        Ok(order_id)
    }

    async fn set_item_status(
        &self,
        item_id: i64,
        action: ItemAction,
    ) -> Result<ItemUpdate, StoreError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let now = Utc::now();

        let order = inner
            .orders
            .iter_mut()
            .find(|o| o.items.iter().any(|i| i.id == item_id))
            .ok_or_else(|| StoreError::NotFound(format!("item {item_id}")))?;

        let item = order
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .expect("item located above");
        apply_item_action(item, action);
        item.updated_at = now;
        let updated_item = item.clone();

        // Same authoritative reconciliation the Postgres store performs.
        let next = derive_order_status(order.status, &order.items);
        if next != order.status {
            order.status = next;
            order.updated_at = now;
        }

        Ok(ItemUpdate {
            item: updated_item,
            order_id: order.id,
            order_status: order.status,
        })
    }

    async fn set_order_status(
        &self,
        order_ref: i64,
        status: OrderStatus,
        skip_item_sync: bool,
    ) -> Result<OrderUpdate, StoreError> {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        let now = Utc::now();

        let order = inner
            .orders
            .iter_mut()
            .find(|o| o.id == order_ref || o.pos_order_id == order_ref)
            .ok_or_else(|| StoreError::NotFound(format!("order {order_ref}")))?;

        if !skip_item_sync {
            cascade_items(status, &mut order.items);
            for item in order.items.iter_mut() {
                item.updated_at = now;
            }
        }

        order.status = status;
        order.updated_at = now;

        Ok(OrderUpdate {
            order_id: order.id,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(pos_order_id: i64) -> NewOrder {
        NewOrder {
            pos_order_id,
            order_number: pos_order_id,
            status: OrderStatus::Pending,
            name: None,
            items: vec![],
        }
    }

    /// Every mutation stamps `updated_at = now()`, so a stale row has to be
    /// backdated directly.
    fn backdate(store: &MemoryStore, order_id: i64, hours: i64) {
        let mut inner = store.inner.lock().unwrap();
        let order = inner.orders.iter_mut().find(|o| o.id == order_id).unwrap();
        order.updated_at = Utc::now() - Duration::hours(hours);
    }

    #[tokio::test]
    async fn recency_window_applies_to_every_view() {
        let store = MemoryStore::new();
        let stale_id = store.create_order(ticket(1)).await.unwrap();
        let fresh_id = store.create_order(ticket(2)).await.unwrap();
        backdate(&store, stale_id, ACTIVE_WINDOW_HOURS + 1);

        // Single-status view.
        let kitchen = store
            .fetch_orders(OrderQuery::by_status(OrderStatus::Pending))
            .await
            .unwrap();
        assert_eq!(kitchen.len(), 1);
        assert_eq!(kitchen[0].id, fresh_id);

        // Two-status view.
        let pickup = store
            .fetch_orders(OrderQuery::by_statuses(
                OrderStatus::Ready,
                OrderStatus::Pending,
            ))
            .await
            .unwrap();
        assert_eq!(pickup.len(), 1);

        // Recall ages orders out too; they are retained, just not shown.
        let recall = store.fetch_orders(OrderQuery::all_recent_first()).await.unwrap();
        assert_eq!(recall.len(), 1);
        assert_eq!(recall[0].id, fresh_id);
        assert!(store.order(stale_id).is_some(), "aged out, not deleted");
    }

    #[tokio::test]
    async fn touching_a_stale_order_brings_it_back_on_screen() {
        let store = MemoryStore::new();
        let order_id = store.create_order(ticket(3)).await.unwrap();
        backdate(&store, order_id, ACTIVE_WINDOW_HOURS + 1);

        store
            .set_order_status(order_id, OrderStatus::Pending, false)
            .await
            .unwrap();

        let recall = store.fetch_orders(OrderQuery::all_recent_first()).await.unwrap();
        assert_eq!(recall.len(), 1);
    }
}
