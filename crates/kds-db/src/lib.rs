//! kds-db
//!
//! Authoritative store for kitchen orders and items, backed by Postgres.
//!
//! The store is the sole owner of order/item state: every display session
//! holds a local, possibly stale copy that is subordinate to the next
//! authoritative refresh. Multi-statement updates (order + item cascades,
//! item toggle + status reconciliation) run inside a single transaction so
//! a partial failure rolls back the whole group.
//!
//! [`KdsStore`] is the seam consumed by sessions and HTTP handlers;
//! [`PgStore`] is the production implementation, `MemoryStore` (behind the
//! `testkit` feature) the in-process reference used by tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use kds_core::{Item, ItemAction, NewOrder, Order, OrderQuery, OrderStatus, ValidationError};

mod pg;
pub use pg::PgStore;

#[cfg(feature = "testkit")]
mod memory;
#[cfg(feature = "testkit")]
pub use memory::MemoryStore;

pub const ENV_DB_URL: &str = "KDS_DATABASE_URL";

/// Connect to Postgres using KDS_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url =
        std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Error taxonomy for store operations.
///
/// - `Validation` — malformed request, rejected before any write; no retry.
/// - `NotFound` — unknown order/item; reported to the operator, no retry.
/// - `Db` — transport or transaction failure; the caller surfaces it and
///   schedules an authoritative refresh.
/// - `Decode` — a row could not be mapped back into domain types.
#[derive(Debug)]
pub enum StoreError {
    Validation(ValidationError),
    NotFound(String),
    Db(sqlx::Error),
    Decode(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Validation(e) => write!(f, "{e}"),
            StoreError::NotFound(what) => write!(f, "not found: {what}"),
            StoreError::Db(e) => write!(f, "store failure: {e}"),
            StoreError::Decode(msg) => write!(f, "row decode failure: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Validation(e) => Some(e),
            StoreError::Db(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Db(e)
    }
}

impl From<ValidationError> for StoreError {
    fn from(e: ValidationError) -> Self {
        StoreError::Validation(e)
    }
}

// ---------------------------------------------------------------------------
// Mutation results
// ---------------------------------------------------------------------------

/// Result of an item toggle: the updated item plus the order status the
/// authoritative reconciliation settled on.
#[derive(Debug, Clone)]
pub struct ItemUpdate {
    pub item: Item,
    pub order_id: i64,
    pub order_status: OrderStatus,
}

/// Result of an order-level status change.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub order_id: i64,
    pub status: OrderStatus,
}

// ---------------------------------------------------------------------------
// KdsStore
// ---------------------------------------------------------------------------

/// The authoritative-store interface consumed by display sessions and the
/// HTTP surface.
#[async_trait]
pub trait KdsStore: Send + Sync {
    /// Orders (with items nested, item id ascending) matching the query.
    async fn fetch_orders(&self, query: OrderQuery) -> Result<Vec<Order>, StoreError>;

    /// Create a ticket (order + items) as one unit. Returns the new order id.
    async fn create_order(&self, new: NewOrder) -> Result<i64, StoreError>;

    /// Apply an item toggle, then reconcile the parent order's status from
    /// its items inside the same transaction.
    async fn set_item_status(
        &self,
        item_id: i64,
        action: ItemAction,
    ) -> Result<ItemUpdate, StoreError>;

    /// Set an order's status, matched by internal id or POS reference id,
    /// cascading to item quantities unless `skip_item_sync` is set.
    async fn set_order_status(
        &self,
        order_ref: i64,
        status: OrderStatus,
        skip_item_sync: bool,
    ) -> Result<OrderUpdate, StoreError>;
}
