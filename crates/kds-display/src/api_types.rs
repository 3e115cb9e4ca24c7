//! Request and response types for all kds-display HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use serde::{Deserialize, Serialize};

use kds_core::{Item, NewItem, NewOrder, OrderStatus};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Error body
// ---------------------------------------------------------------------------

/// Body of every non-2xx JSON response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// POST /v1/orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub pos_order_id: i64,
    pub order_number: i64,
    /// Defaults to `pending` when the POS leaves it out.
    #[serde(default = "default_status")]
    pub status: OrderStatus,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub items: Vec<CreateItemRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItemRequest {
    pub item_name: String,
    pub quantity: i64,
    pub station: String,
    #[serde(default)]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub prepared_quantity: i64,
    #[serde(default)]
    pub fulfilled_quantity: i64,
}

fn default_status() -> OrderStatus {
    OrderStatus::Pending
}

impl From<CreateOrderRequest> for NewOrder {
    fn from(req: CreateOrderRequest) -> Self {
        NewOrder {
            pos_order_id: req.pos_order_id,
            order_number: req.order_number,
            status: req.status,
            name: req.name,
            items: req.items.into_iter().map(NewItem::from).collect(),
        }
    }
}

impl From<CreateItemRequest> for NewItem {
    fn from(req: CreateItemRequest) -> Self {
        NewItem {
            item_name: req.item_name,
            quantity: req.quantity,
            station: req.station,
            special_instructions: req.special_instructions,
            prepared_quantity: req.prepared_quantity,
            fulfilled_quantity: req.fulfilled_quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order_id: i64,
}

// ---------------------------------------------------------------------------
// POST /v1/orders/:order_ref/:action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusResponse {
    pub order_id: i64,
    pub status: OrderStatus,
}

// ---------------------------------------------------------------------------
// POST /v1/items/:item_id/:action
// ---------------------------------------------------------------------------

/// The toggled item plus the order status the store reconciled to, so a
/// caller can spot that its optimistic derivation was stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemUpdateResponse {
    pub item: Item,
    pub order_id: i64,
    pub order_status: OrderStatus,
}
