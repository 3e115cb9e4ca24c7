use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OrderStatus;

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// One line item on a kitchen ticket.
///
/// Items are created together with their order and never added or removed
/// afterwards; only `prepared_quantity` and `fulfilled_quantity` mutate.
///
/// Invariant after every mutation:
/// `0 <= fulfilled_quantity <= prepared_quantity <= quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub kitchen_order_id: i64,
    pub item_name: String,
    /// Ordered quantity; always positive.
    pub quantity: i64,
    pub prepared_quantity: i64,
    pub fulfilled_quantity: i64,
    /// Prep station the item is routed to (e.g. "grill", "fryer").
    pub station: String,
    /// Free-text, comma-separated sub-instructions.
    pub special_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// The quantity invariant. Any write path that breaks this is a defect;
    /// the store additionally enforces it with a check constraint.
    pub fn quantities_consistent(&self) -> bool {
        0 <= self.fulfilled_quantity
            && self.fulfilled_quantity <= self.prepared_quantity
            && self.prepared_quantity <= self.quantity
    }

    pub fn is_fully_prepared(&self) -> bool {
        self.prepared_quantity == self.quantity
    }

    pub fn is_fully_fulfilled(&self) -> bool {
        self.fulfilled_quantity == self.quantity
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// A kitchen ticket: one order plus its line items.
///
/// `status` is a derived quantity — a pure function of the items (see
/// [`derive_order_status`]) — except when an operator forces it with the
/// explicit skip-item-sync override for manual corrections.
///
/// [`derive_order_status`]: crate::derive_order_status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    /// External reference id from the point of sale.
    pub pos_order_id: i64,
    /// Customer-facing display number.
    pub order_number: i64,
    pub status: OrderStatus,
    /// Customer name, when the point of sale captured one.
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Ordered by item id ascending.
    pub items: Vec<Item>,
}

// ---------------------------------------------------------------------------
// NewOrder / NewItem — creation payloads
// ---------------------------------------------------------------------------

/// Payload for creating a ticket. An empty item list is valid (an order can
/// exist with zero items); a missing/non-positive reference id or display
/// number is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub pos_order_id: i64,
    pub order_number: i64,
    pub status: OrderStatus,
    pub name: Option<String>,
    pub items: Vec<NewItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub item_name: String,
    pub quantity: i64,
    pub station: String,
    pub special_instructions: Option<String>,
    pub prepared_quantity: i64,
    pub fulfilled_quantity: i64,
}

impl NewOrder {
    /// Validate the payload before any write.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pos_order_id <= 0 {
            return Err(ValidationError::new("pos_order_id must be positive"));
        }
        if self.order_number <= 0 {
            return Err(ValidationError::new("order_number must be positive"));
        }
        for (idx, item) in self.items.iter().enumerate() {
            if item.item_name.trim().is_empty() {
                return Err(ValidationError::new(format!(
                    "items[{idx}].item_name must not be empty"
                )));
            }
            if item.quantity <= 0 {
                return Err(ValidationError::new(format!(
                    "items[{idx}].quantity must be positive"
                )));
            }
            if !(0 <= item.fulfilled_quantity
                && item.fulfilled_quantity <= item.prepared_quantity
                && item.prepared_quantity <= item.quantity)
            {
                return Err(ValidationError::new(format!(
                    "items[{idx}] quantities violate 0 <= fulfilled <= prepared <= quantity"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// A malformed request, rejected before any write. Never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation error: {}", self.message)
    }
}

impl std::error::Error for ValidationError {}
