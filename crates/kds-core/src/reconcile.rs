//! Status reconciliation: the rules that derive order status from item
//! quantities, and the quantity effects of item toggles and order cascades.
//!
//! # Design
//!
//! Order status is derived with hysteresis on the current status rather
//! than recomputed from scratch, so a half-toggled item cannot make the
//! status oscillate between evaluations. The same function is the single
//! source of truth for both the optimistic client path and the
//! authoritative server path.

use crate::{Item, OrderStatus};

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Status of a single item, derived from its quantities.
pub fn derive_item_status(item: &Item) -> OrderStatus {
    if item.is_fully_fulfilled() {
        OrderStatus::Fulfilled
    } else if item.is_fully_prepared() {
        OrderStatus::Ready
    } else {
        OrderStatus::Pending
    }
}

/// Next order status given the current status and the items' quantities.
///
/// Transition table (evaluated after every item mutation):
/// - `ready`: drop to `pending` if any item is not fully prepared; advance
///   to `fulfilled` if every item is fully fulfilled.
/// - `pending`: advance to `ready` once every item is fully prepared
///   (vacuously true for an order with zero items).
/// - `fulfilled`: drop to `pending` if any item is not fully prepared,
///   else drop to `ready` if any item is not fully fulfilled.
///
/// Idempotent: applying it twice over the same items yields the same
/// status as applying it once.
pub fn derive_order_status(current: OrderStatus, items: &[Item]) -> OrderStatus {
    let all_prepared = items.iter().all(Item::is_fully_prepared);
    let all_fulfilled = items.iter().all(Item::is_fully_fulfilled);

    match current {
        OrderStatus::Ready => {
            if !all_prepared {
                OrderStatus::Pending
            } else if all_fulfilled {
                OrderStatus::Fulfilled
            } else {
                OrderStatus::Ready
            }
        }
        OrderStatus::Pending => {
            if all_prepared {
                OrderStatus::Ready
            } else {
                OrderStatus::Pending
            }
        }
        OrderStatus::Fulfilled => {
            if !all_prepared {
                OrderStatus::Pending
            } else if !all_fulfilled {
                OrderStatus::Ready
            } else {
                OrderStatus::Fulfilled
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ItemAction
// ---------------------------------------------------------------------------

/// An operator toggle on a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    /// Fully prepared; any fulfilled progress is reset.
    MarkPrepared,
    /// Fully prepared and fully handed off.
    MarkFulfilled,
    /// Back to untouched.
    Unmark,
    /// Alias of [`ItemAction::Unmark`] used by the recall flow.
    MarkPending,
}

impl ItemAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemAction::MarkPrepared => "mark-prepared",
            ItemAction::MarkFulfilled => "mark-fulfilled",
            ItemAction::Unmark => "unmark",
            ItemAction::MarkPending => "mark-pending",
        }
    }

    pub fn parse(s: &str) -> Result<Self, InvalidItemAction> {
        match s {
            "mark-prepared" => Ok(ItemAction::MarkPrepared),
            "mark-fulfilled" => Ok(ItemAction::MarkFulfilled),
            "unmark" => Ok(ItemAction::Unmark),
            "mark-pending" => Ok(ItemAction::MarkPending),
            other => Err(InvalidItemAction {
                got: other.to_string(),
            }),
        }
    }
}

/// Returned when an action token is not one of the four item toggles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidItemAction {
    pub got: String,
}

impl std::fmt::Display for InvalidItemAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid item action {:?}, must be one of: mark-prepared, mark-fulfilled, unmark, mark-pending",
            self.got
        )
    }
}

impl std::error::Error for InvalidItemAction {}

/// Apply an item toggle to the quantities. Preserves the quantity
/// invariant for any starting state that satisfies it.
pub fn apply_item_action(item: &mut Item, action: ItemAction) {
    match action {
        ItemAction::MarkPrepared => {
            item.prepared_quantity = item.quantity;
            item.fulfilled_quantity = 0;
        }
        ItemAction::MarkFulfilled => {
            item.prepared_quantity = item.quantity;
            item.fulfilled_quantity = item.quantity;
        }
        ItemAction::Unmark | ItemAction::MarkPending => {
            item.prepared_quantity = 0;
            item.fulfilled_quantity = 0;
        }
    }
}

// ---------------------------------------------------------------------------
// Order-level cascade
// ---------------------------------------------------------------------------

/// Quantity cascade applied to every item when an operator sets the whole
/// order's status (unless the caller suppresses it with skip-item-sync):
///
/// - `ready`: every item fully prepared, fulfilled progress unchanged.
/// - `fulfilled`: every item fully prepared and fully fulfilled.
/// - `pending`: every item reset to zero.
pub fn cascade_items(status: OrderStatus, items: &mut [Item]) {
    for item in items.iter_mut() {
        match status {
            OrderStatus::Ready => {
                item.prepared_quantity = item.quantity;
            }
            OrderStatus::Fulfilled => {
                item.prepared_quantity = item.quantity;
                item.fulfilled_quantity = item.quantity;
            }
            OrderStatus::Pending => {
                item.prepared_quantity = 0;
                item.fulfilled_quantity = 0;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(id: i64, quantity: i64, prepared: i64, fulfilled: i64) -> Item {
        Item {
            id,
            kitchen_order_id: 1,
            item_name: format!("item-{id}"),
            quantity,
            prepared_quantity: prepared,
            fulfilled_quantity: fulfilled,
            station: "grill".to_string(),
            special_instructions: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn item_status_thresholds() {
        assert_eq!(derive_item_status(&item(1, 2, 0, 0)), OrderStatus::Pending);
        assert_eq!(derive_item_status(&item(1, 2, 1, 0)), OrderStatus::Pending);
        assert_eq!(derive_item_status(&item(1, 2, 2, 0)), OrderStatus::Ready);
        assert_eq!(
            derive_item_status(&item(1, 2, 2, 2)),
            OrderStatus::Fulfilled
        );
    }

    #[test]
    fn pending_advances_to_ready_when_all_prepared() {
        // Two items, qty 2 and 1. Preparing both flips the order to ready.
        let mut items = vec![item(1, 2, 0, 0), item(2, 1, 0, 0)];
        assert_eq!(
            derive_order_status(OrderStatus::Pending, &items),
            OrderStatus::Pending
        );

        items[0].prepared_quantity = 2;
        assert_eq!(
            derive_order_status(OrderStatus::Pending, &items),
            OrderStatus::Pending
        );

        items[1].prepared_quantity = 1;
        assert_eq!(
            derive_order_status(OrderStatus::Pending, &items),
            OrderStatus::Ready
        );
    }

    #[test]
    fn ready_reverts_to_pending_when_prepared_drops() {
        let mut items = vec![item(1, 2, 2, 0), item(2, 1, 1, 0)];
        assert_eq!(
            derive_order_status(OrderStatus::Ready, &items),
            OrderStatus::Ready
        );

        items[0].prepared_quantity = 1;
        assert_eq!(
            derive_order_status(OrderStatus::Ready, &items),
            OrderStatus::Pending
        );
    }

    #[test]
    fn ready_advances_to_fulfilled_when_all_fulfilled() {
        let items = vec![item(1, 2, 2, 2), item(2, 1, 1, 1)];
        assert_eq!(
            derive_order_status(OrderStatus::Ready, &items),
            OrderStatus::Fulfilled
        );
    }

    #[test]
    fn fulfilled_drops_to_ready_then_pending() {
        // One item no longer fully fulfilled (but still prepared) => ready.
        let mut items = vec![item(1, 2, 2, 2), item(2, 1, 1, 0)];
        assert_eq!(
            derive_order_status(OrderStatus::Fulfilled, &items),
            OrderStatus::Ready
        );

        // One item no longer fully prepared => pending wins.
        items[1].prepared_quantity = 0;
        assert_eq!(
            derive_order_status(OrderStatus::Fulfilled, &items),
            OrderStatus::Pending
        );
    }

    #[test]
    fn empty_order_goes_ready_from_pending() {
        // Vacuous all(): an order created with zero items is trivially prepared.
        let items: Vec<Item> = vec![];
        assert_eq!(
            derive_order_status(OrderStatus::Pending, &items),
            OrderStatus::Ready
        );
    }

    #[test]
    fn derivation_is_idempotent() {
        let cases = vec![
            vec![item(1, 2, 0, 0)],
            vec![item(1, 2, 2, 0)],
            vec![item(1, 2, 2, 2)],
            vec![item(1, 2, 2, 0), item(2, 1, 0, 0)],
            vec![item(1, 2, 2, 2), item(2, 1, 1, 0)],
        ];
        for items in cases {
            for current in [
                OrderStatus::Pending,
                OrderStatus::Ready,
                OrderStatus::Fulfilled,
            ] {
                let once = derive_order_status(current, &items);
                let twice = derive_order_status(once, &items);
                assert_eq!(once, twice, "not idempotent from {current} over {items:?}");
            }
        }
    }

    #[test]
    fn item_actions_preserve_invariant() {
        let starts = [(0, 0), (1, 0), (2, 0), (2, 1), (2, 2)];
        let actions = [
            ItemAction::MarkPrepared,
            ItemAction::MarkFulfilled,
            ItemAction::Unmark,
            ItemAction::MarkPending,
        ];
        for (prepared, fulfilled) in starts {
            for action in actions {
                let mut it = item(1, 2, prepared, fulfilled);
                apply_item_action(&mut it, action);
                assert!(
                    it.quantities_consistent(),
                    "{action:?} broke invariant from ({prepared},{fulfilled})"
                );
            }
        }
    }

    #[test]
    fn mark_prepared_resets_fulfilled() {
        // Re-preparing a handed-off item pulls it back to the ready column.
        let mut it = item(1, 3, 3, 3);
        apply_item_action(&mut it, ItemAction::MarkPrepared);
        assert_eq!(it.prepared_quantity, 3);
        assert_eq!(it.fulfilled_quantity, 0);
        assert_eq!(derive_item_status(&it), OrderStatus::Ready);
    }

    #[test]
    fn cascade_ready_then_pending_round_trip() {
        let mut items = vec![item(1, 2, 0, 0), item(2, 5, 3, 1)];
        cascade_items(OrderStatus::Ready, &mut items);
        assert!(items.iter().all(Item::is_fully_prepared));
        // Fulfilled progress survives a mark-ready.
        assert_eq!(items[1].fulfilled_quantity, 1);

        cascade_items(OrderStatus::Pending, &mut items);
        for it in &items {
            assert_eq!(it.prepared_quantity, 0);
            assert_eq!(it.fulfilled_quantity, 0);
        }
    }

    #[test]
    fn cascade_fulfilled_maxes_both_quantities() {
        let mut items = vec![item(1, 2, 1, 0), item(2, 4, 0, 0)];
        cascade_items(OrderStatus::Fulfilled, &mut items);
        for it in &items {
            assert!(it.is_fully_prepared());
            assert!(it.is_fully_fulfilled());
            assert!(it.quantities_consistent());
        }
        assert_eq!(
            derive_order_status(OrderStatus::Ready, &items),
            OrderStatus::Fulfilled
        );
    }

    #[test]
    fn action_tokens_round_trip() {
        for a in [
            ItemAction::MarkPrepared,
            ItemAction::MarkFulfilled,
            ItemAction::Unmark,
            ItemAction::MarkPending,
        ] {
            assert_eq!(ItemAction::parse(a.as_str()).unwrap(), a);
        }
        assert!(ItemAction::parse("mark-done").is_err());
    }
}
