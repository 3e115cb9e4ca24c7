use crate::OrderStatus;

/// Orders whose `updated_at` is older than this are excluded from every
/// view, recall included. Aged-out orders are kept, just not displayed.
pub const ACTIVE_WINDOW_HOURS: i64 = 12;

// ---------------------------------------------------------------------------
// OrderQuery
// ---------------------------------------------------------------------------

/// Sort order for a read query. `IdAsc` is the default (ticket arrival
/// order); the explicitly requested sorts are all newest-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    IdAsc,
    IdDesc,
    UpdatedAtDesc,
    CreatedAtDesc,
}

/// A read-query description: at most two statuses OR-ed together, always
/// inside the active window. The store adapter turns this into SQL; the
/// display modes produce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub status2: Option<OrderStatus>,
    pub order_by: OrderBy,
}

impl OrderQuery {
    /// Orders in one status, within the active window, id ascending.
    pub fn by_status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            status2: None,
            order_by: OrderBy::IdAsc,
        }
    }

    /// Orders in either of two statuses, within the active window.
    pub fn by_statuses(status: OrderStatus, status2: OrderStatus) -> Self {
        Self {
            status: Some(status),
            status2: Some(status2),
            order_by: OrderBy::IdAsc,
        }
    }

    /// Orders in any status within the active window, most recently
    /// touched first.
    pub fn all_recent_first() -> Self {
        Self {
            status: None,
            status2: None,
            order_by: OrderBy::UpdatedAtDesc,
        }
    }
}
