use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Preparation lifecycle status.
///
/// Used for whole orders and (via [`derive_item_status`]) for individual
/// items; both move through the same three states.
///
/// [`derive_item_status`]: crate::derive_item_status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// At least one item still needs preparation.
    Pending,
    /// Every item is fully prepared; awaiting pickup.
    Ready,
    /// Every item has been handed off.
    Fulfilled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Ready => "ready",
            OrderStatus::Fulfilled => "fulfilled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, InvalidStatus> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "ready" => Ok(OrderStatus::Ready),
            "fulfilled" => Ok(OrderStatus::Fulfilled),
            other => Err(InvalidStatus {
                got: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// InvalidStatus
// ---------------------------------------------------------------------------

/// Returned when a status string is not one of `pending|ready|fulfilled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStatus {
    pub got: String,
}

impl std::fmt::Display for InvalidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid status {:?}, must be one of: pending, ready, fulfilled",
            self.got
        )
    }
}

impl std::error::Error for InvalidStatus {}
