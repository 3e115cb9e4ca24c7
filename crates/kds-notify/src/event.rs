use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ChangeOp
// ---------------------------------------------------------------------------

/// Row operation reported by the store's notification trigger
/// (Postgres `TG_OP` spelling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

// ---------------------------------------------------------------------------
// UpdateEvent
// ---------------------------------------------------------------------------

/// One change notification fanned out to every attached session.
///
/// Carries just enough to identify the affected order, but sessions must
/// treat it as an opaque refresh trigger: the authoritative state is
/// whatever the next fetch returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub operation: ChangeOp,
    pub order_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_trigger_payload() {
        let ev: UpdateEvent =
            serde_json::from_str(r#"{"operation":"UPDATE","order_id":17}"#).unwrap();
        assert_eq!(ev.operation, ChangeOp::Update);
        assert_eq!(ev.order_id, 17);
    }

    #[test]
    fn rejects_unknown_operation() {
        let res: Result<UpdateEvent, _> =
            serde_json::from_str(r#"{"operation":"TRUNCATE","order_id":1}"#);
        assert!(res.is_err());
    }
}
