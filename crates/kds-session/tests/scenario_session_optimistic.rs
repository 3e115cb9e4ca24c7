//! Display-session scenarios against the in-memory store: optimistic
//! mutations, mode filtering, and staleness recovery.

use std::sync::Arc;
use std::time::Duration;

use kds_core::{ItemAction, NewItem, NewOrder, OrderStatus};
use kds_db::{KdsStore, MemoryStore, StoreError};
use kds_session::{DisplaySession, Mode, DEBOUNCE_QUIET_PERIOD};

fn ticket(pos_order_id: i64, order_number: i64) -> NewOrder {
    NewOrder {
        pos_order_id,
        order_number,
        status: OrderStatus::Pending,
        name: Some(format!("table {order_number}")),
        items: vec![
            NewItem {
                item_name: "double burger".into(),
                quantity: 2,
                station: "grill".into(),
                special_instructions: None,
                prepared_quantity: 0,
                fulfilled_quantity: 0,
            },
            NewItem {
                item_name: "fries".into(),
                quantity: 1,
                station: "fry".into(),
                special_instructions: Some("extra salt".into()),
                prepared_quantity: 0,
                fulfilled_quantity: 0,
            },
        ],
    }
}

#[tokio::test]
async fn preparing_all_items_moves_the_order_off_the_kitchen_display() {
    let store = Arc::new(MemoryStore::new());
    let order_id = store.create_order(ticket(101, 1)).await.unwrap();

    let mut session = DisplaySession::new(Mode::Kitchen, store.clone());
    session.refresh().await.unwrap();
    assert_eq!(session.orders().len(), 1);

    let item_ids: Vec<i64> = session.orders()[0].items.iter().map(|i| i.id).collect();

    session
        .toggle_item(order_id, item_ids[0], ItemAction::MarkPrepared)
        .await
        .unwrap();
    // One of two items prepared: still pending, still on the display.
    assert_eq!(session.orders().len(), 1);
    assert_eq!(session.orders()[0].status, OrderStatus::Pending);

    session
        .toggle_item(order_id, item_ids[1], ItemAction::MarkPrepared)
        .await
        .unwrap();
    // The derived transition to ready drops the order off the kitchen view.
    assert!(session.orders().is_empty());
    assert_eq!(store.order(order_id).unwrap().status, OrderStatus::Ready);

    // Local and authoritative derivations agreed, so no refresh was queued.
    assert!(!session.refresh_requested());
}

#[tokio::test]
async fn fulfilling_every_item_clears_the_pickup_display() {
    let store = Arc::new(MemoryStore::new());
    let order_id = store.create_order(ticket(102, 2)).await.unwrap();
    store
        .set_order_status(order_id, OrderStatus::Ready, false)
        .await
        .unwrap();

    let mut session = DisplaySession::new(Mode::Pickup, store.clone());
    session.refresh().await.unwrap();
    assert_eq!(session.orders().len(), 1);

    let item_ids: Vec<i64> = session.orders()[0].items.iter().map(|i| i.id).collect();
    for item_id in item_ids {
        session
            .toggle_item(order_id, item_id, ItemAction::MarkFulfilled)
            .await
            .unwrap();
    }

    assert!(session.orders().is_empty());
    assert_eq!(store.order(order_id).unwrap().status, OrderStatus::Fulfilled);
}

#[tokio::test]
async fn toggling_an_order_the_session_cannot_see_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let mut session = DisplaySession::new(Mode::Kitchen, store.clone());
    session.refresh().await.unwrap();

    let err = session
        .toggle_item(999, 1, ItemAction::MarkPrepared)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
    assert!(store.snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stale_snapshot_is_detected_and_a_refresh_queued() {
    let store = Arc::new(MemoryStore::new());
    let order_id = store.create_order(ticket(103, 3)).await.unwrap();

    let mut session = DisplaySession::new(Mode::Kitchen, store.clone());
    session.refresh().await.unwrap();
    let item_ids: Vec<i64> = session.orders()[0].items.iter().map(|i| i.id).collect();

    // Another display prepares the second item behind this session's back.
    store
        .set_item_status(item_ids[1], ItemAction::MarkPrepared)
        .await
        .unwrap();

    // Locally this toggle derives pending; the store derives ready.
    session
        .toggle_item(order_id, item_ids[0], ItemAction::MarkPrepared)
        .await
        .unwrap();

    assert!(!session.refresh_requested());
    tokio::time::sleep(DEBOUNCE_QUIET_PERIOD + Duration::from_millis(10)).await;
    assert!(session.refresh_requested());

    session.refresh().await.unwrap();
    // The authoritative answer (ready) left the kitchen view.
    assert!(session.orders().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_order_mutation_queues_a_rollback_refresh() {
    let store = Arc::new(MemoryStore::new());
    let mut session = DisplaySession::new(Mode::Recall, store);
    session.refresh().await.unwrap();

    let err = session
        .set_order_status(999, OrderStatus::Ready, false)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));

    tokio::time::sleep(DEBOUNCE_QUIET_PERIOD + Duration::from_millis(10)).await;
    assert!(session.refresh_requested());
}

#[tokio::test]
async fn marking_ready_cascades_item_preparation_unless_suppressed() {
    let store = Arc::new(MemoryStore::new());
    let cascaded = store.create_order(ticket(104, 4)).await.unwrap();
    let suppressed = store.create_order(ticket(105, 5)).await.unwrap();

    let mut session = DisplaySession::new(Mode::Recall, store.clone());
    session.refresh().await.unwrap();

    session
        .set_order_status(cascaded, OrderStatus::Ready, false)
        .await
        .unwrap();
    session
        .set_order_status(suppressed, OrderStatus::Ready, true)
        .await
        .unwrap();

    let check = |id: i64, prepared: bool| {
        let order = store.order(id).unwrap();
        assert_eq!(order.status, OrderStatus::Ready);
        for item in &order.items {
            if prepared {
                assert_eq!(item.prepared_quantity, item.quantity);
            } else {
                assert_eq!(item.prepared_quantity, 0);
            }
        }
    };
    check(cascaded, true);
    check(suppressed, false);

    // The recall view keeps both, optimistic copy included.
    assert_eq!(session.orders().len(), 2);
    assert!(session
        .orders()
        .iter()
        .all(|o| o.status == OrderStatus::Ready));
}

#[tokio::test]
async fn closing_the_session_silences_later_signals() {
    let store = Arc::new(MemoryStore::new());
    let mut session = DisplaySession::new(Mode::Kitchen, store);
    session.refresh().await.unwrap();

    session.close();
    assert!(!session.is_connected());

    session.handle_signal();
    assert!(!session.refresh_requested());
}
