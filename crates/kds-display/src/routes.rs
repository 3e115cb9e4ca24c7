//! Axum router and all HTTP handlers for kds-display.
//!
//! `build_router` is the single entry point; `main.rs` calls it and
//! attaches middleware layers. All handlers are `pub(crate)` so the
//! scenario tests in `tests/` can compose the router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::info;

use kds_core::{ItemAction, OrderBy, OrderQuery, OrderStatus};
use kds_db::StoreError;

use crate::{
    api_types::{
        CreateOrderRequest, CreateOrderResponse, ErrorResponse, HealthResponse,
        ItemUpdateResponse, OrderStatusResponse,
    },
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/orders", get(list_orders).post(create_order))
        .route("/v1/orders/:order_ref/:action", post(set_order_status))
        .route("/v1/items/:item_id/:action", post(set_item_status))
        .route("/v1/stream", get(stream))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn store_error_response(err: StoreError) -> Response {
    let code = match &err {
        StoreError::Validation(_) => StatusCode::BAD_REQUEST,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Db(_) | StoreError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        code,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn bad_request(msg: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: msg })).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/orders
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    status: Option<String>,
    status2: Option<String>,
    order_by: Option<String>,
}

fn parse_list_query(q: &ListQuery) -> Result<OrderQuery, String> {
    // `status=all` and an absent status both mean unfiltered.
    let status = q
        .status
        .as_deref()
        .filter(|s| *s != "all")
        .map(OrderStatus::parse)
        .transpose()
        .map_err(|e| e.to_string())?;
    let status2 = q
        .status2
        .as_deref()
        .map(OrderStatus::parse)
        .transpose()
        .map_err(|e| e.to_string())?;

    let mut query = match (status, status2) {
        (Some(a), Some(b)) => OrderQuery::by_statuses(a, b),
        (Some(a), None) => OrderQuery::by_status(a),
        (None, None) => OrderQuery::all_recent_first(),
        (None, Some(_)) => return Err("status2 requires status".to_string()),
    };

    // An explicit order_by always means newest-first on that column; only
    // the absent/default case sorts ascending.
    if let Some(token) = q.order_by.as_deref() {
        query.order_by = match token {
            "id" => OrderBy::IdDesc,
            "updated_at" => OrderBy::UpdatedAtDesc,
            "created_at" => OrderBy::CreatedAtDesc,
            other => return Err(format!("unknown order_by: {other}")),
        };
    }

    Ok(query)
}

pub(crate) async fn list_orders(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> Response {
    let query = match parse_list_query(&q) {
        Ok(query) => query,
        Err(msg) => return bad_request(msg),
    };

    match st.store.fetch_orders(query).await {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(e) => store_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/orders
// ---------------------------------------------------------------------------

pub(crate) async fn create_order(
    State(st): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Response {
    match st.store.create_order(req.into()).await {
        Ok(order_id) => {
            info!(order_id, "order created");
            (StatusCode::CREATED, Json(CreateOrderResponse { order_id })).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/orders/:order_ref/:action
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct OrderActionQuery {
    /// Suppress the item-quantity cascade that normally accompanies an
    /// order-level status change.
    #[serde(default)]
    skip_item_update: bool,
}

/// Order actions are `mark-<status>` tokens, e.g. `mark-ready`.
fn parse_order_action(action: &str) -> Option<OrderStatus> {
    let status = action.strip_prefix("mark-")?;
    OrderStatus::parse(status).ok()
}

pub(crate) async fn set_order_status(
    State(st): State<Arc<AppState>>,
    Path((order_ref, action)): Path<(i64, String)>,
    Query(q): Query<OrderActionQuery>,
) -> Response {
    let Some(status) = parse_order_action(&action) else {
        return bad_request(format!("unknown order action: {action}"));
    };

    match st
        .store
        .set_order_status(order_ref, status, q.skip_item_update)
        .await
    {
        Ok(update) => {
            info!(order_id = update.order_id, status = %update.status, "order status set");
            (
                StatusCode::OK,
                Json(OrderStatusResponse {
                    order_id: update.order_id,
                    status: update.status,
                }),
            )
                .into_response()
        }
        Err(e) => store_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/items/:item_id/:action
// ---------------------------------------------------------------------------

pub(crate) async fn set_item_status(
    State(st): State<Arc<AppState>>,
    Path((item_id, action)): Path<(i64, String)>,
) -> Response {
    let action = match ItemAction::parse(&action) {
        Ok(action) => action,
        Err(e) => return bad_request(e.to_string()),
    };

    match st.store.set_item_status(item_id, action).await {
        Ok(update) => (
            StatusCode::OK,
            Json(ItemUpdateResponse {
                item: update.item,
                order_id: update.order_id,
                order_status: update.order_status,
            }),
        )
            .into_response(),
        Err(e) => store_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

/// One SSE stream per display. Opens with a `connected` event so clients
/// can distinguish an established channel from a silent one, then relays
/// every store change as a `kds_update` event.
pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    st.ensure_listener();
    let handle = st.broadcaster.attach();

    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let connected = stream::once(async {
        Ok::<_, Infallible>(Event::default().event("connected").data("{}"))
    });
    let updates = stream::unfold(handle, |mut handle| async move {
        let event = handle.recv().await?;
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
        Some((
            Ok::<_, Infallible>(Event::default().event("kds_update").data(data)),
            handle,
        ))
    });

    (
        headers,
        Sse::new(connected.chain(updates)).keep_alive(KeepAlive::new()),
    )
        .into_response()
}
