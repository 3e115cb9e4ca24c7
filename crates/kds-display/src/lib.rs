//! kds-display
//!
//! HTTP surface of the kitchen display service: order CRUD and status
//! toggles over JSON, plus the SSE change stream that drives every
//! display's refresh loop. Handlers stay thin; the store owns the rules.

pub mod api_types;
pub mod routes;
pub mod state;
