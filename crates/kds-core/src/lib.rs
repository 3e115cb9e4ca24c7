//! kds-core
//!
//! Pure domain logic for the kitchen display system:
//! - Order / item model and the quantity invariants
//! - Status derivation (item + order) with hysteresis
//! - Item-level toggle actions and order-level cascades
//! - Read-query descriptions consumed by the store adapter
//!
//! Deterministic, pure logic. No IO. No async. The same derivation runs
//! client-side (optimistic display) and server-side (authoritative
//! transition after a write); keeping it in one crate is what makes the
//! two paths provably agree.

mod model;
mod query;
mod reconcile;
mod status;

pub use model::*;
pub use query::*;
pub use reconcile::*;
pub use status::*;
