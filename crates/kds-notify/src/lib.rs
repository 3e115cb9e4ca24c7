//! kds-notify
//!
//! At-least-once change-notification fan-out.
//!
//! The authoritative store announces row changes over a Postgres
//! LISTEN/NOTIFY channel; [`spawn_change_listener`] turns that channel into
//! [`UpdateEvent`]s and the [`Broadcaster`] delivers each event to every
//! attached display session. Payloads are refresh triggers only — a
//! consumer must re-fetch authoritative state, never treat the payload as
//! the new state.

mod broadcaster;
mod event;
mod listener;

pub use broadcaster::{Broadcaster, SessionHandle};
pub use event::{ChangeOp, UpdateEvent};
pub use listener::{spawn_change_listener, CHANNEL, RECONNECT_DELAY};
