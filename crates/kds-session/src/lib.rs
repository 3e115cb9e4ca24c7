//! kds-session
//!
//! Client-side logic for one display: the optimistic update coordinator
//! (in-flight counter, pending-refresh flag, debounced refresh) and the
//! display session that owns a local, always-subordinate copy of the
//! orders for its viewing mode.

mod coordinator;
mod session;

pub use coordinator::{UpdateCoordinator, DEBOUNCE_QUIET_PERIOD};
pub use session::{DisplaySession, Mode};
