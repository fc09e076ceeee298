//! Per-client sessions and the gate that decides whether a request may reach the
//! document store. Keep the public surface thin and split implementation across
//! sub-modules.

mod gate;
mod request_context;
mod session;

pub use gate::{complete_login, logout, redirect_if_authenticated, require_authenticated, GateDecision};
pub use request_context::RequestContext;
pub use session::{AuthState, SessionId, SessionManager, SessionState};
