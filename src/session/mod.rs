//! Session and authentication lifecycle
//!
//! One `SessionManager` instance serves all workers in a run. Sessions are
//! read-only once acquired; discovery of expiry goes back through
//! `invalidate` + `acquire` so at most one re-login is ever in flight.

mod manager;

pub use manager::{Credentials, Session, SessionManager};
