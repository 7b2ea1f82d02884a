//! Key-login sessions
//!
//! A session is only ever created by exchanging a single-use access key;
//! there is no interactive login. Sessions are explicit records handed
//! back to the caller, never ambient process state, and terminating one
//! deletes it outright.

mod manager;
mod store;

pub use manager::*;
pub use store::*;

/// Cookie carrying the session id back through the renderer
pub const SESSION_COOKIE: &str = "pdfpages_session";
