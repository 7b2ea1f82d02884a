//! Single-use access key lifecycle
//!
//! Keys let a headless renderer log in as a user for exactly one page
//! fetch. A key is scoped to (script, user, instance), expires after a
//! configured TTL and is destroyed atomically when it is exchanged for a
//! session.

mod manager;
mod store;

pub use manager::*;
pub use store::*;

/// Scope identifier stored with every key issued by this service
pub const KEY_SCOPE: &str = "pdfpages";
