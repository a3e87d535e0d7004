//! Per-request authentication helpers (§4.1, §4.5). Each endpoint calls
//! these directly with its own role and mandatory-header set rather than
//! going through one blanket layer, since the mandatory set genuinely
//! varies per route.

pub mod auth;

pub use auth::{authenticate, verify_body_digest};
