//! HTTP API module.
//!
//! Axum server, JSON response types and the SSE log broadcaster.

pub mod server;
pub mod types;
pub mod logs;

pub use server::{router, start_server};
pub use types::*;
pub use logs::*;
