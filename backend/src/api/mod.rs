//! HTTP API module.
//!
//! Server, request/response types, pagination and the import log stream.

pub mod logs;
pub mod pagination;
pub mod server;
pub mod types;

pub use logs::*;
pub use pagination::Page;
pub use server::{router, start_server, AppState};
pub use types::*;
