//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, dispatch)
//!     → request.rs (request ID)
//!     → backend (asset phase) → render pipeline (fall-through)
//!     → response.rs / error_page.rs (status, headers, body)
//!     → Send to client
//! ```

pub mod error_page;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
