//! Development-time live transformer.
//!
//! # Data Flow
//! ```text
//! Request → LiveTransformer::middleware
//!     → dev client endpoints / public files / project files
//!     → fallthrough (render pipeline)
//!
//! Render pipeline → transform_index_html (inject dev client)
//!                 → ssr_load_module (fresh server entry every call)
//!
//! Error path → ssr_fix_stacktrace (source id + code frame)
//! ```
//!
//! # Design Decisions
//! - Runs in middleware mode only; it never binds a listener of its own
//! - Shared across concurrent requests, so implementations are `Send + Sync`

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::backend::Fallthrough;
use crate::render::entry::ServerEntry;
use crate::render::error::RenderError;

pub mod code_frame;
pub mod server;

pub use server::{DevServer, DevServerError, DevServerOptions};

/// Collaborator that reflects source edits without a restart.
pub trait LiveTransformer: Send + Sync {
    /// Serve development assets or call `fallthrough`.
    fn middleware(
        &self,
        request: Request<Body>,
        fallthrough: Fallthrough,
    ) -> BoxFuture<'static, Response>;

    /// Derive the per-request template (e.g. inject dev-only scripts).
    fn transform_index_html<'a>(
        &'a self,
        url: &'a str,
        html: &'a str,
    ) -> BoxFuture<'a, Result<String, RenderError>>;

    /// Load the module behind `specifier`, bypassing any cache.
    fn ssr_load_module<'a>(
        &'a self,
        specifier: &'a str,
    ) -> BoxFuture<'a, Result<Arc<dyn ServerEntry>, RenderError>>;

    /// Rewrite the error to point at original source positions.
    fn ssr_fix_stacktrace(&self, error: &mut RenderError);
}
