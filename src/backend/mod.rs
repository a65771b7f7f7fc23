//! Asset backends.
//!
//! # Data Flow
//! ```text
//! Request
//!     → Backend::intercept
//!         dev.rs  (dev server middleware: client endpoints, public/, root files)
//!         prod.rs (static files under dist/client)
//!     → answered directly, or
//!     → fallthrough service (render pipeline)
//! ```
//!
//! # Design Decisions
//! - Exactly one backend exists per process, chosen at bootstrap
//! - The fallthrough is a service so the static-file layer can call it as
//!   its "not found" handler
//! - Directory index files are never served; `/` always falls through

use std::convert::Infallible;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;
use tower::util::BoxCloneService;

use crate::config::Mode;

pub mod dev;
pub mod prod;

pub use dev::DevBackend;
pub use prod::StaticAssets;

/// Continuation invoked when the asset layer does not answer a request.
pub type Fallthrough = BoxCloneService<Request<Body>, Response, Infallible>;

/// Intercept-or-fallthrough asset layer.
pub trait Backend: Send + Sync {
    fn mode(&self) -> Mode;

    /// Answer `request` directly or hand it to `fallthrough`, exactly once.
    fn intercept(
        &self,
        request: Request<Body>,
        fallthrough: Fallthrough,
    ) -> BoxFuture<'static, Response>;
}
