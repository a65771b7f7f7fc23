//! Production backend: precompiled client assets.

use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::{BoxFuture, FutureExt};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::backend::{Backend, Fallthrough};
use crate::config::Mode;

/// Serves files under the client build directory.
#[derive(Debug, Clone)]
pub struct StaticAssets {
    dir: PathBuf,
    files: ServeDir,
}

impl StaticAssets {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let files = ServeDir::new(&dir)
            .append_index_html_on_directories(false)
            .call_fallback_on_method_not_allowed(true);
        Self { dir, files }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Backend for StaticAssets {
    fn mode(&self) -> Mode {
        Mode::Production
    }

    fn intercept(
        &self,
        request: Request<Body>,
        fallthrough: Fallthrough,
    ) -> BoxFuture<'static, Response> {
        let files = self.files.clone().fallback(fallthrough);
        async move {
            match files.oneshot(request).await {
                Ok(response) => response.map(Body::new),
                Err(never) => match never {},
            }
        }
        .boxed()
    }
}
