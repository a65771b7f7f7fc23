//! Development backend: delegates to the live transformer's middleware.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;

use crate::backend::{Backend, Fallthrough};
use crate::config::Mode;
use crate::dev::LiveTransformer;

pub struct DevBackend {
    transformer: Arc<dyn LiveTransformer>,
}

impl DevBackend {
    pub fn new(transformer: Arc<dyn LiveTransformer>) -> Self {
        Self { transformer }
    }
}

impl Backend for DevBackend {
    fn mode(&self) -> Mode {
        Mode::Development
    }

    fn intercept(
        &self,
        request: Request<Body>,
        fallthrough: Fallthrough,
    ) -> BoxFuture<'static, Response> {
        self.transformer.middleware(request, fallthrough)
    }
}
