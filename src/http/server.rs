//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum Router with a single catch-all dispatcher
//! - Wire up middleware (tracing, optional timeout, request ID)
//! - Hand each request to the asset backend with the render pipeline as
//!   its fall-through
//! - Serve with graceful shutdown

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::util::BoxCloneService;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::backend::Fallthrough;
use crate::config::ServerConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::shutdown;
use crate::lifecycle::startup::SsrRuntime;
use crate::render::pipeline;

/// Application state injected into the dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<SsrRuntime>,
}

/// HTTP server for rendered pages and assets.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(runtime: SsrRuntime, config: &ServerConfig) -> Self {
        let state = AppState {
            runtime: Arc::new(runtime),
        };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        let router = Router::new().fallback(dispatch).with_state(state);

        // 0 leaves render calls uncancelled.
        let router = match config.request_timeout_secs {
            0 => router,
            secs => router.layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(secs),
            )),
        };

        router
            .layer(TraceLayer::new_for_http())
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// The configured router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Asset phase; the render phase runs only through the fall-through.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let fallthrough = render_fallthrough(Arc::clone(&state.runtime));
    state.runtime.backend.intercept(request, fallthrough).await
}

fn render_fallthrough(runtime: Arc<SsrRuntime>) -> Fallthrough {
    BoxCloneService::new(tower::service_fn(move |request: Request<Body>| {
        let runtime = Arc::clone(&runtime);
        async move { Ok::<_, Infallible>(pipeline::render_page(&runtime, request).await) }
    }))
}
