//! Render pipeline: fall-through request to response.
//!
//! # Data Flow
//! ```text
//! fallthrough(request)
//!     → resolver.resolve(url)          (server entry + effective template)
//!     → RenderContext::from_parts
//!     → entry.render(url, context)
//!     → Redirect  → 302 Location
//!       Rendered  → state script + markup injected → 200 text/html
//!     → any error → ErrorFormatter (500)
//! ```
//!
//! # Design Decisions
//! - Exactly one response per fall-through request, whatever fails
//! - Errors never leave the request; nothing is retried

use std::time::Instant;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::http::request::RequestIdExt;
use crate::http::response;
use crate::lifecycle::startup::SsrRuntime;
use crate::observability::metrics;
use crate::render::context::{path_and_query, RenderContext};
use crate::render::entry::RenderResult;
use crate::render::error::{RenderError, Stage};
use crate::render::resolver::Resolved;
use crate::render::template;

/// How a render-phase request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Rendered,
    Redirected,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Rendered => "rendered",
            Outcome::Redirected => "redirected",
            Outcome::Failed => "failed",
        }
    }
}

/// Render the page for a request that no asset answered.
pub async fn render_page(runtime: &SsrRuntime, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, _body) = request.into_parts();
    let request_id = parts.request_id().to_string();
    let url = path_and_query(&parts.uri);

    let (response, outcome) = match render(runtime, &url, parts).await {
        Ok(done) => done,
        Err(error) => (
            runtime.errors.respond(error, &request_id),
            Outcome::Failed,
        ),
    };

    tracing::debug!(
        request_id = %request_id,
        url = %url,
        outcome = outcome.as_str(),
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Render finished"
    );
    metrics::record_render(runtime.mode, outcome.as_str(), start);
    response
}

async fn render(
    runtime: &SsrRuntime,
    url: &str,
    parts: axum::http::request::Parts,
) -> Result<(Response, Outcome), RenderError> {
    let Resolved { entry, template: page } = runtime.resolver.resolve(url, &runtime.template).await?;
    let context = RenderContext::from_parts(parts);
    let output = entry.render(url, context).await?;

    match output.into_result() {
        RenderResult::Redirect { location } => {
            Ok((response::redirect(&location)?, Outcome::Redirected))
        }
        RenderResult::Rendered { markup, state } => {
            let state = template::serialize_state(&state)
                .map_err(|e| RenderError::wrap(Stage::Compose, e))?;
            let document = template::inject(&page, &template::state_script(&state), &markup)?;
            Ok((response::html(document), Outcome::Rendered))
        }
    }
}
