//! Response composition.
//!
//! # Responsibilities
//! - Build the redirect, page and error responses of the render phase
//!
//! # Design Decisions
//! - Bodies are fully buffered; render output is a complete string anyway
//! - An invalid redirect location is a render error, not a panic

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::render::error::{RenderError, Stage};

/// Content type of rendered pages.
pub const HTML_CONTENT_TYPE: &str = "text/html; utf-8";

/// Opaque production error body.
pub const SERVER_ERROR_BODY: &str = "Server Error";

/// `302` to `location` with a `Location:<url>` body.
pub fn redirect(location: &str) -> Result<Response, RenderError> {
    let value = HeaderValue::from_str(location).map_err(|e| {
        RenderError::new(
            Stage::Compose,
            format!("invalid redirect location {location:?}: {e}"),
        )
    })?;
    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, value)],
        format!("Location:{location}"),
    )
        .into_response())
}

/// `200` with a rendered document.
pub fn html(document: String) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE))],
        document,
    )
        .into_response()
}

/// `500` with a development diagnostic page.
pub fn diagnostic(page: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE))],
        page,
    )
        .into_response()
}

/// `500` without any detail.
pub fn server_error() -> Response {
    let mut response = Response::new(Body::from(SERVER_ERROR_BODY));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_response() {
        let response = redirect("/login").unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn test_redirect_rejects_header_breaking_location() {
        let err = redirect("/a\r\nSet-Cookie: x=1").unwrap_err();
        assert_eq!(err.stage, Stage::Compose);
    }

    #[test]
    fn test_html_response_content_type() {
        let response = html("<p/>".into());
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], HTML_CONTENT_TYPE);
    }

    #[test]
    fn test_server_error_has_no_content_type_override() {
        let response = server_error();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
    }
}
