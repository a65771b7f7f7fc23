//! Render-phase failure reporting.
//!
//! # Responsibilities
//! - Log every render-phase error
//! - Development: rewrite the error through the live transformer and
//!   render a diagnostic page
//! - Production: answer with an opaque `Server Error`
//!
//! # Design Decisions
//! - Every diagnostic field is optional; missing blocks are omitted rather
//!   than failing while reporting a failure
//! - All error text is HTML-escaped before it reaches the page

use std::fmt::Write as _;
use std::sync::Arc;

use axum::response::Response;

use crate::dev::LiveTransformer;
use crate::http::response;
use crate::render::error::RenderError;

const PAGE_STYLE: &str = "\
html { font-size: 14px; }
main { max-width: 800px; margin: 5rem auto; border: 3px solid red; border-radius: 12px; padding: 12px; }
pre { white-space: pre-line; }
code { display: block; margin: 6px auto; }";

/// Turns render errors into responses for the active mode.
pub enum ErrorFormatter {
    Development(Arc<dyn LiveTransformer>),
    Production,
}

impl ErrorFormatter {
    /// Log `error` and build the 500 response.
    pub fn respond(&self, mut error: RenderError, request_id: &str) -> Response {
        match self {
            ErrorFormatter::Development(transformer) => {
                transformer.ssr_fix_stacktrace(&mut error);
                log_error(&error, request_id);
                response::diagnostic(diagnostic_page(&error))
            }
            ErrorFormatter::Production => {
                log_error(&error, request_id);
                response::server_error()
            }
        }
    }
}

fn log_error(error: &RenderError, request_id: &str) {
    tracing::error!(
        request_id = %request_id,
        stage = %error.stage,
        id = error.id.as_deref().unwrap_or("n/a"),
        frame = error.frame.as_deref(),
        error = %error,
        "Render failed"
    );
}

/// Escape text for inclusion in HTML element content.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Each line wrapped in its own `<code>` element.
fn code_lines(text: &str) -> String {
    text.split('\n')
        .map(|line| format!("<code>{}</code>", escape_html(line)))
        .collect()
}

fn push_block(page: &mut String, title: &str, text: Option<&str>) {
    if let Some(text) = text {
        let _ = write!(
            page,
            "<div>\n<p>{title}</p>\n<pre>\n{}\n</pre>\n</div>\n",
            code_lines(text)
        );
    }
}

/// The development diagnostic page.
pub fn diagnostic_page(error: &RenderError) -> String {
    let mut page = format!("<style>\n{PAGE_STYLE}\n</style>\n<main>\n");
    let _ = writeln!(
        page,
        "<p style=\"color: red;\">Error at file: {}</p>",
        escape_html(error.id.as_deref().unwrap_or("n/a"))
    );
    let _ = writeln!(page, "<p>{}</p>", escape_html(&error.message));
    push_block(&mut page, "Frame at:", error.frame.as_deref());
    push_block(&mut page, "Output:", error.plugin_code.as_deref());
    page.push_str("</main>\n");
    page
}
