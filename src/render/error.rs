//! Render-phase error type.
//!
//! A `RenderError` carries the optional diagnostic fields the development
//! error page knows how to display. None of them are guaranteed to be set:
//! a generic failure only has a message and a stage.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Step of the render pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Transforming the HTML template (dev only).
    Transform,
    /// Loading or evaluating the server entry.
    Load,
    /// Running the server entry's render function.
    Render,
    /// Turning the render result into a response.
    Compose,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Transform => "transform",
            Stage::Load => "load",
            Stage::Render => "render",
            Stage::Compose => "compose",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position in an original source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    #[serde(default = "first_column")]
    pub column: u32,
}

fn first_column() -> u32 {
    1
}

/// Error raised anywhere between fall-through and the response write.
#[derive(Debug, Error)]
#[error("{stage} failed: {message}")]
pub struct RenderError {
    pub stage: Stage,
    pub message: String,
    /// Source file the error originated in.
    pub id: Option<String>,
    /// Highlighted excerpt of the original source.
    pub frame: Option<String>,
    /// Compiled output around the failure.
    pub plugin_code: Option<String>,
    pub loc: Option<SourceLocation>,
    #[source]
    source: Option<BoxError>,
}

impl RenderError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            id: None,
            frame: None,
            plugin_code: None,
            loc: None,
            source: None,
        }
    }

    /// Wrap an underlying error, using its display text as the message.
    pub fn wrap<E>(stage: Stage, error: E) -> Self
    where
        E: Into<BoxError>,
    {
        let error = error.into();
        let mut wrapped = Self::new(stage, error.to_string());
        wrapped.source = Some(error);
        wrapped
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.frame = Some(frame.into());
        self
    }

    pub fn with_plugin_code(mut self, code: impl Into<String>) -> Self {
        self.plugin_code = Some(code.into());
        self
    }

    pub fn with_loc(mut self, loc: SourceLocation) -> Self {
        self.loc = Some(loc);
        self
    }
}

/// Error shape reported by a server entry across the FFI boundary.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub frame: Option<String>,
    #[serde(default)]
    pub plugin_code: Option<String>,
    #[serde(default)]
    pub loc: Option<SourceLocation>,
}

impl From<ErrorPayload> for RenderError {
    fn from(payload: ErrorPayload) -> Self {
        let mut error = RenderError::new(Stage::Render, payload.message);
        error.id = payload.id;
        error.frame = payload.frame;
        error.plugin_code = payload.plugin_code;
        error.loc = payload.loc;
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_includes_stage() {
        let err = RenderError::new(Stage::Load, "module not found");
        assert_eq!(err.to_string(), "load failed: module not found");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_wrap_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = RenderError::wrap(Stage::Transform, io);
        assert_eq!(err.message, "gone");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_payload_conversion() {
        let payload: ErrorPayload = serde_json::from_str(
            r#"{"message":"boom","pluginCode":"x()","loc":{"file":"src/app.rs","line":3}}"#,
        )
        .unwrap();
        let err = RenderError::from(payload);
        assert_eq!(err.stage, Stage::Render);
        assert_eq!(err.plugin_code.as_deref(), Some("x()"));
        assert_eq!(err.loc.as_ref().map(|l| l.column), Some(1));
        assert!(err.frame.is_none());
    }
}
