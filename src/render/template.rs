//! HTML template store and marker injection.
//!
//! # Responsibilities
//! - Load the base document once at startup
//! - Check that each injection marker appears exactly once
//! - Substitute serialized state and rendered markup per request
//!
//! # Design Decisions
//! - The stored source is an `Arc<str>`; requests share it, never mutate it
//! - Injection is a single pass over the (possibly transformed) template, so
//!   rendered markup containing a marker string is never substituted again

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::render::error::{RenderError, Stage};

/// Replaced with the serialized initial state.
pub const STATE_MARKER: &str = "<!--init-props-->";

/// Replaced with the rendered application markup.
pub const MARKUP_MARKER: &str = "<!--app-html-->";

/// Error type for template loading.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template {} must contain '{marker}' exactly once, found {count}", path.display())]
    Marker {
        path: PathBuf,
        marker: &'static str,
        count: usize,
    },
}

/// The base HTML document.
#[derive(Clone)]
pub struct Template {
    source: Arc<str>,
}

impl Template {
    /// Read and check the template file.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let source = fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, source)
    }

    /// Check an in-memory template. `origin` is only used in error messages.
    pub fn parse(origin: &Path, source: impl Into<String>) -> Result<Self, TemplateError> {
        let source = source.into();
        for marker in [STATE_MARKER, MARKUP_MARKER] {
            let count = source.matches(marker).count();
            if count != 1 {
                return Err(TemplateError::Marker {
                    path: origin.to_path_buf(),
                    marker,
                    count,
                });
            }
        }
        Ok(Self {
            source: Arc::from(source),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Shared handle to the stored source.
    pub fn shared(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("len", &self.source.len())
            .finish()
    }
}

/// Serialize initial state for embedding in a `<script>` element.
///
/// Every `/` is escaped so a string such as `"</script>"` inside the data
/// cannot close the element early. `\/` is a valid JSON escape, so the text
/// still parses back to the same value.
pub fn serialize_state(state: &serde_json::Value) -> Result<String, serde_json::Error> {
    Ok(serde_json::to_string(state)?.replace('/', "\\/"))
}

/// The element substituted for [`STATE_MARKER`].
pub fn state_script(escaped_json: &str) -> String {
    format!(r#"<script id="ssr-data" type="text/json">{escaped_json}</script>"#)
}

/// Substitute both markers in `template`.
pub fn inject(template: &str, state: &str, markup: &str) -> Result<String, RenderError> {
    let find = |marker: &str| {
        template.find(marker).ok_or_else(|| {
            RenderError::new(
                Stage::Compose,
                format!("template is missing the '{marker}' marker"),
            )
        })
    };
    let mut slots = [
        (find(STATE_MARKER)?, STATE_MARKER.len(), state),
        (find(MARKUP_MARKER)?, MARKUP_MARKER.len(), markup),
    ];
    slots.sort_by_key(|(at, _, _)| *at);

    let mut document = String::with_capacity(template.len() + state.len() + markup.len());
    let mut cursor = 0;
    for (at, len, replacement) in slots {
        document.push_str(&template[cursor..at]);
        document.push_str(replacement);
        cursor = at + len;
    }
    document.push_str(&template[cursor..]);
    Ok(document)
}
