//! Server-side rendering subsystem.
//!
//! # Data Flow
//! ```text
//! startup:   template.rs (load once, check markers)
//!
//! request:   resolver.rs  → entry.rs / dylib.rs (server entry)
//!            context.rs   (RenderContext from the request head)
//!            pipeline.rs  (invoke, branch, compose)
//!            error.rs     (RenderError on any failure)
//! ```

pub mod context;
pub mod dylib;
pub mod entry;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod template;

pub use context::{parse_query, ParsedQuery, Query, QueryValue, RenderContext};
pub use dylib::DylibLoader;
pub use entry::{render_fn, ModuleLoader, ModuleRegistry, RenderOutput, RenderResult, ServerEntry};
pub use error::{RenderError, SourceLocation, Stage};
pub use resolver::{DevResolver, ProdResolver, RenderResolver};
pub use template::{Template, TemplateError, MARKUP_MARKER, STATE_MARKER};
