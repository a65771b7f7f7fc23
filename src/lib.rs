//! Server-side rendering front end for single-page applications.
//!
//! Serves rendered HTML pages in one of two modes: development (template
//! transformed and server entry reloaded on every request) or production
//! (precompiled client assets served from disk, server entry imported once).

pub mod backend;
pub mod config;
pub mod dev;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod render;

pub use config::{Mode, SsrConfig};
pub use http::HttpServer;
pub use lifecycle::{bootstrap, bootstrap_with_loader, Shutdown, SsrRuntime};
