//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! HTTP spans come from tower_http::trace in http::server.
//! ```
//!
//! # Design Decisions
//! - Request ID flows through render-phase log events
//! - Metrics are cheap (no-ops without a recorder)

pub mod logging;
pub mod metrics;
