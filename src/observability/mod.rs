//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Accept loop, dispatcher, connections produce:
//!     → logging.rs (structured log events, connection_id on every line)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
