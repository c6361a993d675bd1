//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! submitter / tracker / verifier / store produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Tx hash and operation intent id appear as fields, never in messages
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
