//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Handlers, upstream client, persister produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! Every log line about a request carries its `request_id`, which is also
//! the name of the request's workspace directory.

pub mod logging;
pub mod metrics;
