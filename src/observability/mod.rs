//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor, workers and sessions produce:
//!     → logging.rs (structured log events, session and worker spans)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Metrics go through the `metrics` facade; without an installed recorder
//!   every update is a no-op, so tests need no setup
//! - Log level from the environment first, then config

pub mod logging;
pub mod metrics;

pub use self::logging::init_logging;
pub use self::metrics::init_metrics;
