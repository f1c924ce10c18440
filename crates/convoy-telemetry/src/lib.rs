//! Logging initialization and in-memory metrics for the convoy services.

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{MetricsRegistry, MetricsSnapshot};
