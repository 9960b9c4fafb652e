//! Push-based observability for the metrics server
//!
//! The gateway counts its own traffic in a prometheus registry, and the
//! reporter pushes a JSON snapshot of those counters to stdout on a timer.
//! There is no scrape endpoint: this module only SENDS data.

pub mod metrics;
pub mod reporter;

pub use metrics::GatewayMetrics;
pub use reporter::MetricsReporter;
