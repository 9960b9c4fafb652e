//! Collector agent
//!
//! The agent samples host gauges on one cadence and pushes its accumulated
//! state to the server on another. [`MetricsCollector`] owns the state,
//! [`Transmitter`] owns delivery.

pub mod collector;
pub mod transmitter;

pub use collector::{MetricsCollector, POLL_COUNT};
pub use transmitter::{FlushReport, Transmitter};
