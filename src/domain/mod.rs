// Metric value type and signing
pub mod metric;

// Storage engine trait
pub mod repositories;

// Outbound service traits
pub mod ports;

// Domain-specific error types
pub mod errors;
