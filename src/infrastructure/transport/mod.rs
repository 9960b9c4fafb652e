//! Agent-side transports
//!
//! Both sinks are fire-once: a failed request is reported to the caller and
//! never retried, because replaying a counter delta would double-count it.

pub mod http_sink;
pub mod rpc_sink;

pub use http_sink::HttpSink;
pub use rpc_sink::RpcSink;
