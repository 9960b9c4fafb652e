// Axum router, handlers and middleware
pub mod http;

// Tonic service and caller filter
pub mod rpc;
