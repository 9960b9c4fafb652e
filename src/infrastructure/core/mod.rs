pub mod http_client_factory;
pub mod net;
pub mod retry;

pub use http_client_factory::HttpClientFactory;
pub use retry::RetryPolicy;
