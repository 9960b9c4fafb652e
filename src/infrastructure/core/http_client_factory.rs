use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Fixed per-request deadline for agent → server calls
pub const AGENT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Creates the agent's HTTP client.
    ///
    /// No retry middleware: a retried counter post could be applied twice.
    pub fn create_client() -> Client {
        Self::create_client_with_timeout(AGENT_REQUEST_TIMEOUT)
    }

    pub fn create_client_with_timeout(timeout: Duration) -> Client {
        Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new())
    }
}

/// Append percent-encoded path segments to `base`.
///
/// `base` must be able to carry a path; a `mailto:`-style URL is returned
/// unchanged.
pub fn build_url_with_segments<I>(base: &Url, segments: I) -> Url
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
