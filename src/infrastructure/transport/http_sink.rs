use crate::domain::metric::Metric;
use crate::domain::ports::MetricsSink;
use crate::infrastructure::core::HttpClientFactory;
use crate::infrastructure::core::http_client_factory::build_url_with_segments;
use crate::infrastructure::core::net::REAL_IP_HEADER;
use crate::infrastructure::crypto::MessageEncryptor;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use reqwest::Client;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use std::io::Write;
use tracing::{debug, warn};
use url::Url;

/// Pushes metrics over HTTP.
///
/// Each flush sends every metric twice (positional and JSON form) and then the
/// whole batch once, so a server that only speaks one of the forms still gets
/// the data.
pub struct HttpSink {
    client: Client,
    base_url: Url,
    encryptor: Option<MessageEncryptor>,
    real_ip: String,
}

impl HttpSink {
    pub fn new(base_url: &str, encryptor: Option<MessageEncryptor>, real_ip: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(base_url).with_context(|| format!("Invalid server address {}", base_url))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("Server address {} cannot carry a path", base_url));
        }
        Ok(Self {
            client: HttpClientFactory::create_client(),
            base_url,
            encryptor,
            real_ip: real_ip.into(),
        })
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Encrypt (when a public key is set), then gzip.
    fn encode_body(&self, json: Vec<u8>) -> Result<Vec<u8>> {
        let payload = match &self.encryptor {
            Some(encryptor) => encryptor.encrypt(&json)?,
            None => json,
        };
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload)?;
        Ok(encoder.finish()?)
    }

    async fn post(&self, url: Url, json: Option<Vec<u8>>) -> Result<()> {
        let mut request = self
            .client
            .post(url.clone())
            .header(REAL_IP_HEADER, self.real_ip.as_str());

        if let Some(json) = json {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .header(CONTENT_ENCODING, "gzip")
                .body(self.encode_body(json)?);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("POST {} returned {}: {}", url, status, body.trim());
        }
        Ok(())
    }

    async fn send_one(&self, metric: &Metric) -> Result<()> {
        let legacy = build_url_with_segments(
            &self.base_url,
            [
                "update",
                metric.kind().as_str(),
                metric.id.as_str(),
                metric.value.render().as_str(),
            ],
        );
        self.post(legacy, None).await?;

        let structured = build_url_with_segments(&self.base_url, ["update", ""]);
        self.post(structured, Some(serde_json::to_vec(metric)?)).await
    }
}

#[async_trait]
impl MetricsSink for HttpSink {
    async fn send_batch(&self, metrics: &[Metric]) -> Result<()> {
        let mut failures = 0usize;
        let mut last_error = None;

        for metric in metrics {
            if let Err(e) = self.send_one(metric).await {
                debug!(id = %metric.id, error = %e, "Single update failed");
                failures += 1;
                last_error = Some(e);
            }
        }

        let batch_url = build_url_with_segments(&self.base_url, ["updates", ""]);
        if let Err(e) = self.post(batch_url, Some(serde_json::to_vec(metrics)?)).await {
            warn!(error = %e, "Batch update failed");
            failures += 1;
            last_error = Some(e);
        }

        match last_error {
            Some(e) => Err(e.context(format!(
                "{} of {} requests to {} failed",
                failures,
                metrics.len() * 2 + 1,
                self.base_url
            ))),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
