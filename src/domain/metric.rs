//! Metric value type
//!
//! A metric is identified by the pair `(id, kind)`. Gauges carry an absolute
//! `f64` that is overwritten on every upsert; counters carry an `i64` delta that
//! accumulates. The tagged [`MetricValue`] makes it impossible to hold both.
//!
//! # Wire form
//!
//! ```json
//! {"id":"Alloc","type":"gauge","value":1024.0,"hash":"9f86d0..."}
//! {"id":"PollCount","type":"counter","delta":5}
//! ```
//!
//! # Signing
//!
//! When a shared secret is configured, `hash` is the hex HMAC-SHA256 of
//! `"{id}:gauge:{value:.6}"` or `"{id}:counter:{delta}"`.

use crate::domain::errors::{MetricsError, MetricsResult};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;

type HmacSha256 = Hmac<Sha256>;

/// Metric type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gauge" => Ok(MetricKind::Gauge),
            "counter" => Ok(MetricKind::Counter),
            other => Err(MetricsError::validation(format!(
                "wrong metric type: {}",
                other
            ))),
        }
    }
}

impl Serialize for MetricKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MetricKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The measured quantity, tagged by kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Point-in-time value, last write wins
    Gauge(f64),
    /// Increment, accumulated by storage
    Counter(i64),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Counter(_) => MetricKind::Counter,
        }
    }

    /// Plain-text rendering used by the positional HTTP endpoints.
    pub fn render(&self) -> String {
        match self {
            MetricValue::Gauge(v) => v.to_string(),
            MetricValue::Counter(d) => d.to_string(),
        }
    }

    /// Gauge value that every backend can store and read back.
    pub fn finite_gauge(value: f64) -> MetricsResult<Self> {
        if value.is_finite() {
            Ok(MetricValue::Gauge(value))
        } else {
            Err(MetricsError::validation(format!("gauge value {value} is not finite")))
        }
    }

    /// Parse a positional path value for the given kind.
    pub fn parse(kind: MetricKind, raw: &str) -> MetricsResult<Self> {
        match kind {
            MetricKind::Gauge => raw
                .parse::<f64>()
                .map_err(|e| MetricsError::validation(format!("invalid gauge value {raw:?}: {e}")))
                .and_then(MetricValue::finite_gauge),
            MetricKind::Counter => raw
                .parse::<i64>()
                .map(MetricValue::Counter)
                .map_err(|e| {
                    MetricsError::validation(format!("invalid counter value {raw:?}: {e}"))
                }),
        }
    }
}

/// A single named measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MetricWire", into = "MetricWire")]
pub struct Metric {
    pub id: String,
    pub value: MetricValue,
    pub hash: Option<String>,
}

impl Metric {
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            value: MetricValue::Gauge(value),
            hash: None,
        }
    }

    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            value: MetricValue::Counter(delta),
            hash: None,
        }
    }

    /// Build a metric from the positional `/update/{type}/{name}/{value}` form.
    pub fn parse_legacy(kind: MetricKind, name: &str, raw: &str) -> MetricsResult<Self> {
        if name.is_empty() {
            return Err(MetricsError::validation("metric id is empty"));
        }
        Ok(Self {
            id: name.to_string(),
            value: MetricValue::parse(kind, raw)?,
            hash: None,
        })
    }

    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }

    /// Identity key; metrics with equal ids but different kinds are distinct.
    pub fn key(&self) -> (&str, MetricKind) {
        (&self.id, self.kind())
    }

    /// Canonical representation covered by the signature.
    pub fn canonical(&self) -> String {
        match self.value {
            MetricValue::Gauge(v) => format!("{}:gauge:{:.6}", self.id, v),
            MetricValue::Counter(d) => format!("{}:counter:{}", self.id, d),
        }
    }

    fn mac(&self, secret: &str) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(self.canonical().as_bytes());
        mac
    }

    /// Hex-encoded HMAC-SHA256 of the canonical representation.
    pub fn compute_hash(&self, secret: &str) -> String {
        hex::encode(self.mac(secret).finalize().into_bytes())
    }

    pub fn sign(&mut self, secret: &str) {
        self.hash = Some(self.compute_hash(secret));
    }

    pub fn signed(mut self, secret: &str) -> Self {
        self.sign(secret);
        self
    }

    /// Constant-time comparison of the carried hash against a recomputed one.
    pub fn is_authentic(&self, secret: &str) -> bool {
        let Some(hash) = self.hash.as_deref() else {
            return false;
        };
        match hex::decode(hash) {
            Ok(bytes) => self.mac(secret).verify_slice(&bytes).is_ok(),
            Err(_) => false,
        }
    }
}

/// JSON shape shared by every transport
#[derive(Serialize, Deserialize)]
struct MetricWire {
    id: String,
    #[serde(rename = "type")]
    kind: MetricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
}

impl TryFrom<MetricWire> for Metric {
    type Error = MetricsError;

    fn try_from(wire: MetricWire) -> Result<Self, Self::Error> {
        if wire.id.is_empty() {
            return Err(MetricsError::validation("metric id is empty"));
        }

        let value = match wire.kind {
            MetricKind::Gauge => MetricValue::finite_gauge(wire.value.ok_or_else(|| {
                MetricsError::validation(format!("gauge {} has no value", wire.id))
            })?)?,
            MetricKind::Counter => MetricValue::Counter(wire.delta.ok_or_else(|| {
                MetricsError::validation(format!("counter {} has no delta", wire.id))
            })?),
        };

        Ok(Metric {
            id: wire.id,
            value,
            hash: wire.hash.filter(|h| !h.is_empty()),
        })
    }
}

impl From<Metric> for MetricWire {
    fn from(metric: Metric) -> Self {
        let kind = metric.kind();
        let (delta, value) = match metric.value {
            MetricValue::Gauge(v) => (None, Some(v)),
            MetricValue::Counter(d) => (Some(d), None),
        };
        MetricWire {
            id: metric.id,
            kind,
            delta,
            value,
            hash: metric.hash,
        }
    }
}

/// Lookup request body: `{"id": "...", "type": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricQuery {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
}
