//! Binary messages and generated stubs for the `metrics.Metrics` service.

use crate::domain::errors::{MetricsError, MetricsResult};
use crate::domain::metric::{Metric, MetricKind, MetricQuery, MetricValue};

include!(concat!(env!("OUT_DIR"), "/metrics.Metrics.rs"));

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum MetricType {
    Gauge = 0,
    Counter = 1,
}

impl From<MetricKind> for MetricType {
    fn from(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Gauge => MetricType::Gauge,
            MetricKind::Counter => MetricType::Counter,
        }
    }
}

impl From<MetricType> for MetricKind {
    fn from(kind: MetricType) -> Self {
        match kind {
            MetricType::Gauge => MetricKind::Gauge,
            MetricType::Counter => MetricKind::Counter,
        }
    }
}

fn kind_from_wire(raw: i32) -> MetricsResult<MetricKind> {
    MetricType::try_from(raw)
        .map(MetricKind::from)
        .map_err(|_| MetricsError::validation(format!("wrong metric type: {}", raw)))
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MetricProto {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(enumeration = "MetricType", tag = "2")]
    pub mtype: i32,
    #[prost(int64, tag = "3")]
    pub delta: i64,
    #[prost(double, tag = "4")]
    pub value: f64,
    #[prost(string, tag = "5")]
    pub hash: String,
}

impl TryFrom<MetricProto> for Metric {
    type Error = MetricsError;

    fn try_from(proto: MetricProto) -> Result<Self, Self::Error> {
        if proto.id.is_empty() {
            return Err(MetricsError::validation("metric id is empty"));
        }
        let value = match kind_from_wire(proto.mtype)? {
            MetricKind::Gauge => MetricValue::finite_gauge(proto.value)?,
            MetricKind::Counter => MetricValue::Counter(proto.delta),
        };
        Ok(Metric {
            id: proto.id,
            value,
            hash: Some(proto.hash).filter(|h| !h.is_empty()),
        })
    }
}

impl From<Metric> for MetricProto {
    fn from(metric: Metric) -> Self {
        let mtype = MetricType::from(metric.kind()) as i32;
        let (delta, value) = match metric.value {
            MetricValue::Gauge(v) => (0, v),
            MetricValue::Counter(d) => (d, 0.0),
        };
        MetricProto {
            id: metric.id,
            mtype,
            delta,
            value,
            hash: metric.hash.unwrap_or_default(),
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MetricQueryProto {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(enumeration = "MetricType", tag = "2")]
    pub mtype: i32,
}

impl TryFrom<MetricQueryProto> for MetricQuery {
    type Error = MetricsError;

    fn try_from(proto: MetricQueryProto) -> Result<Self, Self::Error> {
        Ok(MetricQuery {
            kind: kind_from_wire(proto.mtype)?,
            id: proto.id,
        })
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetMetricsRequest {
    #[prost(message, repeated, tag = "1")]
    pub metrics: Vec<MetricProto>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetMetricsResponse {
    #[prost(string, tag = "1")]
    pub answer: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetMetricsRequest {
    #[prost(message, repeated, tag = "1")]
    pub queries: Vec<MetricQueryProto>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetMetricsResponse {
    #[prost(message, repeated, tag = "1")]
    pub metrics: Vec<MetricProto>,
}
