//! `metrics.Metrics` service over tonic
//!
//! Both calls run through the same [`MetricGateway`] as HTTP, labelled as RPC
//! traffic. Caller filtering happens in [`SubnetInterceptor`] on the
//! `x-real-ip` metadata before the service is reached.

use crate::application::gateway::{MetricGateway, Transport};
use crate::domain::errors::{MetricsError, MetricsResult};
use crate::domain::metric::{Metric, MetricQuery};
use crate::infrastructure::core::net::REAL_IP_HEADER;
use crate::infrastructure::rpc::metrics_server::{Metrics, MetricsServer};
use crate::infrastructure::rpc::{
    GetMetricsRequest, GetMetricsResponse, MetricProto, SetMetricsRequest, SetMetricsResponse,
};
use ipnet::IpNet;
use std::net::IpAddr;
use tonic::service::Interceptor;
use tonic::service::interceptor::InterceptedService;
use tonic::{Request, Response, Status};
use tracing::warn;

pub fn status_from(err: MetricsError) -> Status {
    match err {
        MetricsError::NotFound { .. } => Status::not_found(err.to_string()),
        MetricsError::Signature { .. } => Status::data_loss(err.to_string()),
        MetricsError::Validation { .. } => Status::invalid_argument(err.to_string()),
        MetricsError::Storage { .. } | MetricsError::Connect { .. } => Status::unknown(err.to_string()),
    }
}

pub struct MetricsService {
    gateway: MetricGateway,
}

impl MetricsService {
    pub fn new(gateway: MetricGateway) -> Self {
        Self {
            gateway: gateway.via(Transport::Rpc),
        }
    }
}

#[tonic::async_trait]
impl Metrics for MetricsService {
    async fn set_metrics(&self, request: Request<SetMetricsRequest>) -> Result<Response<SetMetricsResponse>, Status> {
        let metrics = request
            .into_inner()
            .metrics
            .into_iter()
            .map(Metric::try_from)
            .collect::<MetricsResult<Vec<_>>>()
            .map_err(status_from)?;

        self.gateway
            .update_batch(metrics)
            .await
            .map_err(status_from)?;

        Ok(Response::new(SetMetricsResponse {
            answer: "ok".to_string(),
        }))
    }

    async fn get_metrics(&self, request: Request<GetMetricsRequest>) -> Result<Response<GetMetricsResponse>, Status> {
        let queries = request
            .into_inner()
            .queries
            .into_iter()
            .map(|q| MetricQuery::try_from(q).map(|q| (q.id, q.kind)))
            .collect::<MetricsResult<Vec<_>>>()
            .map_err(status_from)?;

        let found = self
            .gateway
            .find_many(&queries)
            .await
            .map_err(status_from)?;

        Ok(Response::new(GetMetricsResponse {
            metrics: found.into_iter().map(MetricProto::from).collect(),
        }))
    }
}

/// Admits a call only when its declared address is inside the subnet.
#[derive(Clone, Default)]
pub struct SubnetInterceptor {
    subnet: Option<IpNet>,
}

impl SubnetInterceptor {
    pub fn new(subnet: Option<IpNet>) -> Self {
        Self { subnet }
    }
}

impl Interceptor for SubnetInterceptor {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        let Some(subnet) = self.subnet else {
            return Ok(request);
        };

        let Some(raw) = request.metadata().get(REAL_IP_HEADER) else {
            return Err(Status::unauthenticated("x-real-ip metadata is missing"));
        };
        let ip: IpAddr = raw
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| Status::invalid_argument("x-real-ip is not an IP address"))?;

        if !subnet.contains(&ip) {
            warn!(%ip, "RPC caller outside trusted subnet");
            return Err(Status::permission_denied("caller is not in the trusted subnet"));
        }
        Ok(request)
    }
}

pub fn service(gateway: MetricGateway, trusted_subnet: Option<IpNet>) -> InterceptedService<MetricsServer<MetricsService>, SubnetInterceptor> {
    MetricsServer::with_interceptor(MetricsService::new(gateway), SubnetInterceptor::new(trusted_subnet))
}
