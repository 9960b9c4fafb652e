//! HTTP surface
//!
//! # Routes
//!
//! | Method | Path | Response |
//! |---|---|---|
//! | GET | `/ping` | 200, or 500 when storage is unreachable |
//! | GET | `/` | HTML table of every metric |
//! | POST | `/value/` | metric JSON for `{"id","type"}` |
//! | GET | `/value/{type}/{name}` | bare value |
//! | POST | `/update/` | post-merge metric JSON |
//! | POST | `/update/{type}/{name}/{value}` | post-merge value as text |
//! | POST | `/updates/` | empty 200 |
//!
//! Layers, outermost first: trusted subnet, response compression, request
//! decompression, body decryption.

pub mod dashboard;
pub mod handlers;
pub mod middleware;

use crate::application::gateway::MetricGateway;
use crate::infrastructure::crypto::MessageDecryptor;
use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use ipnet::IpNet;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;

#[derive(Clone)]
pub struct HttpState {
    pub gateway: MetricGateway,
}

pub fn router(gateway: MetricGateway, decryptor: Option<MessageDecryptor>, trusted_subnet: Option<IpNet>) -> Router {
    let mut app = Router::new()
        .route("/ping", get(handlers::ping))
        .route("/", get(handlers::index))
        .route("/value", post(handlers::value_json))
        .route("/value/", post(handlers::value_json))
        .route("/value/{type}/{name}", get(handlers::value_path))
        .route("/update", post(handlers::update_json))
        .route("/update/", post(handlers::update_json))
        .route("/update/{type}/{name}/{value}", post(handlers::update_path))
        .route("/updates", post(handlers::update_batch))
        .route("/updates/", post(handlers::update_batch))
        .with_state(HttpState { gateway });

    // Last layer added is outermost.
    if let Some(decryptor) = decryptor {
        app = app.layer(from_fn_with_state(Arc::new(decryptor), middleware::decrypt_body));
    }
    app = app
        .layer(RequestDecompressionLayer::new())
        .layer(CompressionLayer::new());
    if let Some(subnet) = trusted_subnet {
        app = app.layer(from_fn_with_state(subnet, middleware::require_trusted_subnet));
    }
    app
}
