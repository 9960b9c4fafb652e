//! Request filters that run before any handler.

use crate::infrastructure::core::net::{REAL_IP_HEADER, is_trusted};
use crate::infrastructure::crypto::MessageDecryptor;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use ipnet::IpNet;
use std::sync::Arc;
use tracing::warn;

use super::handlers::ApiError;

/// Upper bound on a buffered request body
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Reject callers whose declared `X-Real-IP` is missing or outside the subnet.
pub async fn require_trusted_subnet(State(subnet): State<IpNet>, req: Request, next: Next) -> Response {
    let declared = req
        .headers()
        .get(REAL_IP_HEADER)
        .and_then(|v| v.to_str().ok());

    if !is_trusted(&subnet, declared) {
        warn!(path = %req.uri().path(), ip = ?declared, "Caller outside trusted subnet");
        return ApiError::new(StatusCode::FORBIDDEN, "caller is not in the trusted subnet")
            .into_response();
    }
    next.run(req).await
}

/// Replace an encrypted body with its plaintext. Empty bodies pass through.
pub async fn decrypt_body(
    State(decryptor): State<Arc<MessageDecryptor>>,
    req: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();
    let cipher = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return ApiError::new(StatusCode::BAD_REQUEST, format!("cannot read body: {}", e))
                .into_response();
        }
    };

    if cipher.is_empty() {
        return next.run(Request::from_parts(parts, Body::empty())).await;
    }

    match decryptor.decrypt(&cipher) {
        Ok(plain) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            next.run(Request::from_parts(parts, Body::from(plain))).await
        }
        Err(e) => {
            warn!(path = %parts.uri.path(), error = %e, "Undecryptable body");
            ApiError::new(StatusCode::NOT_ACCEPTABLE, e.to_string()).into_response()
        }
    }
}
