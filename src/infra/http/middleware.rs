//! Request tagging and response logging shared by every route.

use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

use super::public::CACHE_STATUS_HEADER;

/// Header carrying the request id in both directions.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_INBOUND_ID_LEN: usize = 64;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub received_at: Instant,
}

impl RequestContext {
    /// Reuse a well-formed id from an upstream proxy, otherwise mint one.
    fn for_request(request: &Request<Body>) -> Self {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|id| is_acceptable_id(id))
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            request_id,
            received_at: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u128 {
        self.received_at.elapsed().as_millis()
    }
}

fn is_acceptable_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_INBOUND_ID_LEN
        && id
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_'))
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::for_request(&request);
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Log every response with its cache outcome; failures also carry the
/// attached [`ErrorReport`], which is consumed here.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let ctx = request.extensions().get::<RequestContext>().cloned();

    let mut response = next.run(request).await;
    let status = response.status();
    let failed = status.is_client_error() || status.is_server_error();
    let report = if failed {
        response.extensions_mut().remove::<ErrorReport>()
    } else {
        None
    };

    let request_id = ctx.as_ref().map_or("", |ctx| ctx.request_id.as_str());
    let elapsed_ms = ctx.as_ref().map_or(0, RequestContext::elapsed_ms);
    let cache = response
        .headers()
        .get(CACHE_STATUS_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("none");

    if !failed {
        debug!(
            target = "resultview::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            cache,
            elapsed_ms,
            request_id,
            "request served",
        );
        return response;
    }

    let (source, messages) = match report {
        Some(report) => (report.source, report.messages),
        None => ("unknown", Vec::new()),
    };
    let detail = messages
        .first()
        .map_or("no diagnostic available", String::as_str);

    if status.is_server_error() {
        error!(
            target = "resultview::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            cache,
            elapsed_ms,
            source,
            detail,
            chain = ?messages,
            request_id,
            "request failed",
        );
    } else {
        warn!(
            target = "resultview::http::response",
            status = status.as_u16(),
            method = %method,
            path = %path,
            elapsed_ms,
            source,
            detail,
            request_id,
            "client request error",
        );
    }

    response
}
