use std::any::Any;
use std::fmt;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use futures::FutureExt;
use lucipedia_core::rate_limit::client_key;
use tracing::{error, info, warn};

use super::AppState;
use super::render;

/// Response header carrying the per-request identifier.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Identifier assigned to every request, stored in request extensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// A fresh random identifier: 32 lowercase hex digits.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{:032x}", rand::random::<u128>()))
    }

    /// The identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn request_id_of(request: &Request) -> String {
    request
        .extensions()
        .get::<RequestId>()
        .map(ToString::to_string)
        .unwrap_or_default()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Key a request by `X-Forwarded-For`, then `X-Real-IP`, then the peer address.
pub fn request_client_key(request: &Request) -> String {
    let headers = request.headers();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    client_key(
        header_str(headers, "x-forwarded-for"),
        header_str(headers, "x-real-ip"),
        remote,
    )
}

/// Admit or reject a request through the shared token buckets.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let key = request_client_key(&request);
    if state.limiter.allow(&key) {
        return next.run(request).await;
    }

    let request_id = request_id_of(&request);
    warn!(client = %key, request_id, path = request.uri().path(), "request rate limited");
    let body = render::message_page("429 Too Many Requests", render::RATE_LIMIT_MESSAGE, None);
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Html(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    response
}

/// Tag the request with a fresh [`RequestId`] and echo it as `X-Request-ID`.
pub async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let id = RequestId::generate();
    request.extensions_mut().insert(id.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// One log line per request with request id, method, path, status and duration.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request_id_of(&request);
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
    if response.status().is_server_error() {
        error!(request_id, %method, path, status, duration_ms, "request failed");
    } else {
        info!(request_id, %method, path, status, duration_ms, "request completed");
    }
    response
}

/// Turn a panicking handler into a logged `500` instead of a dropped connection.
pub async fn catch_panic(request: Request, next: Next) -> Response {
    let request_id = request_id_of(&request);
    let path = request.uri().path().to_string();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            error!(
                request_id,
                path,
                panic = panic_message(payload.as_ref()),
                "panic recovered"
            );
            let body = render::message_page(
                "500 Internal Server Error",
                render::GENERIC_ERROR_MESSAGE,
                None,
            );
            (StatusCode::INTERNAL_SERVER_ERROR, Html(body)).into_response()
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
