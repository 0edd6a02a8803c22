//! Request middleware: caller identity and request tracing.
//!
//! The server sits behind a gateway that authenticates players and forwards
//! the user id in the `x-user-id` header. Handlers read it from request
//! extensions:
//!
//! ```rust,no_run
//! use axum::extract::Extension;
//!
//! async fn protected_handler(Extension(user_id): Extension<i64>) -> String {
//!     format!("Acting as user {}", user_id)
//! }
//! # let _ = protected_handler;
//! ```

use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use uuid::Uuid;

use super::errors::ApiError;
use crate::logging;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const OPERATION_ID_HEADER: &str = "x-operation-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Positive user id from `x-user-id`, if present and well-formed.
pub fn user_id_from_headers(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|&id| id > 0)
}

/// Client idempotency key from `x-operation-id`.
pub fn operation_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(OPERATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Reject requests without a caller identity; inject `user_id: i64` otherwise.
///
/// - **Success**: header valid → injects the id → calls next handler
/// - **Missing or malformed header**: `401 Unauthorized`
pub async fn user_id_middleware(mut request: Request, next: Next) -> Response {
    match user_id_from_headers(request.headers()) {
        Some(user_id) => {
            request.extensions_mut().insert(user_id);
            next.run(request).await
        }
        None => ApiError::MissingUser.into_response(),
    }
}

/// Tag each request with an id and log its completion.
///
/// An incoming `x-request-id` is kept; otherwise a new one is generated. The
/// id is echoed on the response.
pub async fn request_log_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let user_id = user_id_from_headers(request.headers());
    let started = Instant::now();

    let mut response = next.run(request).await;

    logging::log_api_request(
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed().as_millis() as u64,
        user_id,
    );
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
