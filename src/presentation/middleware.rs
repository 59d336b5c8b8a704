//! Error mapping and request logging for the HTTP layer

use axum::{
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use std::time::Instant;
use uuid::Uuid;

use crate::application::errors::ApplicationError;
use crate::domain::DomainError;
use crate::presentation::models::ErrorResponse;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

tokio::task_local! {
    static REQUEST_ID: Uuid;
}

/// Id assigned by [`logging_middleware`] to the request being served
pub fn current_request_id() -> Option<Uuid> {
    REQUEST_ID.try_with(|id| *id).ok()
}

impl ApplicationError {
    /// HTTP status and machine-readable code for this error
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApplicationError::Domain(DomainError::InvalidFormat { .. }) => {
                (StatusCode::BAD_REQUEST, "INVALID_FORMAT")
            }
            ApplicationError::Domain(DomainError::InvalidInput { .. }) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT")
            }
            ApplicationError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApplicationError::NoResults { .. } => (StatusCode::NOT_FOUND, "NO_RESULTS"),
            ApplicationError::Configuration { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
            }
        }
    }
}

impl IntoResponse for ApplicationError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Client errors carry their own user-facing text; internals stay in the logs
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let details = match &self {
            ApplicationError::Domain(DomainError::InvalidInput { field, .. }) => {
                Some(serde_json::json!({ "field": field }))
            }
            _ => None,
        };

        let error_response = ErrorResponse {
            code: code.to_string(),
            message,
            details,
            request_id: current_request_id().unwrap_or_else(Uuid::new_v4),
            timestamp: Utc::now(),
        };

        (status, Json(error_response)).into_response()
    }
}

/// Logs each request with its latency and echoes a generated request id
pub async fn logging_middleware(request: Request<axum::body::Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        "Processing request"
    );

    // Handlers run inside this scope, so error bodies carry the same id as the header
    let mut response = REQUEST_ID.scope(request_id, next.run(request)).await;
    let duration = start_time.elapsed();

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = duration.as_millis() as u64,
        "Request completed"
    );

    response
}
