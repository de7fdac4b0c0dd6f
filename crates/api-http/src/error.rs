//! HTTP Error Mapping
//!
//! Handlers return [`ApiError`]; the envelope middleware turns it into the
//! single JSON error body every endpoint shares.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use linguard_core::error::AppError;
use linguard_core::port::{IdProvider, TimeProvider};
use std::sync::Arc;
use tracing::{error, warn};

use crate::types::ErrorBody;

/// Error returned by handlers, rendered by [`error_envelope`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn rate_limited() -> Self {
        Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please slow down.",
        )
    }
}

/// HTTP status for an application error
pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        AppError::EngineUnavailable(_)
        | AppError::StartupTimeout { .. }
        | AppError::EngineExited(_)
        | AppError::Cancelled(_)
        | AppError::ProcessLaunch(_) => StatusCode::SERVICE_UNAVAILABLE,
        AppError::EngineRejected { status, .. } => match *status {
            400..=499 => StatusCode::BAD_REQUEST,
            503 => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        },
        AppError::EngineProtocol(_) | AppError::Config(_) | AppError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self {
            status: status_for(&err),
            message: err.to_string(),
            details: Some(err.kind().to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Body is rendered by the envelope, which knows the request
        let mut response = self.status.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Request-independent inputs of the error body
#[derive(Clone)]
pub struct ErrorContext {
    pub ids: Arc<dyn IdProvider>,
    pub clock: Arc<dyn TimeProvider>,
}

/// Middleware rendering [`ApiError`] responses into [`ErrorBody`]
pub async fn error_envelope(
    State(ctx): State<ErrorContext>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let method = request.method().to_string();

    let mut response = next.run(request).await;
    let Some(err) = response.extensions_mut().remove::<ApiError>() else {
        return response;
    };

    let body = ErrorBody {
        message: err.message,
        details: err.details,
        status_code: err.status.as_u16(),
        timestamp: ctx.clock.now().to_rfc3339(),
        path,
        method,
        trace_id: ctx.ids.trace_id(),
    };
    if err.status.is_server_error() {
        error!(
            status = body.status_code,
            path = %body.path,
            trace_id = %body.trace_id,
            message = %body.message,
            "Request failed"
        );
    } else {
        warn!(
            status = body.status_code,
            path = %body.path,
            trace_id = %body.trace_id,
            message = %body.message,
            "Request rejected"
        );
    }

    (err.status, Json(body)).into_response()
}
