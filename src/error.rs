use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unknown device: {0}")]
    UnknownDevice(String),

    #[error("Device gateway unreachable: {0}")]
    DeviceUnreachable(String),

    #[error("Upstream service failed: {0}")]
    Upstream(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::UnknownDevice(_) => (
                StatusCode::BAD_REQUEST,
                "UNKNOWN_DEVICE",
                "Unknown device".to_string(),
            ),
            AppError::DeviceUnreachable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "DEVICE_UNREACHABLE",
                msg.clone(),
            ),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.clone()),
            AppError::Http(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "HTTP_ERROR",
                e.to_string(),
            ),
        };

        tracing::error!("Request failed: {} - {}", code, message);

        (
            status,
            Json(ErrorResponse {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}
