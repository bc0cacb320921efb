//! HTTP error rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use highway_core::HighwayError;
use serde_json::json;
use tracing::error;

/// Wraps `HighwayError` so handlers can return it with `?`.
#[derive(Debug)]
pub struct AppError(pub HighwayError);

impl From<HighwayError> for AppError {
    fn from(e: HighwayError) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        let body = json!({
            "error": {
                "code": self.0.code(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}
