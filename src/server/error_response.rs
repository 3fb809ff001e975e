use crate::PredictorError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JSON error body returned by every endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Generic, client-safe message
    pub message: String,
    /// HTTP status code as integer for client parsing
    pub error_code: u16,
    /// Matches the server-side log line carrying the full error
    pub request_id: String,
}

impl ErrorResponse {
    pub fn new(message: String, status_code: StatusCode) -> Self {
        Self::with_request_id(message, status_code, Uuid::new_v4().to_string())
    }

    pub fn with_request_id(message: String, status_code: StatusCode, request_id: String) -> Self {
        Self {
            message,
            error_code: status_code.as_u16(),
            request_id,
        }
    }
}

impl PredictorError {
    /// Message safe to show a client. Internal detail never leaves the server.
    pub fn public_message(&self) -> &'static str {
        match self {
            PredictorError::ServiceUnavailable(_) => "Database not initialized",
            PredictorError::PoolExhausted | PredictorError::Query(_) => {
                "Failed to fetch predictions"
            }
            PredictorError::Configuration(_)
            | PredictorError::Io(_)
            | PredictorError::Internal(_) => "Internal server error",
        }
    }
}

/// Every failure surfaces as a 500 with a generic body; the detail is logged.
impl IntoResponse for PredictorError {
    fn into_response(self) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let error_response = ErrorResponse::new(self.public_message().to_string(), status);

        tracing::error!(
            request_id = %error_response.request_id,
            error = %self,
            "Request failed"
        );

        (status, Json(error_response)).into_response()
    }
}
