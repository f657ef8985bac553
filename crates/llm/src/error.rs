use axum::{
    Json,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Gateway request errors with appropriate HTTP status codes.
///
/// Every variant is terminal for the request that produced it. Nothing is retried.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The gateway only serves GET and POST.
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(Method),

    /// The inbound request body could not be read or decoded.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The upstream could not be reached at all.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The upstream answered with a non-success status. The body is relayed as-is.
    #[error("Upstream error ({status}): {body}")]
    UpstreamRejected { status: u16, body: String },

    /// Internal server error.
    /// If Some(message), the message is safe to show to the caller.
    /// If None, details were logged where the error was created and are not leaked.
    #[error("Internal server error")]
    InternalError(Option<String>),
}

impl LlmError {
    /// Get the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            // An upstream rejection is reported as a gateway failure even when the
            // upstream blamed the request, e.g. for an unknown model.
            Self::ConnectionError(_) | Self::UpstreamRejected { .. } => StatusCode::BAD_GATEWAY,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type string for the response.
    pub fn error_type(&self) -> &str {
        match self {
            Self::MethodNotAllowed(_) | Self::InvalidRequest(_) => "invalid_request_error",
            Self::ConnectionError(_) | Self::UpstreamRejected { .. } => "api_error",
            Self::InternalError(_) => "internal_error",
        }
    }
}

/// Error response format compatible with OpenAI API.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    message: String,
    r#type: String,
    code: u16,
}

impl IntoResponse for LlmError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            Self::InternalError(Some(message)) => message.clone(),
            _ => self.to_string(),
        };

        let error_response = ErrorResponse {
            error: ErrorDetails {
                message,
                r#type: self.error_type().to_string(),
                code: status.as_u16(),
            },
        };

        (status, Json(error_response)).into_response()
    }
}
