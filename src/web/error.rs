//! JSON error envelope for the web surface.

use crate::portal::PortalError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<PortalError> for ApiError {
    fn from(e: PortalError) -> Self {
        let status = match &e {
            PortalError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            // Retryable: no session slot freed up within the bound.
            PortalError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            PortalError::NoData
            | PortalError::ElementNotFound(_)
            | PortalError::NotInteractable(_)
            | PortalError::Scrape(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, e.to_string())
    }
}
