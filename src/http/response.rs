//! Error responses.
//!
//! Every error leaves as `{ "message": ... }` with the status below.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::FleetError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl FleetError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            FleetError::NoHealthyServer => StatusCode::SERVICE_UNAVAILABLE,
            FleetError::NotFound { .. } => StatusCode::NOT_FOUND,
            FleetError::Validation(_) => StatusCode::BAD_REQUEST,
            FleetError::AlreadyOffline(_) | FleetError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            FleetError::InconsistentFailover { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FleetError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (FleetError::NoHealthyServer, StatusCode::SERVICE_UNAVAILABLE),
            (FleetError::server_not_found(3), StatusCode::NOT_FOUND),
            (FleetError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (FleetError::AlreadyOffline(1), StatusCode::CONFLICT),
            (
                FleetError::InvalidTransition {
                    job_id: 1,
                    from: "completed",
                    to: "running",
                },
                StatusCode::CONFLICT,
            ),
            (
                FleetError::InconsistentFailover {
                    event_id: 1,
                    server_id: 2,
                    reason: "gone".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_no_healthy_message() {
        assert_eq!(
            FleetError::NoHealthyServer.to_string(),
            "no healthy servers available"
        );
    }
}
