//! Mapping of engine errors onto HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, warn};

use crate::shared::{DomainError, ErrorKind};

use super::ApiResponse;

/// Error returned by every handler.
///
/// Renders the standard [`ApiResponse`] envelope with `error_code` set to the
/// error kind, so clients can branch without parsing messages.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", message)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::PolicyViolation | ErrorKind::InvalidState => StatusCode::BAD_REQUEST,
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::StorageFailure => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Inconsistency => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let kind = err.kind();
        match kind {
            ErrorKind::Inconsistency => error!(error = %err, "Request left stores inconsistent"),
            ErrorKind::StorageFailure => warn!(error = %err, "Storage unavailable"),
            _ => {}
        }
        Self::new(status_for(kind), kind.as_str(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()>::error_with_code(self.code, self.message);
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_statuses() {
        let cases = [
            (DomainError::not_found("Reservation", "R1"), 404),
            (DomainError::Conflict("slot already booked".into()), 409),
            (DomainError::PolicyViolation("too far ahead".into()), 400),
            (DomainError::InvalidState("must be confirmed first".into()), 400),
            (DomainError::Validation("owner_id is required".into()), 422),
            (DomainError::DeadlineExceeded("late".into()), 504),
            (DomainError::Storage("down".into()), 503),
            (DomainError::Inconsistency("slot SL1 still held".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status.as_u16(), status);
        }
    }

    #[tokio::test]
    async fn body_carries_error_code() {
        let resp = ApiError::from(DomainError::Conflict("slot already booked".into())).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_code"], "conflict");
        assert_eq!(json["error"], "Conflict: slot already booked");
    }
}
