//! Shared HTTP plumbing: response envelope, error mapping and extractors

pub mod error;
pub mod identity;
pub mod validated_json;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use error::ApiError;
pub use identity::{Caller, RequestDeadline};
pub use validated_json::ValidatedJson;

/// Envelope around every REST payload.
///
/// On success: `{"success": true, "data": {...}}`.
/// On failure: `{"success": false, "data": null, "error": "...", "error_code": "conflict"}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable machine-readable reason, e.g. `policy_violation`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_code: None,
        }
    }

    pub fn error_with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: Some(code.into()),
            ..Self::error(message)
        }
    }
}
