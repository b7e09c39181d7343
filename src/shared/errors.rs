use thiserror::Error;

/// Errors surfaced by the booking engine.
///
/// Every variant maps to a stable [`ErrorKind`] so callers can branch on the
/// reason without parsing messages.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Policy violation: {0}")]
    PolicyViolation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("Storage failure: {0}")]
    Storage(String),

    /// A compensating write failed; slot and reservation records disagree
    /// until reconciled out-of-band.
    #[error("Inconsistency: {0}")]
    Inconsistency(String),
}

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    PolicyViolation,
    InvalidState,
    Validation,
    DeadlineExceeded,
    StorageFailure,
    Inconsistency,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::PolicyViolation => "policy_violation",
            Self::InvalidState => "invalid_state",
            Self::Validation => "validation",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::StorageFailure => "storage_failure",
            Self::Inconsistency => "inconsistency",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DomainError {
    pub fn not_found(entity: &'static str, value: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            field: "id",
            value: value.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::PolicyViolation(_) => ErrorKind::PolicyViolation,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Validation(_) => ErrorKind::Validation,
            Self::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
            Self::Storage(_) => ErrorKind::StorageFailure,
            Self::Inconsistency(_) => ErrorKind::Inconsistency,
        }
    }

    /// Whether this error is likely transient (e.g. DB connection lost)
    /// and the operation may succeed if retried by the caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metrics recorder error: {0}")]
    Metrics(String),
}
