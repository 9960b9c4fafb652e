use thiserror::Error;

/// Errors produced while validating, storing and looking up metrics
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("{reason}")]
    Validation { reason: String },

    #[error("metric not found: {id} ({kind})")]
    NotFound { id: String, kind: String },

    #[error("wrong hash for metric {id}")]
    Signature { id: String },

    #[error("storage failure: {reason}")]
    Storage { reason: String },

    #[error("failed to connect to {target} after {attempts} attempts: {reason}")]
    Connect {
        target: String,
        attempts: u32,
        reason: String,
    },
}

impl MetricsError {
    pub fn validation(reason: impl Into<String>) -> Self {
        MetricsError::Validation {
            reason: reason.into(),
        }
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        MetricsError::Storage {
            reason: reason.into(),
        }
    }

    pub fn not_found(id: impl Into<String>, kind: impl ToString) -> Self {
        MetricsError::NotFound {
            id: id.into(),
            kind: kind.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MetricsError::NotFound { .. })
    }
}

impl From<sqlx::Error> for MetricsError {
    fn from(e: sqlx::Error) -> Self {
        MetricsError::storage(e.to_string())
    }
}

impl From<redis::RedisError> for MetricsError {
    fn from(e: redis::RedisError) -> Self {
        MetricsError::storage(e.to_string())
    }
}

impl From<std::io::Error> for MetricsError {
    fn from(e: std::io::Error) -> Self {
        MetricsError::storage(e.to_string())
    }
}

/// Malformed JSON is a caller problem, not a storage one.
impl From<serde_json::Error> for MetricsError {
    fn from(e: serde_json::Error) -> Self {
        MetricsError::validation(e.to_string())
    }
}

pub type MetricsResult<T> = Result<T, MetricsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_formatting() {
        let err = MetricsError::not_found("hits", "counter");
        let msg = err.to_string();
        assert!(msg.contains("hits"));
        assert!(msg.contains("counter"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_connect_error_formatting() {
        let err = MetricsError::Connect {
            target: "sqlite://metrics.db".to_string(),
            attempts: 3,
            reason: "unable to open database file".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("sqlite://metrics.db"));
    }

    #[test]
    fn test_json_errors_are_validation_errors() {
        let err: MetricsError = serde_json::from_str::<Vec<u8>>("{").unwrap_err().into();
        assert!(matches!(err, MetricsError::Validation { .. }));
    }
}
