use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Integrity violation: {count} intervals of area {area} contain {instant}")]
    IntegrityViolation {
        area: String,
        instant: DateTime<Utc>,
        count: usize,
    },

    #[error("Malformed timestamp: {0}")]
    MalformedTimestamp(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StorageError {
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::DatabaseError(e) => {
                matches!(
                    e,
                    sqlx::Error::PoolTimedOut
                        | sqlx::Error::PoolClosed
                        | sqlx::Error::Io(_)
                )
            }
            _ => false,
        }
    }

    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::IntegrityViolation { .. })
    }

    /// The caller passed something the store refuses to accept.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    /// The database or its contents failed, regardless of what the caller passed.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_) | Self::MigrationError(_) | Self::MalformedTimestamp(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_timestamp_is_a_storage_failure() {
        let error = StorageError::MalformedTimestamp("yesterday".to_string());

        assert!(error.is_storage_failure());
        assert!(!error.is_invalid_input());
    }

    #[test]
    fn test_invalid_input_is_not_a_storage_failure() {
        let error = StorageError::InvalidInput("empty area".to_string());

        assert!(error.is_invalid_input());
        assert!(!error.is_storage_failure());
    }
}
