//! Service-level error taxonomy shared by every domain module.
//!
//! Transport code maps these onto HTTP statuses (see `api::error`).

use crate::auth::token::TokenError;
use crate::db::DatabaseError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),
    /// Bad credentials at login.
    #[error("Invalid email or password")]
    Authentication,
    /// Missing, invalid or revoked token.
    #[error("Authentication required")]
    Unauthorized,
    /// Authenticated, but wrong role or not the record's owner.
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(DatabaseError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(entity: &str) -> Self {
        Self::NotFound(format!("{entity} not found"))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, .. } => Self::not_found(&entity_type),
            DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(e, ref msg))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
                    && msg.as_deref().is_some_and(|m| m.starts_with("UNIQUE")) =>
            {
                Self::Conflict(msg.clone().unwrap_or_default())
            }
            other => Self::Database(other),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        Self::from(DatabaseError::from(err))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    #[test]
    fn missing_row_maps_to_not_found() {
        let err = ServiceError::from(DatabaseError::not_found("Shift", "abc"));
        match err {
            ServiceError::NotFound(msg) => assert_eq!(msg, "Shift not found"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let conn = open_memory_database().unwrap();
        conn.execute_batch("CREATE TABLE t (v TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let raw = conn.execute("INSERT INTO t VALUES ('a')", []).unwrap_err();
        assert!(matches!(ServiceError::from(raw), ServiceError::Conflict(_)));
    }

    #[test]
    fn other_database_errors_stay_internal() {
        let err = ServiceError::from(DatabaseError::ConstraintViolation("x".into()));
        assert!(matches!(err, ServiceError::Database(_)));
    }
}
