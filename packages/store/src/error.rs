use std::time::Duration;

use common::Transient;
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use thiserror::Error;

use crate::entity::ValidationError;

/// Coarse classification of a [`StoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Timeout,
    Authorization,
    Validation,
    NotFound,
    Conflict,
    Unknown,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Validation failed: {}", join_messages(.0))]
    Validation(Vec<ValidationError>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Authorization(_) => ErrorKind::Authorization,
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Network and timeout failures mean the store was unreachable.
    pub fn is_connectivity(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Timeout)
    }
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        self.is_connectivity()
    }
}

impl From<Vec<ValidationError>> for StoreError {
    fn from(errors: Vec<ValidationError>) -> Self {
        StoreError::Validation(errors)
    }
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return StoreError::Conflict(detail);
        }
        match err {
            DbErr::ConnectionAcquire(e) => StoreError::Network(e.to_string()),
            DbErr::Conn(e) => StoreError::Network(e.to_string()),
            DbErr::RecordNotFound(detail) => StoreError::NotFound(detail),
            other => StoreError::Unknown(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Non-throwing outcome handed to presentation code.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
    pub error_kind: Option<ErrorKind>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: String::new(),
            error_kind: None,
        }
    }

    pub fn failed(error: &StoreError) -> Self {
        Self {
            success: false,
            data: None,
            message: error.to_string(),
            error_kind: Some(error.kind()),
        }
    }
}

impl<T> From<StoreResult<T>> for OperationResult<T> {
    fn from(result: StoreResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failed(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connectivity_failures_are_transient() {
        assert!(StoreError::Network("reset".into()).is_transient());
        assert!(StoreError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!StoreError::Authorization("no".into()).is_transient());
        assert!(!StoreError::Validation(vec![ValidationError::MissingName]).is_transient());
        assert!(!StoreError::Conflict("dup".into()).is_transient());
    }

    #[test]
    fn record_not_found_maps_to_not_found() {
        let err = StoreError::from(DbErr::RecordNotFound("family".into()));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn custom_db_errors_map_to_unknown() {
        let err = StoreError::from(DbErr::Custom("boom".into()));
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn validation_message_lists_every_problem() {
        let err = StoreError::Validation(vec![
            ValidationError::MissingName,
            ValidationError::TimestampOrder,
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: name is required; created_at must not be after updated_at"
        );
    }

    #[test]
    fn operation_result_carries_kind_and_message() {
        let failed: OperationResult<u32> =
            Err(StoreError::NotFound("family 42".into())).into();
        assert!(!failed.success);
        assert!(failed.data.is_none());
        assert_eq!(failed.error_kind, Some(ErrorKind::NotFound));
        assert_eq!(failed.message, "Not found: family 42");

        let ok: OperationResult<u32> = Ok(7).into();
        assert!(ok.success);
        assert_eq!(ok.data, Some(7));
        assert_eq!(ok.error_kind, None);
    }

    #[test]
    fn operation_result_serializes_kind_in_snake_case() {
        let failed: OperationResult<u32> = OperationResult::failed(&StoreError::Timeout(
            Duration::from_millis(5),
        ));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["error_kind"], "timeout");
        assert_eq!(json["success"], false);
    }
}
