use sea_orm::DbErr;
use thiserror::Error;

/// Failures while bootstrapping the catalog or interpreting its inputs.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Unknown entity kind '{0}'")]
    UnknownKind(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
