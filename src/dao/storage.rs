use std::error::Error;
use thiserror::Error;

/// Result alias for roster storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by the roster store regardless of the underlying table service.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not complete `operation` against `table`.
    #[error("{operation} on table `{table}` failed")]
    Backend {
        table: &'static str,
        operation: &'static str,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Wrap a backend failure with the table and operation it happened on.
    pub fn backend(
        table: &'static str,
        operation: &'static str,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        StorageError::Backend {
            table,
            operation,
            source: Box::new(source),
        }
    }
}
