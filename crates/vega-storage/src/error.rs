/// Errors raised by a [`DocumentStore`](crate::DocumentStore) backend.
///
/// # Examples
///
/// ```rust
/// use vega_storage::error::StorageError;
///
/// let err = StorageError::Corrupt("vega_reports".to_string());
/// assert!(err.to_string().contains("vega_reports"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored document does not have the shape its key implies.
    #[error("Storage: corrupt document under key '{0}'")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
