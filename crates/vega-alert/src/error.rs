use vega_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("Alert: storage error: {0}")]
    Storage(#[from] StorageError),

    /// The remote evaluator failed; nothing from this pass was persisted.
    #[error("Alert: remote evaluation failed: {0:#}")]
    Evaluator(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AlertError>;
