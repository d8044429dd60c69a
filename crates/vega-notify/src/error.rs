/// Configuration-time errors of the notification subsystem.
///
/// Delivery failures never surface as this type: the dispatcher reduces them
/// to a per-channel `false`.
///
/// # Examples
///
/// ```rust
/// use vega_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("missing smtp host".to_string());
/// assert!(err.to_string().contains("smtp host"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notify: invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Notify: HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notify: SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Notify: invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
