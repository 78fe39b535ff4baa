use thiserror::Error;

/// Transport-level failure of an option fetch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

#[derive(Debug, Error)]
pub enum SelectError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("endpoint responded with status {status}")]
    Http { status: u16 },
    #[error("configuration error: {0}")]
    Config(String),
}

impl SelectError {
    /// Message shown to the user; never leaks transport detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            SelectError::Http { .. } => crate::remote::LOAD_FAILED_MESSAGE,
            SelectError::Fetch(_) | SelectError::Config(_) => crate::remote::NETWORK_ERROR_MESSAGE,
        }
    }
}
