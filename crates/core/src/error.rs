use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("object store unreachable: {0}")]
    Unreachable(String),

    #[error("store request failed: {0}")]
    Request(String),
}

impl StoreError {
    /// True when the failure means the store itself could not be reached,
    /// as opposed to one request going wrong.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Unreachable(_) => true,
            Self::Http(error) => error.is_connect() || error.is_timeout(),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("object store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("malformed preview request: {0}")]
    MalformedInput(String),
}

impl From<StoreError> for ResolveError {
    fn from(error: StoreError) -> Self {
        Self::StoreUnavailable(error.to_string())
    }
}

impl ResolveError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
