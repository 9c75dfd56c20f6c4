use thiserror::Error;

/// Request-level failure taxonomy.
///
/// Client errors (`Extraction`, `NoContent`, `InvalidRequest`) map to 4xx;
/// everything else is an internal or deployment failure.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to extract text from document: {0}")]
    Extraction(String),

    #[error("Could not extract any content from the document")]
    NoContent,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Prompt template not found at {path}: {reason}")]
    TemplateMissing { path: String, reason: String },

    #[error("Prompt template error: {0}")]
    Template(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Index operation failed: {0}")]
    Index(String),

    #[error("Generation failed: {0}")]
    Generation(String),
}

impl Error {
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Extraction(_) | Error::NoContent | Error::InvalidRequest(_))
    }

    /// Wrap an `anyhow` chain from the storage layer, keeping every cause.
    pub fn index(err: &anyhow::Error) -> Self {
        Error::Index(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of a chat-completion backend.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("{provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("{provider} rejected the credentials")]
    AuthFailed { provider: String },

    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: String },

    #[error("{provider} returned an invalid response: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl From<LlmError> for Error {
    fn from(err: LlmError) -> Self { Error::Generation(err.to_string()) }
}
