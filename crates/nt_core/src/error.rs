use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of a single web-search call.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("search service rate limited the request")]
    RateLimited,

    #[error("search service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("search request timed out")]
    Timeout,

    #[error("could not decode search response: {0}")]
    Decode(String),

    #[error("query '{query}' failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        query: String,
        attempts: u32,
        last: Box<SearchError>,
    },
}

impl SearchError {
    /// Whether the call may succeed if repeated.
    pub fn is_transient(&self) -> bool {
        match self {
            SearchError::RateLimited | SearchError::Transport(_) | SearchError::Timeout => true,
            SearchError::Status { status, .. } => *status >= 500,
            SearchError::Decode(_) | SearchError::RetriesExhausted { .. } => false,
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if e.is_decode() {
            SearchError::Decode(e.to_string())
        } else {
            SearchError::Transport(e.to_string())
        }
    }
}

/// Failures of a classification provider. These never leave the orchestrator;
/// they only decide whether the next provider is tried.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{0} API key is required")]
    MissingApiKey(&'static str),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider timed out")]
    Timeout,

    #[error("invalid classification response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}
