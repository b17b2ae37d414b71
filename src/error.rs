use thiserror::Error;

/// Everything that can go wrong talking to the search service.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed caller input, rejected before any request is sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid query syntax: {0}")]
    InvalidQuerySyntax(String),

    #[error("invalid function syntax: {0}")]
    InvalidFunctionSyntax(String),

    #[error("index already exists: {0}")]
    IndexAlreadyExists(String),

    #[error("index does not exist: {0}")]
    IndexDoesNotExist(String),

    #[error("maximum number of indexes reached: {0}")]
    QuotaExceeded(String),

    #[error("unexpected HTTP status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The batch response does not line up with the submitted documents.
    #[error("batch response has {outcomes} outcomes for {documents} submitted documents")]
    StructuralMismatch { documents: usize, outcomes: usize },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid API url: {0}")]
    InvalidUrl(String),

    #[error("transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
