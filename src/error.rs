use thiserror::Error;

/// Failure of a single request to the backend or the card-data service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("decode: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::HttpStatus { status, .. } => Some(*status),
            ApiError::Transport(err) => err.status().map(|status| status.as_u16()),
            ApiError::Decode(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("not signed in")]
    SignedOut,

    #[error("session has no user id")]
    MissingUserId,

    #[error("name must not be empty")]
    EmptyName,

    #[error("no collection selected")]
    NoSelection,

    #[error("card {0} is not in the loaded collection")]
    UnknownCard(String),

    #[error("unknown collection {0}")]
    UnknownCollection(String),

    #[error("collection {0} has not been saved yet")]
    PendingCollection(String),

    #[error("invalid sign-in callback: {0}")]
    InvalidCallback(String),

    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
