use thiserror::Error;

#[derive(Error, Debug)]
pub enum BreezeError {
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),

    #[error("Unable to locate property '{segment}' of path '{path}' on type '{type_name}'")]
    PropertyNotFound {
        segment: String,
        path: String,
        type_name: String,
    },

    #[error("Entity type '{0}' not found")]
    EntityTypeNotFound(String),

    #[error("Entity type '{0}' already registered")]
    EntityTypeExists(String),

    #[error("An entity with key {0} is already attached")]
    EntityAlreadyExists(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Invalid state transition: {0}")]
    InvalidState(String),

    #[error("Missing key value: {0}")]
    MissingKey(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("No uri builder registered under '{0}'")]
    UriBuilderNotFound(String),

    #[error("Entity type '{0}' is frozen")]
    TypeFrozen(String),

    #[error("Internal consistency error: {0}")]
    Internal(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl BreezeError {
    /// True for errors that indicate a bug in the cache rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

pub type Result<T> = std::result::Result<T, BreezeError>;

impl From<serde_json::Error> for BreezeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
