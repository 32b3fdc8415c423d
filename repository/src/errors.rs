use crate::connection::BoxError;
use thiserror::Error;

/// Outcome of a failed repository operation
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Zero rows matched a `get`/`one` query. A valid outcome, not a fault.
    #[error("no results returned for query")]
    NoResults,

    /// The engine (or query composition) failed; `source` keeps the original cause.
    #[error("{context}: {source}")]
    Persistence {
        context: &'static str,
        #[source]
        source: BoxError,
    },
}

impl RepositoryError {
    /// Wrap an underlying error with the attempted operation
    pub fn persistence(context: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Persistence {
            context,
            source: source.into(),
        }
    }

    pub fn is_no_results(&self) -> bool {
        matches!(self, Self::NoResults)
    }

    /// The operation context of a persistence error
    pub fn context(&self) -> Option<&'static str> {
        match self {
            Self::NoResults => None,
            Self::Persistence { context, .. } => Some(*context),
        }
    }
}

/// Failures raised while composing or decoding a query, before or after the engine runs it
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("unknown relationship '{relationship}' for table '{table}'")]
    UnknownRelationship { table: String, relationship: String },

    #[error("unable to serialize model: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unable to decode row from '{table}': {message}")]
    Decode { table: String, message: String },

    #[error("missing where clause")]
    MissingWhereClause,

    #[error("table '{0}' has no soft delete column")]
    NoSoftDelete(String),

    #[error("no row returned by {0}")]
    NoRowReturned(&'static str),
}
