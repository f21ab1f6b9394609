use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SelectError>;

#[derive(Error, Debug)]
pub enum SelectError {
    #[error("query must contain at least one non-whitespace character")]
    InvalidQuery,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("corpus unavailable at {}: {source}", path.display())]
    CorpusUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("topic index unavailable at {}: {reason}", path.display())]
    TopicIndexUnavailable { path: PathBuf, reason: String },

    #[error("malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("failed to write evidence pack to {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SelectError {
    /// Process exit code for a fatal error.
    pub fn exit_code(&self) -> i32 {
        match self {
            SelectError::InvalidQuery | SelectError::InvalidArgument(_) => 2,
            SelectError::CorpusUnavailable { .. } => 3,
            SelectError::Output { .. } => 4,
            SelectError::TopicIndexUnavailable { .. } | SelectError::MalformedRecord { .. } => 1,
        }
    }
}
