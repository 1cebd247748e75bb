//src/error.rs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvalError>;

/// Every failure surfaced by the evaluation pipeline.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The lineage records do not describe a single rooted tree.
    #[error("malformed lineage tree: {0}")]
    MalformedTree(String),

    /// A label, node id or column could not be resolved.
    #[error("not found: {0}")]
    NotFound(String),

    /// The rank cannot be evaluated against the true-taxon map.
    #[error("invalid rank '{rank}': {reason}")]
    InvalidRank { rank: String, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A row of an input table could not be parsed (1-based line number).
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// One of the concurrent input loaders failed.
    #[error("failed to load {source_name}: {error}")]
    Load {
        source_name: &'static str,
        error: Box<EvalError>,
    },
}

impl EvalError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        EvalError::Parse {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_rank(rank: &str, reason: impl Into<String>) -> Self {
        EvalError::InvalidRank {
            rank: rank.to_string(),
            reason: reason.into(),
        }
    }
}
