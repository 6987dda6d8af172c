use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors produced while building, parsing or persisting an [`Index`](crate::Index).
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid content hash {text:?}")]
    InvalidHash { text: String },

    #[error("label for {original} has an empty lavendelized path")]
    EmptyPath { original: String },

    #[error("conflicting labels for {path}: {existing} vs {incoming}")]
    Conflict {
        path: String,
        existing: String,
        incoming: String,
    },

    #[error("failed to read index {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write index {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IndexError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}
