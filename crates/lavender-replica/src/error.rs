use std::path::PathBuf;

use lavender_index::IndexError;
use lavender_process::ProcessError;

pub type Result<T> = std::result::Result<T, ReplicaError>;

/// Errors produced while talking to a replica host.
#[derive(Debug, thiserror::Error)]
pub enum ReplicaError {
    #[error("{host}: {path}: {source}")]
    Io {
        host: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{host}: {source}")]
    Command {
        host: String,
        #[source]
        source: Box<ProcessError>,
    },

    #[error("{host}: {path}: corrupt index: {source}")]
    CorruptIndex {
        host: String,
        path: PathBuf,
        #[source]
        source: IndexError,
    },

    #[error("{host}: empty command line")]
    EmptyCommand { host: String },

    #[error("{path}: index file is not nested deep enough for a repaired-indexes location")]
    NoRepairLocation { path: PathBuf },
}

impl ReplicaError {
    pub(crate) fn io(host: &str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            host: host.to_string(),
            path: path.into(),
            source,
        }
    }

    pub(crate) fn command(host: &str, source: ProcessError) -> Self {
        Self::Command {
            host: host.to_string(),
            source: Box::new(source),
        }
    }
}
