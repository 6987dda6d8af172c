use std::path::PathBuf;

use lavender_index::IndexError;
use lavender_replica::ReplicaError;

pub type Result<T> = std::result::Result<T, FsckError>;

/// Errors that abort an fsck run.
///
/// Inconsistencies that can be reported and worked around are [`Problem`](crate::Problem)s
/// instead.
#[derive(Debug, thiserror::Error)]
pub enum FsckError {
    #[error(transparent)]
    Replica(#[from] ReplicaError),

    #[error("{host}: {path}: {source}")]
    Index {
        host: String,
        path: PathBuf,
        #[source]
        source: IndexError,
    },

    #[error(
        "{host}: {docroot}: hash tool printed {actual} lines for {expected} paths (first path: {first})"
    )]
    HashOutputMismatch {
        host: String,
        docroot: String,
        expected: usize,
        actual: usize,
        first: String,
    },

    #[error(
        "{host}: {docroot}: garbage collection not allowed with {problems} open problem(s), fix them first"
    )]
    GcNotAllowed {
        host: String,
        docroot: String,
        problems: usize,
    },
}
