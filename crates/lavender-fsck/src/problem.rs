use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// An inconsistency found by fsck. Problems fail the run but do not stop it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Problem {
    /// Index entries whose file is missing from the docroot.
    DanglingReferences { host: String, paths: Vec<String> },
    /// The stored aggregate index does not match the module indexes.
    AllIndexMismatch { host: String, repaired: PathBuf },
    /// A file whose content no longer matches its indexed hash.
    HashMismatch {
        host: String,
        path: String,
        expected: String,
        actual: String,
    },
    /// Files no index refers to, found while garbage collection is off.
    UnreferencedFiles { host: String, paths: Vec<String> },
    /// Replicas disagree on which index files exist.
    IndexListDiffers {
        host: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },
    /// Replicas disagree on the content of an index file.
    IndexDiffers { host: String, name: String },
}

impl Problem {
    pub fn host(&self) -> &str {
        match self {
            Problem::DanglingReferences { host, .. }
            | Problem::AllIndexMismatch { host, .. }
            | Problem::HashMismatch { host, .. }
            | Problem::UnreferencedFiles { host, .. }
            | Problem::IndexListDiffers { host, .. }
            | Problem::IndexDiffers { host, .. } => host,
        }
    }

    /// Two disagreements with the same key describe the same divergence.
    pub(crate) fn disagreement_key(&self) -> Option<Option<&str>> {
        match self {
            Problem::IndexListDiffers { .. } => Some(None),
            Problem::IndexDiffers { name, .. } => Some(Some(name.as_str())),
            _ => None,
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::DanglingReferences { host, paths } => {
                write!(f, "{host}: dangling references: {}", paths.len())
            }
            Problem::AllIndexMismatch { host, repaired } => write!(
                f,
                "{host}: aggregate index differs, computed index written to {}",
                repaired.display()
            ),
            Problem::HashMismatch {
                host,
                path,
                expected,
                actual,
            } => write!(f, "{host}: {path}: md5 broken: expected {expected}, got {actual}"),
            Problem::UnreferencedFiles { host, paths } => {
                write!(f, "{host}: unreferenced files: {}", paths.len())
            }
            Problem::IndexListDiffers {
                host,
                expected,
                actual,
            } => write!(
                f,
                "{host}: index file list differs: [{}] vs [{}]",
                expected.join(", "),
                actual.join(", ")
            ),
            Problem::IndexDiffers { host, name } => write!(f, "{host}: index files differ: {name}"),
        }
    }
}
