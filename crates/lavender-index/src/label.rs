use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;

/// Number of hex characters of the hash used for the first directory level of a
/// lavendelized path.
const HASH_DIR_PREFIX_LEN: usize = 3;

/// A published resource: where it came from, where it is served, and what its bytes hash to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    original_path: String,
    lavendelized_path: String,
    hash: ContentHash,
}

impl Label {
    pub fn new(
        original_path: impl Into<String>,
        lavendelized_path: impl Into<String>,
        hash: ContentHash,
    ) -> Self {
        Self {
            original_path: original_path.into(),
            lavendelized_path: lavendelized_path.into(),
            hash,
        }
    }

    /// A label served under a content-derived path.
    ///
    /// The served path is `<hash[..3]>/<hash[3..]>/<folder>/<file name>`, where the file name is
    /// the last segment of `original_path`. An empty `folder` is omitted.
    pub fn lavendelized(original_path: &str, folder: &str, hash: ContentHash) -> Self {
        let lavendelized_path = lavendelized_path(original_path, folder, &hash);
        Self::new(original_path, lavendelized_path, hash)
    }

    /// Hashes `data` and builds the lavendelized label for it.
    pub fn for_bytes(original_path: &str, folder: &str, data: &[u8]) -> Self {
        Self::lavendelized(original_path, folder, ContentHash::digest(data))
    }

    /// A hash-only reference, as recorded in an aggregate index: the served path doubles as the
    /// original path.
    pub fn reference(path: impl Into<String>, hash: ContentHash) -> Self {
        let path = path.into();
        Self {
            original_path: path.clone(),
            lavendelized_path: path,
            hash,
        }
    }

    pub fn original_path(&self) -> &str {
        &self.original_path
    }

    pub fn lavendelized_path(&self) -> &str {
        &self.lavendelized_path
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }
}

fn lavendelized_path(original_path: &str, folder: &str, hash: &ContentHash) -> String {
    let hex = hash.to_hex();
    let (prefix, rest) = hex.split_at(HASH_DIR_PREFIX_LEN);
    let file_name = original_path.rsplit('/').next().unwrap_or(original_path);
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        format!("{prefix}/{rest}/{file_name}")
    } else {
        format!("{prefix}/{rest}/{folder}/{file_name}")
    }
}
