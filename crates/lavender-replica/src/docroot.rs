use std::path::{Path, PathBuf};

use lavender_config::DocrootConfig;
use lavender_index::{Index, ALL_IDX, IDX_EXTENSION};

use crate::error::{ReplicaError, Result};
use crate::transport::{FindKind, Transport};

/// Directory where quarantined copies of index files are written.
pub const REPAIRED_INDEXES: &str = "repaired-indexes";

/// One docroot on one replica: the content tree plus the directory holding its index files.
pub struct Docroot<'a> {
    transport: &'a dyn Transport,
    name: &'a str,
    docroot: PathBuf,
    indexes: PathBuf,
}

impl<'a> Docroot<'a> {
    pub fn new(transport: &'a dyn Transport, config: &'a DocrootConfig) -> Self {
        Self {
            transport,
            name: &config.name,
            docroot: transport.root().join(&config.docroot),
            indexes: transport.root().join(&config.indexes),
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn host(&self) -> &str {
        self.transport.host()
    }

    pub fn transport(&self) -> &'a dyn Transport {
        self.transport
    }

    /// Absolute path of the content tree on the host.
    pub fn path(&self) -> &Path {
        &self.docroot
    }

    pub fn exists(&self) -> Result<bool> {
        self.transport.exists(&self.docroot)
    }

    /// Absolute path of the node stored at the docroot-relative `path`.
    pub fn node(&self, path: &str) -> PathBuf {
        self.docroot.join(path)
    }

    /// Module index files, sorted by name. The aggregate index is not included.
    pub fn index_list(&self) -> Result<Vec<String>> {
        if !self.transport.exists(&self.indexes)? {
            return Ok(Vec::new());
        }
        let suffix = format!(".{IDX_EXTENSION}");
        let mut names: Vec<String> = self
            .transport
            .find(&self.indexes, FindKind::TopLevelFiles)?
            .into_iter()
            .filter(|name| !name.contains('/') && name.ends_with(&suffix) && name != ALL_IDX)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Location of the index file `name`, whether or not it exists.
    pub fn index(&self, name: &str) -> PathBuf {
        self.indexes.join(name)
    }

    pub fn all_index_path(&self) -> PathBuf {
        self.index(ALL_IDX)
    }

    pub fn load_index(&self, path: &Path) -> Result<Index> {
        let text = self.transport.read_to_string(path)?;
        Index::parse(&text).map_err(|source| ReplicaError::CorruptIndex {
            host: self.host().to_string(),
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path` if it exists.
    pub fn load_optional_index(&self, path: &Path) -> Result<Option<Index>> {
        if self.transport.exists(path)? {
            self.load_index(path).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn save_index(&self, path: &Path, index: &Index) -> Result<()> {
        self.transport.write(path, &index.to_text())
    }
}

/// Where a cleaned copy of the index at `path` is written instead of overwriting it.
///
/// `<base>/<x>/<dir>/<file>` maps to `<base>/repaired-indexes/<dir>/<file>`.
pub fn repaired_location(path: &Path) -> Result<PathBuf> {
    let missing = || ReplicaError::NoRepairLocation {
        path: path.to_path_buf(),
    };
    let file = path.file_name().ok_or_else(missing)?;
    let dir = path.parent().ok_or_else(missing)?;
    let dir_name = dir.file_name().ok_or_else(missing)?;
    let base = dir.parent().and_then(Path::parent).ok_or_else(missing)?;
    Ok(base.join(REPAIRED_INDEXES).join(dir_name).join(file))
}
