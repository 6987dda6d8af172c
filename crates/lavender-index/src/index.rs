use std::path::Path;

use indexmap::IndexMap;

use crate::error::{IndexError, Result};
use crate::format;
use crate::hash::ContentHash;
use crate::label::Label;

/// File name of the aggregate index stored next to the per-module indexes.
pub const ALL_IDX: &str = ".all.idx";

/// Extension shared by all index files.
pub const IDX_EXTENSION: &str = "idx";

/// Labels keyed by lavendelized path.
///
/// Iteration and serialization follow insertion order. Equality ignores order: two indexes are
/// equal when they hold the same labels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Index {
    labels: IndexMap<String, Label>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from `labels`, collapsing duplicates.
    pub fn from_labels(labels: impl IntoIterator<Item = Label>) -> Result<Self> {
        let mut index = Self::new();
        for label in labels {
            index.add(label)?;
        }
        Ok(index)
    }

    /// Parses the textual form produced by [`Index::to_text`].
    pub fn parse(text: &str) -> Result<Self> {
        let mut index = Self::new();
        for label in format::parse_lines(text)? {
            index.add(label)?;
        }
        Ok(index)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for label in self.labels.values() {
            format::write_line(&mut out, label);
        }
        out
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| IndexError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Writes the index to `path`, creating missing parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, self.to_text())
        };
        write().map_err(|source| IndexError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Adds `label`.
    ///
    /// Returns `false` when an identical label is already present. A different label for the same
    /// lavendelized path is a [`IndexError::Conflict`]. Labels without a lavendelized path cannot
    /// be written and are rejected.
    pub fn add(&mut self, label: Label) -> Result<bool> {
        if label.lavendelized_path().is_empty() {
            return Err(IndexError::EmptyPath {
                original: label.original_path().to_string(),
            });
        }
        if let Some(existing) = self.labels.get(label.lavendelized_path()) {
            if *existing == label {
                return Ok(false);
            }
            return Err(IndexError::Conflict {
                path: label.lavendelized_path().to_string(),
                existing: describe(existing),
                incoming: describe(&label),
            });
        }
        self.labels
            .insert(label.lavendelized_path().to_string(), label);
        Ok(true)
    }

    /// Adds a hash-only reference to `path`, see [`Label::reference`].
    pub fn add_reference(&mut self, path: &str, hash: ContentHash) -> Result<bool> {
        self.add(Label::reference(path, hash))
    }

    pub fn get(&self, lavendelized_path: &str) -> Option<&Label> {
        self.labels.get(lavendelized_path)
    }

    /// Removes the label served at `lavendelized_path`, keeping the order of the others.
    pub fn remove(&mut self, lavendelized_path: &str) -> Option<Label> {
        self.labels.shift_remove(lavendelized_path)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Label) -> bool) {
        self.labels.retain(|_, label| keep(label));
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Label> + '_ {
        self.labels.values()
    }

    /// Served paths, in insertion order.
    pub fn lavendelized_paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.labels.keys().map(String::as_str)
    }
}

impl<'a> IntoIterator for &'a Index {
    type Item = &'a Label;
    type IntoIter = indexmap::map::Values<'a, String, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.labels.values()
    }
}

fn describe(label: &Label) -> String {
    format!("{}:{}", label.original_path(), label.hash())
}
