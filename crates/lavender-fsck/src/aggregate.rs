use std::collections::{BTreeMap, BTreeSet};

use lavender_index::Index;
use lavender_replica::Docroot;

use crate::error::{FsckError, Result};

/// The module indexes of one replica and everything derived from them.
#[derive(Debug, Default)]
pub struct Aggregate {
    /// Module indexes by file name.
    pub indexes: BTreeMap<String, Index>,
    /// Every label of every module index, as a hash-only reference.
    pub all: Index,
    /// Lavendelized paths of `all`.
    pub references: BTreeSet<String>,
}

impl Aggregate {
    /// Adds the module index `name`, failing when one of its labels contradicts an earlier one.
    pub fn add(&mut self, name: &str, index: Index) -> lavender_index::Result<()> {
        for label in &index {
            self.all
                .add_reference(label.lavendelized_path(), label.hash())?;
            self.references.insert(label.lavendelized_path().to_string());
        }
        self.indexes.insert(name.to_string(), index);
        Ok(())
    }
}

/// Loads every module index of `docroot` and folds it into an [`Aggregate`].
pub fn build(docroot: &Docroot<'_>) -> Result<Aggregate> {
    let mut aggregate = Aggregate::default();
    for name in docroot.index_list()? {
        let path = docroot.index(&name);
        let index = docroot.load_index(&path)?;
        aggregate
            .add(&name, index)
            .map_err(|source| FsckError::Index {
                host: docroot.host().to_string(),
                path,
                source,
            })?;
    }
    Ok(aggregate)
}
