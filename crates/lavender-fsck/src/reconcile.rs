use std::collections::BTreeSet;
use std::path::PathBuf;

use lavender_replica::{repaired_location, Docroot};

use crate::aggregate::Aggregate;
use crate::error::Result;

/// Referenced paths with no file behind them.
pub fn dangling(files: &BTreeSet<String>, references: &BTreeSet<String>) -> BTreeSet<String> {
    references.difference(files).cloned().collect()
}

/// Writes a copy of every module index that refers to a `dangling` path, minus those labels, to
/// its repaired location. Returns the locations written.
pub fn quarantine(
    docroot: &Docroot<'_>,
    aggregate: &Aggregate,
    dangling: &BTreeSet<String>,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (name, original) in &aggregate.indexes {
        let mut repaired = original.clone();
        repaired.retain(|label| !dangling.contains(label.lavendelized_path()));
        if repaired.len() == original.len() {
            continue;
        }
        let target = repaired_location(&docroot.index(name))?;
        docroot.save_index(&target, &repaired)?;
        tracing::info!(
            target: "lavender.fsck",
            host = docroot.host(),
            docroot = docroot.name(),
            index = %name,
            removed = original.len() - repaired.len(),
            repaired = %target.display(),
            "wrote repaired index"
        );
        written.push(target);
    }
    Ok(written)
}
