use std::collections::BTreeSet;
use std::path::Path;

use lavender_replica::{Docroot, FindKind};
use serde::Serialize;

use crate::error::Result;

/// Result summary from a garbage collection run on one replica.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    /// Docroot-relative paths of the deleted files.
    pub deleted_files: Vec<String>,
    /// Docroot-relative paths of the deleted directories, in deletion order.
    pub deleted_dirs: Vec<String>,
}

/// Files no index refers to.
pub fn unreferenced(files: &BTreeSet<String>, references: &BTreeSet<String>) -> BTreeSet<String> {
    files.difference(references).cloned().collect()
}

/// Deletes `unreferenced` and then every directory left empty, never the docroot itself.
pub fn collect(docroot: &Docroot<'_>, unreferenced: &BTreeSet<String>) -> Result<GcReport> {
    let transport = docroot.transport();
    let mut report = GcReport::default();

    for path in unreferenced {
        tracing::debug!(target: "lavender.fsck", host = docroot.host(), %path, "rm");
        transport.delete_file(&docroot.node(path))?;
        report.deleted_files.push(path.clone());
    }

    loop {
        let empty = transport.find(docroot.path(), FindKind::EmptyDirectories)?;
        if empty.is_empty() {
            break;
        }
        for mut dir in empty {
            loop {
                tracing::debug!(target: "lavender.fsck", host = docroot.host(), %dir, "rmdir");
                transport.delete_dir(&docroot.node(&dir))?;
                let next = match parent(&dir) {
                    Some(up) if transport.list_dir(&docroot.node(up))?.is_empty() => {
                        Some(up.to_string())
                    }
                    _ => None,
                };
                report.deleted_dirs.push(dir);
                match next {
                    Some(up) => dir = up,
                    None => break,
                }
            }
        }
    }

    tracing::info!(
        target: "lavender.fsck",
        host = docroot.host(),
        docroot = docroot.name(),
        files = report.deleted_files.len(),
        dirs = report.deleted_dirs.len(),
        "garbage collected"
    );
    Ok(report)
}

/// Parent of a docroot-relative path, `None` at the top level.
fn parent(path: &str) -> Option<&str> {
    Path::new(path)
        .parent()
        .and_then(Path::to_str)
        .filter(|parent| !parent.is_empty())
}
