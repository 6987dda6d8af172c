//! Content hash verification through `md5sum` or `md5 -q` on the replica.

use std::collections::BTreeSet;

use lavender_config::HashTool;
use lavender_index::{Index, Label};
use lavender_replica::Docroot;
use serde::Serialize;

use crate::error::{FsckError, Result};

/// A file whose computed hash differs from the indexed one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HashMismatch {
    pub path: String,
    pub expected: String,
    pub actual: String,
}

/// Command line prefix the paths of a batch are appended to. Ends with `--`, so paths are never
/// taken for options.
pub fn hash_command(tool: HashTool) -> Vec<String> {
    let argv: &[&str] = match tool {
        HashTool::Md5sum => &["md5sum", "--"],
        HashTool::Md5 => &["md5", "-q", "--"],
    };
    argv.iter().map(|arg| arg.to_string()).collect()
}

/// Extracts one hash per output line, in order.
pub fn parse_hash_output(tool: HashTool, output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match tool {
            // `<hash>  <path>`; a leading `\` flags an escaped file name.
            HashTool::Md5sum => {
                let token = line.split_whitespace().next().unwrap_or_default();
                token.strip_prefix('\\').unwrap_or(token).to_string()
            }
            HashTool::Md5 => line.to_string(),
        })
        .collect()
}

/// Hashes the original path of every label of `index` on the replica, `batch_size` paths per
/// command, and reports the files whose content changed. Paths in `skip` are not checked.
pub fn verify(
    docroot: &Docroot<'_>,
    index: &Index,
    skip: &BTreeSet<String>,
    tool: HashTool,
    batch_size: usize,
) -> Result<Vec<HashMismatch>> {
    let labels: Vec<&Label> = index
        .iter()
        .filter(|label| !skip.contains(label.lavendelized_path()))
        .collect();

    let mut mismatches = Vec::new();
    for batch in labels.chunks(batch_size.max(1)) {
        let mut argv = hash_command(tool);
        argv.extend(batch.iter().map(|label| label.original_path().to_string()));
        let output = docroot.transport().exec(docroot.path(), &argv)?;
        let computed = parse_hash_output(tool, &output);
        if computed.len() != batch.len() {
            return Err(FsckError::HashOutputMismatch {
                host: docroot.host().to_string(),
                docroot: docroot.name().to_string(),
                expected: batch.len(),
                actual: computed.len(),
                first: batch[0].original_path().to_string(),
            });
        }

        for (label, actual) in batch.iter().zip(computed) {
            let expected = label.hash().to_hex();
            if !expected.eq_ignore_ascii_case(&actual) {
                tracing::warn!(
                    target: "lavender.fsck",
                    host = docroot.host(),
                    path = label.original_path(),
                    %expected,
                    %actual,
                    "md5 broken"
                );
                mismatches.push(HashMismatch {
                    path: label.original_path().to_string(),
                    expected,
                    actual,
                });
            }
        }
    }

    tracing::info!(
        target: "lavender.fsck",
        host = docroot.host(),
        docroot = docroot.name(),
        checked = labels.len(),
        result = if mismatches.is_empty() { "ok" } else { "failed" },
        "md5 check"
    );
    Ok(mismatches)
}
