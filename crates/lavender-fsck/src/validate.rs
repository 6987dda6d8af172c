use std::path::PathBuf;

use lavender_config::AllIndexPolicy;
use lavender_index::Index;
use lavender_replica::{repaired_location, Docroot};
use serde::Serialize;

use crate::error::Result;

/// Outcome of comparing the stored aggregate index with the computed one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AllIndexCheck {
    /// Not compared: dangling references, or no module indexes at all.
    Skipped,
    Ok,
    /// The computed aggregate was written to `repaired`.
    Mismatch { repaired: PathBuf },
    /// The computed aggregate replaced the stored one at `path`.
    Fixed { path: PathBuf },
}

/// Compares `stored` with `computed`. On a mismatch `computed` is quarantined, or written over
/// the stored aggregate under [`AllIndexPolicy::Repair`].
pub fn check_all_index(
    docroot: &Docroot<'_>,
    computed: &Index,
    stored: &Index,
    policy: AllIndexPolicy,
) -> Result<AllIndexCheck> {
    if computed == stored {
        return Ok(AllIndexCheck::Ok);
    }
    if policy == AllIndexPolicy::Repair {
        let path = docroot.all_index_path();
        docroot.save_index(&path, computed)?;
        tracing::warn!(
            target: "lavender.fsck",
            host = docroot.host(),
            docroot = docroot.name(),
            stored = stored.len(),
            computed = computed.len(),
            "aggregate index fixed"
        );
        return Ok(AllIndexCheck::Fixed { path });
    }
    let repaired = repaired_location(&docroot.all_index_path())?;
    docroot.save_index(&repaired, computed)?;
    tracing::warn!(
        target: "lavender.fsck",
        host = docroot.host(),
        docroot = docroot.name(),
        stored = stored.len(),
        computed = computed.len(),
        repaired = %repaired.display(),
        "aggregate index differs"
    );
    Ok(AllIndexCheck::Mismatch { repaired })
}
