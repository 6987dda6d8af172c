use std::path::PathBuf;

use serde::Serialize;

use crate::gc::GcReport;
use crate::problem::Problem;
use crate::validate::AllIndexCheck;
use crate::verify::HashMismatch;

/// Everything one fsck run found, in cluster order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FsckReport {
    pub cluster: String,
    pub docroots: Vec<DocrootReport>,
}

impl FsckReport {
    pub fn problems(&self) -> impl Iterator<Item = &Problem> + '_ {
        self.docroots.iter().flat_map(DocrootReport::problems)
    }

    pub fn is_ok(&self) -> bool {
        self.problems().next().is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DocrootReport {
    pub name: String,
    pub replicas: Vec<ReplicaReport>,
    /// Divergences between replicas, each recorded once.
    pub disagreements: Vec<Problem>,
}

impl DocrootReport {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            replicas: Vec::new(),
            disagreements: Vec::new(),
        }
    }

    pub fn problems(&self) -> impl Iterator<Item = &Problem> + '_ {
        self.replicas
            .iter()
            .flat_map(|replica| replica.problems.iter())
            .chain(self.disagreements.iter())
    }

    /// Records `problem` unless an equivalent disagreement is already known.
    pub(crate) fn record_disagreement(&mut self, problem: Problem) -> bool {
        let key = problem.disagreement_key();
        if self
            .disagreements
            .iter()
            .any(|known| known.disagreement_key() == key)
        {
            return false;
        }
        self.disagreements.push(problem);
        true
    }
}

/// The state of one docroot on one replica.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReplicaReport {
    pub host: String,
    /// The docroot does not exist on this host and was not checked.
    pub skipped: bool,
    pub index_files: Vec<String>,
    pub files: usize,
    pub references: usize,
    pub dangling: Vec<String>,
    /// Quarantined index copies written during this check.
    pub repaired: Vec<PathBuf>,
    pub all_index: AllIndexCheck,
    pub hash_mismatches: Vec<HashMismatch>,
    pub unreferenced: Vec<String>,
    pub gc: Option<GcReport>,
    /// Problems local to this replica.
    pub problems: Vec<Problem>,
}

impl ReplicaReport {
    pub(crate) fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            skipped: false,
            index_files: Vec::new(),
            files: 0,
            references: 0,
            dangling: Vec::new(),
            repaired: Vec::new(),
            all_index: AllIndexCheck::Skipped,
            hash_mismatches: Vec::new(),
            unreferenced: Vec::new(),
            gc: None,
            problems: Vec::new(),
        }
    }

    pub(crate) fn skipped(host: &str) -> Self {
        Self {
            skipped: true,
            ..Self::new(host)
        }
    }
}
