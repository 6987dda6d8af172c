use std::collections::{BTreeMap, BTreeSet};

use lavender_config::{AllIndexPolicy, ClusterConfig, DocrootConfig, FsckConfig, GcGuard};
use lavender_index::{Index, ALL_IDX};
use lavender_replica::{Docroot, FindKind, Pool};
use rayon::prelude::*;

use crate::aggregate;
use crate::error::{FsckError, Result};
use crate::gc;
use crate::problem::Problem;
use crate::reconcile;
use crate::report::{DocrootReport, FsckReport, ReplicaReport};
use crate::validate::{self, AllIndexCheck};
use crate::verify;

/// Checks every docroot of a cluster on every host.
pub struct Fsck<'a> {
    cluster: &'a ClusterConfig,
    config: &'a FsckConfig,
    pool: Pool,
}

/// What one replica contributes to the comparison with the next one.
struct Collected {
    report: ReplicaReport,
    /// Index files by name, the stored (or fixed) aggregate included when present.
    indexes: BTreeMap<String, Index>,
    unreferenced: BTreeSet<String>,
}

impl<'a> Fsck<'a> {
    pub fn new(cluster: &'a ClusterConfig, config: &'a FsckConfig) -> Self {
        Self::with_pool(cluster, config, Pool::new(config.max_connections))
    }

    pub fn with_pool(cluster: &'a ClusterConfig, config: &'a FsckConfig, pool: Pool) -> Self {
        Self {
            cluster,
            config,
            pool,
        }
    }

    pub fn run(&self) -> Result<FsckReport> {
        let docroots = &self.cluster.docroots;
        let reports = match self.thread_pool() {
            Some(threads) => threads.install(|| {
                docroots
                    .par_iter()
                    .map(|docroot| self.check_docroot(docroot))
                    .collect::<Result<Vec<_>>>()
            })?,
            None => docroots
                .iter()
                .map(|docroot| self.check_docroot(docroot))
                .collect::<Result<Vec<_>>>()?,
        };

        let report = FsckReport {
            cluster: self.cluster.name.clone(),
            docroots: reports,
        };
        tracing::info!(
            target: "lavender.fsck",
            cluster = %report.cluster,
            problems = report.problems().count(),
            "fsck finished"
        );
        Ok(report)
    }

    fn thread_pool(&self) -> Option<rayon::ThreadPool> {
        let threads = self.config.jobs.min(self.cluster.docroots.len());
        if threads <= 1 {
            return None;
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("lavender-fsck-{idx}"))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(err) => {
                tracing::warn!(
                    target: "lavender.fsck",
                    error = %err,
                    "failed to start worker threads, checking docroots sequentially"
                );
                None
            }
        }
    }

    fn check_docroot(&self, config: &DocrootConfig) -> Result<DocrootReport> {
        let mut report = DocrootReport::new(&config.name);
        let mut previous: Option<BTreeMap<String, Index>> = None;

        for host in &self.cluster.hosts {
            let lease = self.pool.lease(host)?;
            let docroot = Docroot::new(&*lease, config);
            tracing::info!(
                target: "lavender.fsck",
                host = %host.name,
                docroot = %config.name,
                "checking"
            );

            if !docroot.exists()? {
                tracing::info!(
                    target: "lavender.fsck",
                    host = %host.name,
                    path = %docroot.path().display(),
                    "docroot does not exist, skipping"
                );
                report.replicas.push(ReplicaReport::skipped(&host.name));
                continue;
            }

            let Collected {
                report: mut replica,
                indexes,
                unreferenced,
            } = self.collect(&docroot)?;

            if let Some(previous) = &previous {
                for problem in compare(&host.name, previous, &indexes) {
                    tracing::error!(target: "lavender.fsck", docroot = %config.name, "{problem}");
                    report.record_disagreement(problem);
                }
            }

            if self.config.gc && !unreferenced.is_empty() {
                let open = match self.config.gc_guard {
                    GcGuard::Replica => replica.problems.len(),
                    GcGuard::Docroot => replica.problems.len() + report.problems().count(),
                };
                if open > 0 {
                    return Err(FsckError::GcNotAllowed {
                        host: host.name.clone(),
                        docroot: config.name.clone(),
                        problems: open,
                    });
                }
                replica.gc = Some(gc::collect(&docroot, &unreferenced)?);
            }

            // A replica with problems of its own is a baseline only until a clean one is seen.
            if replica.problems.is_empty() || previous.is_none() {
                previous = Some(indexes);
            }
            report.replicas.push(replica);
        }
        Ok(report)
    }

    /// Runs the local checks of one replica.
    fn collect(&self, docroot: &Docroot<'_>) -> Result<Collected> {
        let host = docroot.host();
        let mut report = ReplicaReport::new(host);

        let files: BTreeSet<String> = docroot
            .transport()
            .find(docroot.path(), FindKind::Files)?
            .into_iter()
            .collect();
        report.files = files.len();

        let aggregate = aggregate::build(docroot)?;
        report.index_files = aggregate.indexes.keys().cloned().collect();
        report.references = aggregate.references.len();
        tracing::info!(
            target: "lavender.fsck",
            host,
            docroot = docroot.name(),
            files = report.files,
            references = report.references,
            "collected"
        );

        let all_path = docroot.all_index_path();
        let mut stored_all = docroot.load_optional_index(&all_path)?;

        let dangling = reconcile::dangling(&files, &aggregate.references);
        if !dangling.is_empty() {
            tracing::error!(
                target: "lavender.fsck",
                host,
                docroot = docroot.name(),
                count = dangling.len(),
                "dangling references"
            );
            for path in &dangling {
                tracing::debug!(target: "lavender.fsck", host, %path, "dangling");
            }
            report.repaired = reconcile::quarantine(docroot, &aggregate, &dangling)?;
            report.dangling = dangling.iter().cloned().collect();
            report.problems.push(Problem::DanglingReferences {
                host: host.to_string(),
                paths: report.dangling.clone(),
            });
            tracing::debug!(
                target: "lavender.fsck",
                host,
                "skipping aggregate index check because of dangling references"
            );
        } else if !aggregate.indexes.is_empty() {
            let empty = Index::new();
            let stored = stored_all.as_ref().unwrap_or(&empty);
            let policy = self.config.all_index_policy;
            report.all_index =
                validate::check_all_index(docroot, &aggregate.all, stored, policy)?;
            match &report.all_index {
                AllIndexCheck::Mismatch { repaired } => {
                    report.repaired.push(repaired.clone());
                    if policy == AllIndexPolicy::Fail {
                        report.problems.push(Problem::AllIndexMismatch {
                            host: host.to_string(),
                            repaired: repaired.clone(),
                        });
                    } else {
                        tracing::warn!(
                            target: "lavender.fsck",
                            host,
                            docroot = docroot.name(),
                            "aggregate index mismatch tolerated"
                        );
                    }
                }
                AllIndexCheck::Fixed { .. } => stored_all = Some(aggregate.all.clone()),
                AllIndexCheck::Skipped | AllIndexCheck::Ok => {}
            }
        }

        if self.config.md5_check {
            report.hash_mismatches = verify::verify(
                docroot,
                &aggregate.all,
                &dangling,
                self.config.hash_tool,
                self.config.batch_size,
            )?;
            report
                .problems
                .extend(report.hash_mismatches.iter().map(|m| Problem::HashMismatch {
                    host: host.to_string(),
                    path: m.path.clone(),
                    expected: m.expected.clone(),
                    actual: m.actual.clone(),
                }));
        }

        let unreferenced = gc::unreferenced(&files, &aggregate.references);
        report.unreferenced = unreferenced.iter().cloned().collect();
        if !unreferenced.is_empty() {
            tracing::warn!(
                target: "lavender.fsck",
                host,
                docroot = docroot.name(),
                count = unreferenced.len(),
                "unreferenced files"
            );
            if !self.config.gc {
                for path in &unreferenced {
                    tracing::debug!(target: "lavender.fsck", host, %path, "unreferenced");
                }
                report.problems.push(Problem::UnreferencedFiles {
                    host: host.to_string(),
                    paths: report.unreferenced.clone(),
                });
            }
        }

        let mut indexes = aggregate.indexes;
        if let Some(stored_all) = stored_all {
            indexes.insert(ALL_IDX.to_string(), stored_all);
        }
        Ok(Collected {
            report,
            indexes,
            unreferenced,
        })
    }
}

/// Disagreements of `current` (on `host`) with the indexes of an earlier replica.
fn compare(
    host: &str,
    previous: &BTreeMap<String, Index>,
    current: &BTreeMap<String, Index>,
) -> Vec<Problem> {
    if !previous.keys().eq(current.keys()) {
        return vec![Problem::IndexListDiffers {
            host: host.to_string(),
            expected: previous.keys().cloned().collect(),
            actual: current.keys().cloned().collect(),
        }];
    }
    previous
        .iter()
        .filter(|(name, index)| current.get(*name) != Some(*index))
        .map(|(name, _)| Problem::IndexDiffers {
            host: host.to_string(),
            name: name.clone(),
        })
        .collect()
}
