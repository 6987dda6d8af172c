use std::fs;
use std::path::PathBuf;

use lavender_config::{ClusterConfig, DocrootConfig, FsckConfig, HostConfig};
use lavender_fsck::{Fsck, FsckReport, Result};
use lavender_index::{Index, Label, ALL_IDX};
use tempfile::TempDir;

pub const DOCROOT: &str = "www";

/// A cluster of local replicas, one directory per host below a temp dir.
pub struct Fixture {
    // Held for its Drop.
    _tmp: TempDir,
    pub cluster: ClusterConfig,
}

impl Fixture {
    pub fn new(hosts: &[&str]) -> Self {
        Self::with_docroots(hosts, &[DOCROOT])
    }

    pub fn with_docroots(hosts: &[&str], docroots: &[&str]) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let cluster = ClusterConfig {
            name: "test".to_string(),
            hosts: hosts
                .iter()
                .map(|host| HostConfig::local(*host, tmp.path().join(host)))
                .collect(),
            docroots: docroots
                .iter()
                .map(|name| DocrootConfig {
                    name: name.to_string(),
                    docroot: PathBuf::from(format!("var/{name}/htdocs")),
                    indexes: PathBuf::from(format!("var/{name}/indexes/{name}")),
                })
                .collect(),
        };
        Self { _tmp: tmp, cluster }
    }

    pub fn replica(&self, host: &str) -> Replica {
        self.replica_of(host, DOCROOT)
    }

    pub fn replica_of(&self, host: &str, docroot: &str) -> Replica {
        let host = self
            .cluster
            .hosts
            .iter()
            .find(|h| h.name == host)
            .unwrap();
        let docroot = self
            .cluster
            .docroots
            .iter()
            .find(|d| d.name == docroot)
            .unwrap();
        let replica = Replica {
            docroot: host.root.join(&docroot.docroot),
            indexes: host.root.join(&docroot.indexes),
        };
        fs::create_dir_all(&replica.docroot).unwrap();
        replica
    }

    pub fn run(&self, config: &FsckConfig) -> Result<FsckReport> {
        Fsck::new(&self.cluster, config).run()
    }
}

/// One docroot on one host of a [`Fixture`].
pub struct Replica {
    pub docroot: PathBuf,
    pub indexes: PathBuf,
}

impl Replica {
    /// Writes `data` at the docroot-relative `path`.
    pub fn put(&self, path: &str, data: &[u8]) {
        let path = self.docroot.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    pub fn has(&self, path: &str) -> bool {
        self.docroot.join(path).exists()
    }

    pub fn index_path(&self, name: &str) -> PathBuf {
        self.indexes.join(name)
    }

    pub fn write_index(&self, name: &str, index: &Index) {
        index.save(&self.index_path(name)).unwrap();
    }

    pub fn write_all_index(&self, index: &Index) {
        self.write_index(ALL_IDX, index);
    }

    /// Publishes `files` as the module index `name`: content under its lavendelized path plus
    /// the index file. Returns the index.
    pub fn publish(&self, name: &str, files: &[(&str, &[u8])]) -> Index {
        for (path, data) in files {
            self.put(&lavendelized(path, data), data);
        }
        let index = module_index(files);
        self.write_index(name, &index);
        index
    }

    /// Writes the aggregate of `modules` as the stored `.all.idx`.
    pub fn seal(&self, modules: &[&Index]) -> Index {
        let all = aggregate(modules);
        self.write_all_index(&all);
        all
    }

    pub fn repaired(&self, name: &str) -> PathBuf {
        lavender_replica::repaired_location(&self.index_path(name)).unwrap()
    }
}

pub fn module_index(files: &[(&str, &[u8])]) -> Index {
    Index::from_labels(
        files
            .iter()
            .map(|(path, data)| Label::for_bytes(path, "folder", data)),
    )
    .unwrap()
}

pub fn aggregate(modules: &[&Index]) -> Index {
    let mut all = Index::new();
    for module in modules {
        for label in module.iter() {
            all.add_reference(label.lavendelized_path(), label.hash())
                .unwrap();
        }
    }
    all
}

pub fn lavendelized(path: &str, data: &[u8]) -> String {
    Label::for_bytes(path, "folder", data)
        .lavendelized_path()
        .to_string()
}
