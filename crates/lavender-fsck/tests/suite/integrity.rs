use std::path::Path;
use std::sync::Arc;

use lavender_config::{FsckConfig, HashTool, HostConfig};
use lavender_fsck::{Fsck, FsckError, HashMismatch, Problem};
use lavender_index::{ContentHash, Index, Label};
use lavender_replica::{LocalTransport, Pool, Transport};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use super::support::{lavendelized, Fixture};

/// Local transport that runs hash commands through GNU `md5sum`, whatever tool is requested,
/// and reshapes the output.
struct Scripted {
    inner: LocalTransport,
    batches: Arc<Mutex<Vec<usize>>>,
    drop_last_line: bool,
}

impl Transport for Scripted {
    fn host(&self) -> &str {
        self.inner.host()
    }

    fn root(&self) -> &Path {
        self.inner.root()
    }

    fn exists(&self, path: &Path) -> lavender_replica::Result<bool> {
        self.inner.exists(path)
    }

    fn exec(&self, dir: &Path, argv: &[String]) -> lavender_replica::Result<String> {
        let (quiet, paths) = match argv[0].as_str() {
            "md5sum" => (false, &argv[2..]),
            "md5" => (true, &argv[3..]),
            _ => return self.inner.exec(dir, argv),
        };
        self.batches.lock().push(paths.len());

        let mut md5sum = vec!["md5sum".to_string(), "--".to_string()];
        md5sum.extend(paths.iter().cloned());
        let output = self.inner.exec(dir, &md5sum)?;
        let mut lines: Vec<String> = output
            .lines()
            .map(|line| {
                if quiet {
                    line.split_whitespace().next().unwrap().to_string()
                } else {
                    line.to_string()
                }
            })
            .collect();
        if self.drop_last_line {
            lines.pop();
        }
        Ok(lines.iter().map(|line| format!("{line}\n")).collect())
    }

    fn read_to_string(&self, path: &Path) -> lavender_replica::Result<String> {
        self.inner.read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> lavender_replica::Result<()> {
        self.inner.write(path, contents)
    }

    fn list_dir(&self, path: &Path) -> lavender_replica::Result<Vec<String>> {
        self.inner.list_dir(path)
    }

    fn delete_file(&self, path: &Path) -> lavender_replica::Result<()> {
        self.inner.delete_file(path)
    }

    fn delete_dir(&self, path: &Path) -> lavender_replica::Result<()> {
        self.inner.delete_dir(path)
    }
}

fn scripted_pool(drop_last_line: bool) -> (Pool, Arc<Mutex<Vec<usize>>>) {
    let batches = Arc::new(Mutex::new(Vec::new()));
    let recorded = batches.clone();
    let pool = Pool::with_connector(1, move |host: &HostConfig| {
        Ok(Box::new(Scripted {
            inner: LocalTransport::new(&host.name, &host.root),
            batches: recorded.clone(),
            drop_last_line,
        }) as Box<dyn Transport>)
    });
    (pool, batches)
}

fn five_files() -> Fixture {
    let fixture = Fixture::new(&["web1"]);
    let replica = fixture.replica("web1");
    let css = replica.publish(
        "css.idx",
        &[
            ("a.css", b"a"),
            ("b.css", b"b"),
            ("c.css", b"c"),
            ("d.css", b"d"),
            ("e.css", b"e"),
        ],
    );
    replica.seal(&[&css]);
    fixture
}

fn md5(tool: HashTool, batch_size: usize) -> FsckConfig {
    FsckConfig {
        md5_check: true,
        hash_tool: tool,
        batch_size,
        ..FsckConfig::default()
    }
}

#[test]
fn changed_content_is_reported_by_path() {
    let fixture = five_files();
    let replica = fixture.replica("web1");
    let broken = lavendelized("c.css", b"c");
    replica.put(&broken, b"tampered");

    let report = fixture.run(&md5(HashTool::Md5sum, 2)).unwrap();
    let result = &report.docroots[0].replicas[0];
    let expected = HashMismatch {
        path: broken.clone(),
        expected: ContentHash::digest(b"c").to_hex(),
        actual: ContentHash::digest(b"tampered").to_hex(),
    };
    assert_eq!(result.hash_mismatches, vec![expected.clone()]);
    assert_eq!(
        result.problems,
        vec![Problem::HashMismatch {
            host: "web1".into(),
            path: expected.path,
            expected: expected.expected,
            actual: expected.actual,
        }]
    );
}

#[test]
fn paths_are_hashed_in_bounded_batches() {
    let fixture = five_files();
    let (pool, batches) = scripted_pool(false);
    let config = md5(HashTool::Md5sum, 2);

    let report = Fsck::with_pool(&fixture.cluster, &config, pool).run().unwrap();
    assert!(report.is_ok());
    assert_eq!(*batches.lock(), vec![2, 2, 1]);
}

#[test]
fn quiet_md5_output_is_paired_by_position() {
    let fixture = five_files();
    fixture
        .replica("web1")
        .put(&lavendelized("e.css", b"e"), b"tampered");
    let (pool, batches) = scripted_pool(false);
    let config = md5(HashTool::Md5, 500);

    let report = Fsck::with_pool(&fixture.cluster, &config, pool).run().unwrap();
    let mismatches = &report.docroots[0].replicas[0].hash_mismatches;
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].path, lavendelized("e.css", b"e"));
    assert_eq!(*batches.lock(), vec![5]);
}

#[test]
fn short_hash_output_is_fatal() {
    let fixture = five_files();
    let (pool, _) = scripted_pool(true);
    let config = md5(HashTool::Md5sum, 3);

    let err = Fsck::with_pool(&fixture.cluster, &config, pool)
        .run()
        .unwrap_err();
    assert!(
        matches!(
            err,
            FsckError::HashOutputMismatch {
                expected: 3,
                actual: 2,
                ..
            }
        ),
        "{err}"
    );
}

#[test]
fn dangling_paths_are_not_hashed() {
    let fixture = five_files();
    let replica = fixture.replica("web1");
    std::fs::remove_file(replica.docroot.join(lavendelized("a.css", b"a"))).unwrap();
    let (pool, batches) = scripted_pool(false);
    let config = md5(HashTool::Md5sum, 500);

    let report = Fsck::with_pool(&fixture.cluster, &config, pool).run().unwrap();
    let result = &report.docroots[0].replicas[0];
    assert_eq!(result.dangling.len(), 1);
    assert!(result.hash_mismatches.is_empty());
    assert_eq!(*batches.lock(), vec![4]);
}

#[test]
fn paths_that_look_like_options_are_hashed() {
    let fixture = Fixture::new(&["web1"]);
    let replica = fixture.replica("web1");
    replica.put("-n.css", b"n");
    let module =
        Index::from_labels([Label::new("n.css", "-n.css", ContentHash::digest(b"n"))]).unwrap();
    replica.write_index("css.idx", &module);
    replica.seal(&[&module]);

    let report = fixture.run(&md5(HashTool::Md5sum, 500)).unwrap();
    assert!(report.is_ok(), "{:?}", report.problems().collect::<Vec<_>>());
}
