use std::fs;

use lavender_config::{AllIndexPolicy, FsckConfig};
use lavender_fsck::{AllIndexCheck, FsckError, Problem};
use lavender_index::{ContentHash, Index, Label};
use lavender_replica::ReplicaError;
use pretty_assertions::assert_eq;

use super::support::{aggregate, lavendelized, module_index, Fixture};

#[test]
fn dangling_reference_is_quarantined() {
    let fixture = Fixture::new(&["web1"]);
    let replica = fixture.replica("web1");
    let css = replica.publish("css.idx", &[("a.css", b"a"), ("b.css", b"b")]);
    let js = replica.publish("js.idx", &[("c.js", b"c")]);
    replica.seal(&[&css, &js]);
    let gone = lavendelized("b.css", b"b");
    fs::remove_file(replica.docroot.join(&gone)).unwrap();

    let report = fixture.run(&FsckConfig::default()).unwrap();
    let result = &report.docroots[0].replicas[0];
    assert_eq!(result.dangling, vec![gone.clone()]);
    assert_eq!(result.all_index, AllIndexCheck::Skipped);
    assert_eq!(result.repaired, vec![replica.repaired("css.idx")]);
    assert_eq!(
        result.problems,
        vec![Problem::DanglingReferences {
            host: "web1".into(),
            paths: vec![gone],
        }]
    );

    let repaired = Index::load(&replica.repaired("css.idx")).unwrap();
    assert_eq!(repaired, module_index(&[("a.css", b"a")]));
    // Originals stay untouched and unaffected modules get no copy.
    assert_eq!(Index::load(&replica.index_path("css.idx")).unwrap(), css);
    assert!(!replica.repaired("js.idx").exists());
}

#[test]
fn stale_aggregate_index_fails_and_is_quarantined() {
    let fixture = Fixture::new(&["web1"]);
    let replica = fixture.replica("web1");
    let css = replica.publish("css.idx", &[("a.css", b"a"), ("b.css", b"b")]);
    let stale = module_index(&[("a.css", b"a")]);
    replica.seal(&[&stale]);

    let report = fixture.run(&FsckConfig::default()).unwrap();
    let result = &report.docroots[0].replicas[0];
    let repaired = replica.repaired(".all.idx");
    assert_eq!(
        result.all_index,
        AllIndexCheck::Mismatch {
            repaired: repaired.clone()
        }
    );
    assert_eq!(
        result.problems,
        vec![Problem::AllIndexMismatch {
            host: "web1".into(),
            repaired: repaired.clone(),
        }]
    );
    assert_eq!(Index::load(&repaired).unwrap(), aggregate(&[&css]));
    assert_eq!(
        Index::load(&replica.index_path(".all.idx")).unwrap(),
        aggregate(&[&stale])
    );
}

#[test]
fn tolerated_aggregate_mismatch_is_not_a_problem() {
    let fixture = Fixture::new(&["web1"]);
    let replica = fixture.replica("web1");
    replica.publish("css.idx", &[("a.css", b"a")]);

    let config = FsckConfig {
        all_index_policy: AllIndexPolicy::Tolerate,
        ..FsckConfig::default()
    };
    let report = fixture.run(&config).unwrap();
    assert!(report.is_ok());
    // A missing aggregate compares as empty.
    assert!(matches!(
        report.docroots[0].replicas[0].all_index,
        AllIndexCheck::Mismatch { .. }
    ));
    assert!(replica.repaired(".all.idx").exists());
}

#[test]
fn repaired_aggregate_index_replaces_the_stored_one() {
    let fixture = Fixture::new(&["web1"]);
    let replica = fixture.replica("web1");
    let css = replica.publish("css.idx", &[("a.css", b"a"), ("b.css", b"b")]);
    replica.seal(&[&module_index(&[("a.css", b"a")])]);

    let config = FsckConfig {
        all_index_policy: AllIndexPolicy::Repair,
        ..FsckConfig::default()
    };
    let report = fixture.run(&config).unwrap();
    assert!(report.is_ok(), "{:?}", report.problems().collect::<Vec<_>>());
    let result = &report.docroots[0].replicas[0];
    assert_eq!(
        result.all_index,
        AllIndexCheck::Fixed {
            path: replica.index_path(".all.idx")
        }
    );
    assert!(result.repaired.is_empty());
    assert!(!replica.repaired(".all.idx").exists());
    assert_eq!(
        Index::load(&replica.index_path(".all.idx")).unwrap(),
        aggregate(&[&css])
    );

    // A second run finds nothing to fix.
    let report = fixture.run(&config).unwrap();
    assert_eq!(report.docroots[0].replicas[0].all_index, AllIndexCheck::Ok);
}

#[test]
fn docroot_without_indexes_skips_the_aggregate_check() {
    let fixture = Fixture::new(&["web1"]);
    fixture.replica("web1");

    let report = fixture.run(&FsckConfig::default()).unwrap();
    assert!(report.is_ok());
    assert_eq!(report.docroots[0].replicas[0].all_index, AllIndexCheck::Skipped);
}

#[test]
fn unparsable_index_aborts_the_run() {
    let fixture = Fixture::new(&["web1"]);
    let replica = fixture.replica("web1");
    fs::create_dir_all(&replica.indexes).unwrap();
    fs::write(replica.index_path("css.idx"), "not an index line\n").unwrap();

    let err = fixture.run(&FsckConfig::default()).unwrap_err();
    assert!(
        matches!(
            err,
            FsckError::Replica(ReplicaError::CorruptIndex { .. })
        ),
        "{err}"
    );
    assert!(err.to_string().contains("css.idx"), "{err}");
}

#[test]
fn conflicting_module_indexes_abort_the_run() {
    let fixture = Fixture::new(&["web1"]);
    let replica = fixture.replica("web1");
    let css = replica.publish("css.idx", &[("a.css", b"a")]);
    let path = css.iter().next().unwrap().lavendelized_path().to_string();
    let mut other = Index::new();
    other
        .add(Label::new("a.css", path, ContentHash::digest(b"other")))
        .unwrap();
    replica.write_index("other.idx", &other);

    let err = fixture.run(&FsckConfig::default()).unwrap_err();
    let FsckError::Index { path, .. } = &err else {
        panic!("expected an index conflict, got {err}");
    };
    assert_eq!(path, &replica.index_path("other.idx"));
}
