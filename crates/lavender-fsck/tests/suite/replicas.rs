use lavender_config::{AllIndexPolicy, FsckConfig};
use lavender_fsck::{FsckReport, Problem};
use lavender_index::Index;
use pretty_assertions::assert_eq;

use super::support::{aggregate, Fixture, Replica};

const HOSTS: [&str; 3] = ["web1", "web2", "web3"];

fn publish(replica: &Replica) -> Index {
    let css = replica.publish("css.idx", &[("a.css", b"a"), ("b.css", b"b")]);
    let js = replica.publish("js.idx", &[("c.js", b"c")]);
    replica.seal(&[&css, &js]);
    aggregate(&[&css, &js])
}

#[test]
fn identical_replicas_agree() {
    let fixture = Fixture::new(&HOSTS);
    for host in HOSTS {
        publish(&fixture.replica(host));
    }

    let report = fixture.run(&FsckConfig::default()).unwrap();
    assert!(report.is_ok(), "{:?}", report.problems().collect::<Vec<_>>());
    assert_eq!(report.docroots[0].replicas.len(), 3);
    assert!(report.docroots[0].disagreements.is_empty());
}

/// Three replicas where `odd` stores an `.all.idx` missing one label.
fn with_odd_aggregate(odd: &str) -> Fixture {
    let fixture = Fixture::new(&HOSTS);
    for host in HOSTS {
        let replica = fixture.replica(host);
        let mut all = publish(&replica);
        if host == odd {
            let first = all.lavendelized_paths().next().unwrap().to_string();
            all.remove(&first);
            replica.write_all_index(&all);
        }
    }
    fixture
}

fn assert_one_aggregate_disagreement(report: &FsckReport, odd: &str) {
    let disagreements = &report.docroots[0].disagreements;
    assert_eq!(disagreements.len(), 1, "odd replica {odd}: {disagreements:?}");
    assert!(
        matches!(&disagreements[0], Problem::IndexDiffers { name, .. } if name == ".all.idx"),
        "odd replica {odd}: {disagreements:?}"
    );
}

#[test]
fn odd_aggregate_index_is_reported_once_wherever_it_is() {
    for odd in HOSTS {
        let report = with_odd_aggregate(odd).run(&FsckConfig::default()).unwrap();
        assert_one_aggregate_disagreement(&report, odd);
        // The odd replica's own mismatch comes on top.
        let mismatches: Vec<_> = report
            .problems()
            .filter(|p| matches!(p, Problem::AllIndexMismatch { .. }))
            .map(|p| p.host().to_string())
            .collect();
        assert_eq!(mismatches, vec![odd.to_string()]);
        assert_eq!(report.problems().count(), 2, "odd replica {odd}");
    }
}

#[test]
fn tolerated_odd_aggregate_index_is_only_a_disagreement() {
    let config = FsckConfig {
        all_index_policy: AllIndexPolicy::Tolerate,
        ..FsckConfig::default()
    };
    for odd in HOSTS {
        let report = with_odd_aggregate(odd).run(&config).unwrap();
        assert_one_aggregate_disagreement(&report, odd);
        assert_eq!(report.problems().count(), 1, "odd replica {odd}");
    }
}

#[test]
fn missing_index_file_is_a_list_difference() {
    let fixture = Fixture::new(&["web1", "web2"]);
    publish(&fixture.replica("web1"));
    let replica = fixture.replica("web2");
    let css = replica.publish("css.idx", &[("a.css", b"a"), ("b.css", b"b")]);
    replica.seal(&[&css]);

    let report = fixture.run(&FsckConfig::default()).unwrap();
    assert_eq!(
        report.docroots[0].disagreements,
        vec![Problem::IndexListDiffers {
            host: "web2".into(),
            expected: vec![".all.idx".into(), "css.idx".into(), "js.idx".into()],
            actual: vec![".all.idx".into(), "css.idx".into()],
        }]
    );
    assert!(!report.is_ok());
}

#[test]
fn replica_with_local_problem_is_not_compared_against() {
    let fixture = Fixture::new(&HOSTS);
    for host in HOSTS {
        publish(&fixture.replica(host));
    }
    // web1 has an unreferenced file but the same indexes, so nobody disagrees with it.
    fixture.replica("web1").put("stray.txt", b"stray");

    let report = fixture.run(&FsckConfig::default()).unwrap();
    let problems: Vec<_> = report.problems().collect();
    assert_eq!(problems.len(), 1, "{problems:?}");
    assert_eq!(problems[0].host(), "web1");
    assert!(report.docroots[0].disagreements.is_empty());
}

#[test]
fn missing_docroot_is_skipped() {
    let fixture = Fixture::new(&["web1", "web2"]);
    publish(&fixture.replica("web1"));

    let report = fixture.run(&FsckConfig::default()).unwrap();
    assert!(report.is_ok());
    let replicas = &report.docroots[0].replicas;
    assert!(!replicas[0].skipped);
    assert!(replicas[1].skipped);
    assert_eq!(replicas[1].host, "web2");
}

#[test]
fn parallel_docroots_keep_cluster_order() {
    let names = ["www", "static", "media", "assets"];
    let fixture = Fixture::with_docroots(&["web1", "web2"], &names);
    for host in ["web1", "web2"] {
        for name in names {
            publish(&fixture.replica_of(host, name));
        }
    }
    fixture.replica_of("web2", "media").put("stray.txt", b"stray");

    let config = FsckConfig {
        jobs: 3,
        max_connections: 2,
        ..FsckConfig::default()
    };
    let report = fixture.run(&config).unwrap();
    let order: Vec<_> = report.docroots.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(order, names);
    for docroot in &report.docroots {
        let hosts: Vec<_> = docroot.replicas.iter().map(|r| r.host.as_str()).collect();
        assert_eq!(hosts, ["web1", "web2"]);
    }
    let failing: Vec<_> = report
        .docroots
        .iter()
        .filter(|d| d.problems().next().is_some())
        .map(|d| d.name.as_str())
        .collect();
    assert_eq!(failing, ["media"]);
}
