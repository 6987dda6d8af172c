use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use lavender_config::{
    init_tracing, AllIndexPolicy, ClusterConfig, FsckConfig, GcGuard, HashTool, LavenderConfig,
};
use lavender_fsck::{AllIndexCheck, Fsck, FsckReport, ReplicaReport};

#[derive(Parser)]
#[command(
    name = "lavender",
    version,
    about = "Lavender cluster tools (consistency check, integrity check, garbage collection)"
)]
struct Cli {
    /// Config file (defaults to $LAVENDER_CONFIG, then ./lavender.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check every docroot of a cluster on all of its hosts
    Fsck(FsckArgs),
    /// List configured clusters
    Clusters(ClustersArgs),
}

#[derive(Args)]
struct FsckArgs {
    /// Cluster name from the config file
    cluster: String,
    /// Verify file content against the indexed md5 hashes
    #[arg(long)]
    md5: bool,
    /// Delete unreferenced files and empty directories
    #[arg(long)]
    gc: bool,
    /// Hosts run BSD `md5 -q` instead of GNU `md5sum`
    #[arg(long)]
    mac: bool,
    /// Report a stale aggregate index as a warning only
    #[arg(long)]
    tolerate_all_index: bool,
    /// Overwrite a stale aggregate index with the computed one
    #[arg(long, conflicts_with = "tolerate_all_index")]
    repair_all_index: bool,
    /// Which open problems block garbage collection
    #[arg(long, value_enum)]
    gc_guard: Option<GuardArg>,
    /// Number of docroots checked in parallel
    #[arg(long)]
    jobs: Option<usize>,
    /// Emit the full report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ClustersArgs {
    /// Emit JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum GuardArg {
    Replica,
    Docroot,
}

impl From<GuardArg> for GcGuard {
    fn from(arg: GuardArg) -> Self {
        match arg {
            GuardArg::Replica => GcGuard::Replica,
            GuardArg::Docroot => GcGuard::Docroot,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            2
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Result<i32> {
    let path = LavenderConfig::discover(cli.config.as_deref());
    let config = LavenderConfig::load_from_path(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    init_tracing(&config.logging);

    match cli.command {
        Command::Fsck(args) => {
            let cluster = config.cluster(&args.cluster)?;
            let options = args.apply(config.fsck.clone());
            let report = Fsck::new(cluster, &options)
                .run()
                .with_context(|| format!("fsck of cluster `{}`", cluster.name))?;

            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            if report.is_ok() {
                if !args.json {
                    println!("ok");
                }
                Ok(0)
            } else {
                eprintln!("FSCK FAILED");
                Ok(1)
            }
        }
        Command::Clusters(args) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&config.clusters)?);
            } else {
                for cluster in &config.clusters {
                    print_cluster(cluster);
                }
            }
            Ok(0)
        }
    }
}

impl FsckArgs {
    /// Command line flags override the config file.
    fn apply(&self, mut config: FsckConfig) -> FsckConfig {
        config.md5_check |= self.md5;
        config.gc |= self.gc;
        if self.mac {
            config.hash_tool = HashTool::Md5;
        }
        if self.tolerate_all_index {
            config.all_index_policy = AllIndexPolicy::Tolerate;
        }
        if self.repair_all_index {
            config.all_index_policy = AllIndexPolicy::Repair;
        }
        if let Some(guard) = self.gc_guard {
            config.gc_guard = guard.into();
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs.max(1);
        }
        config
    }
}

fn print_report(report: &FsckReport) {
    for docroot in &report.docroots {
        for replica in &docroot.replicas {
            println!("{} {}", replica.host, docroot.name);
            print_replica(replica);
        }
    }
    let problems: Vec<_> = report.problems().collect();
    if !problems.is_empty() {
        println!("problems: {}", problems.len());
        for problem in problems {
            println!("  {problem}");
        }
    }
}

fn print_replica(replica: &ReplicaReport) {
    if replica.skipped {
        println!("  docroot does not exist, skipped");
        return;
    }
    println!("  files: {}", replica.files);
    println!("  references: {}", replica.references);
    println!("  dangling references: {}", replica.dangling.len());
    match &replica.all_index {
        AllIndexCheck::Skipped => {}
        AllIndexCheck::Ok => println!("  aggregate index: ok"),
        AllIndexCheck::Mismatch { repaired } => {
            println!("  aggregate index: differs, see {}", repaired.display())
        }
        AllIndexCheck::Fixed { path } => println!("  aggregate index: fixed {}", path.display()),
    }
    for path in &replica.repaired {
        println!("  repaired index: {}", path.display());
    }
    if !replica.hash_mismatches.is_empty() {
        println!("  md5 broken: {}", replica.hash_mismatches.len());
    }
    println!("  unreferenced files: {}", replica.unreferenced.len());
    if let Some(gc) = &replica.gc {
        println!(
            "  gc: deleted {} files, {} directories",
            gc.deleted_files.len(),
            gc.deleted_dirs.len()
        );
    }
}

fn print_cluster(cluster: &ClusterConfig) {
    println!("{}", cluster.name);
    for host in &cluster.hosts {
        println!("  host {} ({:?}, root {})", host.name, host.kind, host.root.display());
    }
    for docroot in &cluster.docroots {
        println!(
            "  docroot {}: {} (indexes {})",
            docroot.name,
            docroot.docroot.display(),
            docroot.indexes.display()
        );
    }
}
