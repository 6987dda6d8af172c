//! Configuration for Lavender: the cluster topology, fsck policy and logging.
//!
//! Configuration is a single TOML file, `lavender.toml` by default. See [`LavenderConfig`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod logging;
mod validation;

pub use logging::{init_tracing, LoggingConfig};
pub use validation::ConfigValidationError;

/// Default config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "lavender.toml";

/// Environment variable overriding the config file location.
pub const CONFIG_ENV_VAR: &str = "LAVENDER_CONFIG";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LavenderConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub fsck: FsckConfig,
    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,
}

/// A set of hosts that each carry a replica of the same docroots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    pub name: String,
    /// Replica hosts, in the order they are checked.
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
    #[serde(default)]
    pub docroots: Vec<DocrootConfig>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKind {
    /// The replica lives on a locally mounted filesystem.
    #[default]
    Local,
    /// The replica is reached by running commands over `ssh`.
    Ssh,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    pub name: String,
    #[serde(default)]
    pub kind: HostKind,
    /// Directory docroot and index paths are relative to.
    #[serde(default = "HostConfig::default_root")]
    pub root: PathBuf,
    /// Command prefix used to reach an ssh host; the remote command line is appended as the last
    /// argument. Defaults to `ssh -o BatchMode=yes <name>`.
    #[serde(default)]
    pub command: Vec<String>,
    /// Kill a single command after this many seconds.
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
}

impl HostConfig {
    fn default_root() -> PathBuf {
        PathBuf::from("/")
    }

    pub fn local(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            kind: HostKind::Local,
            root: root.into(),
            command: Vec::new(),
            command_timeout_secs: None,
        }
    }

    pub fn ssh(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            kind: HostKind::Ssh,
            ..Self::local(name, root)
        }
    }

    /// The effective ssh command prefix.
    pub fn ssh_command(&self) -> Vec<String> {
        if self.command.is_empty() {
            vec![
                "ssh".to_string(),
                "-o".to_string(),
                "BatchMode=yes".to_string(),
                self.name.clone(),
            ]
        } else {
            self.command.clone()
        }
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocrootConfig {
    pub name: String,
    /// Published files, relative to the host root.
    pub docroot: PathBuf,
    /// Directory holding the per-module index files, relative to the host root.
    pub indexes: PathBuf,
}

/// How the hashes reported by the remote hash tool are formatted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashTool {
    /// GNU `md5sum <paths>`: `<hash>  <path>` per line.
    #[default]
    Md5sum,
    /// BSD `md5 -q <paths>`: `<hash>` per line.
    Md5,
}

/// What a mismatch between the computed aggregate and the stored `.all.idx` means.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllIndexPolicy {
    /// The mismatch is a problem and fails the run.
    #[default]
    Fail,
    /// The corrected aggregate is still quarantined, but the mismatch only produces a warning.
    Tolerate,
    /// The computed aggregate replaces the stored `.all.idx`. Not a problem.
    Repair,
}

/// Which open problems forbid garbage collection on a replica.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcGuard {
    /// Only problems found on the replica itself.
    Replica,
    /// Problems on the replica, plus any problem recorded for the same docroot so far
    /// (including replicas disagreeing with each other).
    #[default]
    Docroot,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FsckConfig {
    /// Verify file content against the recorded hashes.
    #[serde(default)]
    pub md5_check: bool,
    /// Delete unreferenced files instead of reporting them.
    #[serde(default)]
    pub gc: bool,
    #[serde(default)]
    pub hash_tool: HashTool,
    /// Maximum number of paths passed to one hash command.
    #[serde(default = "FsckConfig::default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub all_index_policy: AllIndexPolicy,
    #[serde(default)]
    pub gc_guard: GcGuard,
    /// Number of docroots checked in parallel.
    #[serde(default = "FsckConfig::default_jobs")]
    pub jobs: usize,
    /// Upper bound on simultaneously open host connections.
    #[serde(default = "FsckConfig::default_max_connections")]
    pub max_connections: usize,
}

impl FsckConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 500;

    fn default_batch_size() -> usize {
        Self::DEFAULT_BATCH_SIZE
    }

    fn default_jobs() -> usize {
        1
    }

    fn default_max_connections() -> usize {
        4
    }
}

impl Default for FsckConfig {
    fn default() -> Self {
        Self {
            md5_check: false,
            gc: false,
            hash_tool: HashTool::default(),
            batch_size: Self::default_batch_size(),
            all_index_policy: AllIndexPolicy::default(),
            gc_guard: GcGuard::default(),
            jobs: Self::default_jobs(),
            max_connections: Self::default_max_connections(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid config:\n{}", format_validation_errors(.0))]
    Invalid(Vec<ConfigValidationError>),
    #[error("unknown cluster `{name}` (configured: {known})")]
    UnknownCluster { name: String, known: String },
}

fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(|err| format!("  {err}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // Keep just the message; the default `Display` includes a source snippet.
        ConfigError::Toml(err.message().to_string())
    }
}

impl LavenderConfig {
    /// Load and validate a config file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    /// Parse and validate TOML text.
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        let config: LavenderConfig = toml::from_str(text)?;
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors));
        }
        Ok(config)
    }

    /// Resolve the config file location: an explicit path, then `$LAVENDER_CONFIG`, then
    /// `lavender.toml` in the current directory.
    pub fn discover(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    pub fn cluster(&self, name: &str) -> Result<&ClusterConfig, ConfigError> {
        self.clusters
            .iter()
            .find(|cluster| cluster.name == name)
            .ok_or_else(|| ConfigError::UnknownCluster {
                name: name.to_string(),
                known: self
                    .clusters
                    .iter()
                    .map(|cluster| cluster.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}
