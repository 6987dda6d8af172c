use std::collections::BTreeSet;
use std::fmt;

use crate::{HostKind, LavenderConfig, LoggingConfig};

/// A semantic problem in an otherwise well-formed config file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Dotted location of the offending value, e.g. `clusters[0].hosts`.
    pub toml_path: String,
    pub message: String,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.toml_path, self.message)
    }
}

impl LavenderConfig {
    /// Validate semantic invariants, reporting as many problems as possible in one pass.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut out = Vec::new();
        validate_fsck(self, &mut out);
        validate_logging(self, &mut out);
        validate_clusters(self, &mut out);
        out
    }
}

fn push(out: &mut Vec<ConfigValidationError>, toml_path: impl Into<String>, message: &str) {
    out.push(ConfigValidationError {
        toml_path: toml_path.into(),
        message: message.to_string(),
    });
}

fn validate_fsck(config: &LavenderConfig, out: &mut Vec<ConfigValidationError>) {
    if config.fsck.batch_size == 0 {
        push(out, "fsck.batch_size", "must be >= 1");
    }
    if config.fsck.jobs == 0 {
        push(out, "fsck.jobs", "must be >= 1");
    }
    if config.fsck.max_connections == 0 {
        push(out, "fsck.max_connections", "must be >= 1");
    }
}

fn validate_logging(config: &LavenderConfig, out: &mut Vec<ConfigValidationError>) {
    let normalized = LoggingConfig::normalize_level_directives(&config.logging.level);
    if tracing_subscriber::EnvFilter::try_new(normalized).is_err() {
        push(out, "logging.level", "not a valid level or filter directive");
    }
}

fn validate_clusters(config: &LavenderConfig, out: &mut Vec<ConfigValidationError>) {
    let mut names = BTreeSet::new();
    for (idx, cluster) in config.clusters.iter().enumerate() {
        let at = format!("clusters[{idx}]");
        if cluster.name.trim().is_empty() {
            push(out, format!("{at}.name"), "must not be empty");
        } else if !names.insert(cluster.name.as_str()) {
            push(out, format!("{at}.name"), "duplicate cluster name");
        }

        if cluster.hosts.is_empty() {
            push(out, format!("{at}.hosts"), "at least one host is required");
        }
        let mut host_names = BTreeSet::new();
        for (host_idx, host) in cluster.hosts.iter().enumerate() {
            let at = format!("{at}.hosts[{host_idx}]");
            if !host_names.insert(host.name.as_str()) {
                push(out, format!("{at}.name"), "duplicate host name");
            }
            if host.kind == HostKind::Local && !host.command.is_empty() {
                push(out, format!("{at}.command"), "only valid for ssh hosts");
            }
            if host.kind == HostKind::Ssh && host.ssh_command().iter().all(|s| s.is_empty()) {
                push(out, format!("{at}.command"), "must not be empty");
            }
            if matches!(host.command_timeout_secs, Some(0)) {
                push(out, format!("{at}.command_timeout_secs"), "must be >= 1");
            }
        }

        let mut docroot_names = BTreeSet::new();
        for (docroot_idx, docroot) in cluster.docroots.iter().enumerate() {
            let at = format!("{at}.docroots[{docroot_idx}]");
            if !docroot_names.insert(docroot.name.as_str()) {
                push(out, format!("{at}.name"), "duplicate docroot name");
            }
            if docroot.docroot.as_os_str().is_empty() {
                push(out, format!("{at}.docroot"), "must not be empty");
            }
            if docroot.indexes.as_os_str().is_empty() {
                push(out, format!("{at}.indexes"), "must not be empty");
            }
        }
    }
}
