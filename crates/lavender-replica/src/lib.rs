//! Filesystem access to the hosts of a cluster.
//!
//! A [`Transport`] is the only way fsck touches a replica. [`LocalTransport`] works on a root
//! mounted on this machine; [`SshTransport`] runs shell commands through a command prefix such
//! as `ssh host`. [`Pool`] bounds how many are open at once and [`Docroot`] layers the index
//! file conventions on top.

mod docroot;
mod error;
mod local;
mod pool;
mod ssh;
mod transport;

use lavender_config::{HostConfig, HostKind};

pub use docroot::{repaired_location, Docroot, REPAIRED_INDEXES};
pub use error::{ReplicaError, Result};
pub use local::LocalTransport;
pub use pool::{Lease, Pool};
pub use ssh::{quote, SshTransport};
pub use transport::{parse_find_output, FindKind, Transport};

/// Opens a transport for `host` according to its configured kind.
pub fn connect(host: &HostConfig) -> Result<Box<dyn Transport>> {
    let transport: Box<dyn Transport> = match host.kind {
        HostKind::Local => Box::new(
            LocalTransport::new(&host.name, &host.root).with_timeout(host.command_timeout()),
        ),
        HostKind::Ssh => Box::new(
            SshTransport::new(&host.name, &host.root, host.ssh_command())
                .with_timeout(host.command_timeout()),
        ),
    };
    tracing::debug!(
        target: "lavender.replica",
        host = %host.name,
        kind = ?host.kind,
        root = %host.root.display(),
        "connected"
    );
    Ok(transport)
}
