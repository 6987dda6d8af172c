use std::ops::Deref;

use lavender_config::HostConfig;
use parking_lot::{Condvar, Mutex};

use crate::error::Result;
use crate::transport::Transport;

type Connect = dyn Fn(&HostConfig) -> Result<Box<dyn Transport>> + Send + Sync;

/// Caps the number of transports open at once across all hosts.
///
/// Leases are handed out per host. Dropping a [`Lease`] returns its transport to the pool, where
/// it is reused by the next lease for the same host or closed to make room for another host.
pub struct Pool {
    max_open: usize,
    connect: Box<Connect>,
    state: Mutex<PoolState>,
    returned: Condvar,
}

#[derive(Default)]
struct PoolState {
    open: usize,
    idle: Vec<(String, Box<dyn Transport>)>,
}

impl Pool {
    pub fn new(max_open: usize) -> Self {
        Self::with_connector(max_open, crate::connect)
    }

    /// Pool creating transports with `connect` instead of from the host's configured kind.
    pub fn with_connector(
        max_open: usize,
        connect: impl Fn(&HostConfig) -> Result<Box<dyn Transport>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            max_open: max_open.max(1),
            connect: Box::new(connect),
            state: Mutex::new(PoolState::default()),
            returned: Condvar::new(),
        }
    }

    /// Borrows a transport for `host`, blocking while the pool is at capacity.
    pub fn lease(&self, host: &HostConfig) -> Result<Lease<'_>> {
        let mut state = self.state.lock();
        loop {
            if let Some(pos) = state.idle.iter().position(|(name, _)| *name == host.name) {
                let (_, transport) = state.idle.swap_remove(pos);
                return Ok(self.wrap(host, transport));
            }
            if state.open < self.max_open {
                break;
            }
            if !state.idle.is_empty() {
                let (evicted, _) = state.idle.swap_remove(0);
                state.open -= 1;
                tracing::debug!(target: "lavender.replica", host = %evicted, "closing idle transport");
                continue;
            }
            self.returned.wait(&mut state);
        }
        state.open += 1;
        drop(state);

        tracing::debug!(target: "lavender.replica", host = %host.name, "opening transport");
        match (self.connect)(host) {
            Ok(transport) => Ok(self.wrap(host, transport)),
            Err(err) => {
                self.state.lock().open -= 1;
                self.returned.notify_one();
                Err(err)
            }
        }
    }

    /// Number of transports currently open, leased or idle.
    #[cfg(test)]
    fn open(&self) -> usize {
        self.state.lock().open
    }

    fn wrap(&self, host: &HostConfig, transport: Box<dyn Transport>) -> Lease<'_> {
        Lease {
            pool: self,
            host: host.name.clone(),
            transport: Some(transport),
        }
    }
}

/// A transport borrowed from a [`Pool`].
pub struct Lease<'a> {
    pool: &'a Pool,
    host: String,
    transport: Option<Box<dyn Transport>>,
}

impl Deref for Lease<'_> {
    type Target = dyn Transport;

    fn deref(&self) -> &Self::Target {
        match &self.transport {
            Some(transport) => transport.as_ref(),
            None => unreachable!("transport is only taken on drop"),
        }
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Some(transport) = self.transport.take() {
            self.pool
                .state
                .lock()
                .idle
                .push((std::mem::take(&mut self.host), transport));
            self.pool.returned.notify_one();
        }
    }
}
