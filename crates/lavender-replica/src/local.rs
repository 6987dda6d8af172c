use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use lavender_process::{run_checked, Invocation, Limits};

use crate::error::{ReplicaError, Result};
use crate::transport::Transport;

/// A replica whose filesystem is reachable from this machine.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    host: String,
    root: PathBuf,
    timeout: Option<Duration>,
}

impl LocalTransport {
    pub fn new(host: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            root: root.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn io_err(&self, path: &Path) -> impl FnOnce(io::Error) -> ReplicaError + '_ {
        let path = path.to_path_buf();
        move |err| ReplicaError::io(&self.host, path, err)
    }
}

impl Transport for LocalTransport {
    fn host(&self) -> &str {
        &self.host
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        match fs::symlink_metadata(path) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(ReplicaError::io(&self.host, path, err)),
        }
    }

    fn exec(&self, dir: &Path, argv: &[String]) -> Result<String> {
        let Some((program, args)) = argv.split_first() else {
            return Err(ReplicaError::EmptyCommand {
                host: self.host.clone(),
            });
        };
        let command = Invocation::new(dir, program, args.to_vec());
        let limits = Limits {
            timeout: self.timeout,
            ..Limits::default()
        };
        let output = run_checked(&command, None, &limits)
            .map_err(|err| ReplicaError::command(&self.host, err))?;
        Ok(output.stdout)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(self.io_err(path))
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        atomic_write(path, contents.as_bytes()).map_err(self.io_err(path))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path).map_err(self.io_err(path))? {
            let entry = entry.map_err(self.io_err(path))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(self.io_err(path))
    }

    fn delete_dir(&self, path: &Path) -> Result<()> {
        fs::remove_dir(path).map_err(self.io_err(path))
    }
}

/// Writes through a temporary sibling file so readers never observe a partial index.
fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => return Err(io::Error::other("path has no parent")),
    };
    fs::create_dir_all(parent)?;

    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}
