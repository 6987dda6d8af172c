use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lavender_process::{run, Invocation, Limits, Output, ProcessError};

use crate::error::{ReplicaError, Result};
use crate::transport::Transport;

/// A replica reached by running commands through a remote shell.
///
/// Every operation is one invocation of `command` with a single shell line appended as its
/// last argument, e.g. `ssh -o BatchMode=yes web1 'cd /var/www && find . -type f'`.
#[derive(Debug, Clone)]
pub struct SshTransport {
    host: String,
    root: PathBuf,
    command: Vec<String>,
    timeout: Option<Duration>,
}

impl SshTransport {
    pub fn new(host: impl Into<String>, root: impl Into<PathBuf>, command: Vec<String>) -> Self {
        Self {
            host: host.into(),
            root: root.into(),
            command,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn invocation(&self, line: &str) -> Result<Invocation> {
        let Some((program, prefix)) = self.command.split_first() else {
            return Err(ReplicaError::EmptyCommand {
                host: self.host.clone(),
            });
        };
        let mut args = prefix.to_vec();
        args.push(line.to_string());
        Ok(Invocation::new(".", program.as_str(), args))
    }

    /// Runs `line` remotely. A timeout or cut-off stdout is an error, the exit code is not.
    fn run(&self, line: &str, stdin: Option<&[u8]>) -> Result<(Invocation, Output)> {
        let command = self.invocation(line)?;
        let limits = Limits {
            timeout: self.timeout,
            ..Limits::default()
        };
        let output =
            run(&command, stdin, &limits).map_err(|err| ReplicaError::command(&self.host, err))?;
        if !output.is_complete() {
            return Err(self.failure(command, output));
        }
        Ok((command, output))
    }

    fn run_checked(&self, line: &str, stdin: Option<&[u8]>) -> Result<String> {
        let (command, output) = self.run(line, stdin)?;
        if !output.status.success() {
            return Err(self.failure(command, output));
        }
        Ok(output.stdout)
    }

    fn failure(&self, command: Invocation, output: Output) -> ReplicaError {
        ReplicaError::command(&self.host, ProcessError::failed(command, output))
    }
}

impl Transport for SshTransport {
    fn host(&self) -> &str {
        &self.host
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        let line = format!("test -e {}", quote_path(path));
        let (command, output) = self.run(&line, None)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            // 255 comes from ssh itself and says nothing about the path.
            _ => Err(self.failure(command, output)),
        }
    }

    fn exec(&self, dir: &Path, argv: &[String]) -> Result<String> {
        if argv.is_empty() {
            return Err(ReplicaError::EmptyCommand {
                host: self.host.clone(),
            });
        }
        let line = format!("cd {} && {}", quote_path(dir), join(argv));
        self.run_checked(&line, None)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.run_checked(&format!("cat {}", quote_path(path)), None)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("/"));
        let tmp = path.with_file_name(format!(
            ".{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));
        let line = format!(
            "mkdir -p {parent} && cat > {tmp} && mv -f {tmp} {path}",
            parent = quote_path(parent),
            tmp = quote_path(&tmp),
            path = quote_path(path),
        );
        self.run_checked(&line, Some(contents.as_bytes()))?;
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let output = self.run_checked(&format!("ls -A {}", quote_path(path)), None)?;
        let mut names: Vec<String> = output
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    fn delete_file(&self, path: &Path) -> Result<()> {
        self.run_checked(&format!("rm -f {}", quote_path(path)), None)?;
        Ok(())
    }

    fn delete_dir(&self, path: &Path) -> Result<()> {
        self.run_checked(&format!("rmdir {}", quote_path(path)), None)?;
        Ok(())
    }
}

fn join(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_path(path: &Path) -> String {
    quote(&path.to_string_lossy()).into_owned()
}

/// Quotes `arg` for a POSIX shell. Plain words pass through unchanged, anything else is
/// wrapped in single quotes.
pub fn quote(arg: &str) -> Cow<'_, str> {
    let plain = |c: char| c.is_ascii_alphanumeric() || "_-./,:=+@%".contains(c);
    if !arg.is_empty() && arg.chars().all(plain) {
        return Cow::Borrowed(arg);
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('\'');
    for c in arg.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    Cow::Owned(out)
}
