//! Runs the commands behind replica transports: `find`, hash tools, and remote shells.
//!
//! Callers parse stdout line by line, so stdout is captured up to a limit and a cut-off stdout
//! is reported separately from the exit status. Stderr is kept only as a diagnostic tail. A
//! timeout kills the whole process group, which covers `ssh` and whatever it spawned.

use std::fmt;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Bytes of stderr kept for error messages.
const STDERR_LIMIT: usize = 64 * 1024;
const POLL: Duration = Duration::from_millis(20);
const KILL_GRACE: Duration = Duration::from_millis(250);

/// A program with its arguments and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub cwd: PathBuf,
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(cwd: impl Into<PathBuf>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            cwd: cwd.into(),
            program: program.into(),
            args,
        }
    }

    fn command(&self, with_stdin: bool) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.cwd)
            .stdin(if with_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        own_process_group(&mut cmd);
        cmd
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Wall-clock limit, after which the process group is killed.
    pub timeout: Option<Duration>,
    /// Stdout bytes kept. Anything beyond is drained and dropped.
    pub max_stdout: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            timeout: None,
            // A `find` over a large docroot easily produces tens of MiB.
            max_stdout: 256 * 1024 * 1024,
        }
    }
}

/// What a finished (or killed) command left behind.
#[derive(Debug, Clone)]
pub struct Output {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub timed_out: bool,
}

impl Output {
    /// Stdout is the whole of what the command printed.
    pub fn is_complete(&self) -> bool {
        !self.timed_out && !self.stdout_truncated
    }
}

/// A command that ran but did not succeed.
#[derive(Debug, Clone)]
pub struct Failure {
    pub command: Invocation,
    pub output: Output,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.output.timed_out {
            write!(f, "`{}` timed out", self.command)?;
        } else if self.output.stdout_truncated {
            write!(f, "`{}` printed more output than allowed", self.command)?;
        } else {
            write!(f, "`{}` exited with {}", self.command, self.output.status)?;
        }
        let stderr = self.output.stderr.trim_end();
        if !stderr.is_empty() {
            write!(f, "\nstderr:\n{stderr}")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to run `{command}`: {source}")]
    Io {
        command: Invocation,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Failed(Box<Failure>),
}

impl ProcessError {
    pub fn failed(command: Invocation, output: Output) -> Self {
        Self::Failed(Box::new(Failure { command, output }))
    }
}

/// Runs `command`, feeding `stdin` to it when given. Exit status, timeout and truncation are
/// reported in the [`Output`], not as errors.
pub fn run(
    command: &Invocation,
    stdin: Option<&[u8]>,
    limits: &Limits,
) -> Result<Output, ProcessError> {
    let io_error = |source| ProcessError::Io {
        command: command.clone(),
        source,
    };
    tracing::trace!(
        target: "lavender.process",
        cwd = %command.cwd.display(),
        command = %command,
        "spawning"
    );

    let mut child = command.command(stdin.is_some()).spawn().map_err(io_error)?;
    let input = child.stdin.take();
    let (Some(out), Some(err)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(io_error(io::Error::other("child output was not captured")));
    };
    let max_stdout = limits.max_stdout;

    thread::scope(|scope| {
        let writer = stdin
            .zip(input)
            .map(|(bytes, pipe)| scope.spawn(move || feed(pipe, bytes)));
        let stdout = scope.spawn(move || capture(out, max_stdout));
        let stderr = scope.spawn(move || capture(err, STDERR_LIMIT));

        let (status, timed_out) = match wait(&mut child, limits.timeout) {
            Ok(waited) => waited,
            Err(err) => {
                // Readers only finish once the pipes close.
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
        };

        if let Some(writer) = writer {
            joined(writer.join(), "stdin writer")?;
        }
        let (stdout, stdout_truncated) = joined(stdout.join(), "stdout reader")?;
        let (stderr, _) = joined(stderr.join(), "stderr reader")?;
        Ok(Output {
            status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            stdout_truncated,
            timed_out,
        })
    })
    .map_err(io_error)
}

/// Like [`run`], but anything short of a successful exit with complete stdout is an error.
pub fn run_checked(
    command: &Invocation,
    stdin: Option<&[u8]>,
    limits: &Limits,
) -> Result<Output, ProcessError> {
    let output = run(command, stdin, limits)?;
    if output.is_complete() && output.status.success() {
        Ok(output)
    } else {
        Err(ProcessError::failed(command.clone(), output))
    }
}

fn joined<T>(result: thread::Result<io::Result<T>>, what: &str) -> io::Result<T> {
    result.map_err(|_| io::Error::other(format!("{what} thread panicked")))?
}

fn feed(mut pipe: ChildStdin, bytes: &[u8]) -> io::Result<()> {
    match pipe.write_all(bytes) {
        // The child may exit without reading it all; its status says what happened.
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

fn capture(mut reader: impl Read, limit: usize) -> io::Result<(Vec<u8>, bool)> {
    let mut kept = Vec::new();
    reader.by_ref().take(limit as u64).read_to_end(&mut kept)?;
    // Keep draining so the child never blocks on a full pipe.
    let dropped = io::copy(&mut reader, &mut io::sink())?;
    Ok((kept, dropped > 0))
}

fn wait(child: &mut Child, timeout: Option<Duration>) -> io::Result<(ExitStatus, bool)> {
    let Some(timeout) = timeout else {
        return Ok((child.wait()?, false));
    };
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok((kill_group(child)?, true));
        }
        thread::sleep(POLL.min(deadline - now));
    }
}

#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;

    // SAFETY: runs between fork and exec; `setpgid` is async-signal-safe.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setpgid(0, 0) == 0 {
                Ok(())
            } else {
                Err(io::Error::last_os_error())
            }
        });
    }
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_group(child: &mut Child) -> io::Result<ExitStatus> {
    // The child leads its own group, so `-pid` reaches everything it spawned.
    let group = -(child.id() as i32);
    // SAFETY: plain syscall, the result is irrelevant when the group is already gone.
    unsafe { libc::kill(group, libc::SIGTERM) };

    let deadline = Instant::now() + KILL_GRACE;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        thread::sleep(POLL);
    }
    // SAFETY: as above.
    unsafe { libc::kill(group, libc::SIGKILL) };
    child.wait()
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) -> io::Result<ExitStatus> {
    let _ = child.kill();
    child.wait()
}
