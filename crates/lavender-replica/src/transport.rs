use std::path::Path;

use crate::error::Result;

/// What [`Transport::find`] lists below a directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FindKind {
    /// Every regular file, recursively.
    Files,
    /// Regular files directly inside the directory.
    TopLevelFiles,
    /// Every empty directory, recursively.
    EmptyDirectories,
}

impl FindKind {
    /// `find` arguments producing this listing when run inside the directory.
    pub fn find_args(self) -> Vec<String> {
        let args: &[&str] = match self {
            FindKind::Files => &["find", ".", "-type", "f"],
            FindKind::TopLevelFiles => &["find", ".", "-maxdepth", "1", "-type", "f"],
            FindKind::EmptyDirectories => &["find", ".", "-type", "d", "-empty"],
        };
        args.iter().map(|arg| arg.to_string()).collect()
    }
}

/// Access to the filesystem of one replica host.
///
/// Paths are absolute paths on the host. Implementations exist for locally mounted roots
/// ([`LocalTransport`](crate::LocalTransport)) and for hosts reached over ssh
/// ([`SshTransport`](crate::SshTransport)).
pub trait Transport: Send + Sync {
    /// Host name, for reports and log lines.
    fn host(&self) -> &str;

    /// Directory that docroot and index paths are relative to.
    fn root(&self) -> &Path;

    fn exists(&self, path: &Path) -> Result<bool>;

    /// Runs `argv` inside `dir` and returns its stdout. A non-zero exit is an error.
    fn exec(&self, dir: &Path, argv: &[String]) -> Result<String>;

    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Replaces the content of `path`, creating missing parent directories.
    fn write(&self, path: &Path, contents: &str) -> Result<()>;

    /// Names of the entries directly inside `path`.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>>;

    fn delete_file(&self, path: &Path) -> Result<()>;

    /// Removes the empty directory `path`.
    fn delete_dir(&self, path: &Path) -> Result<()>;

    /// Lists paths below `dir`, relative to it, in the order `find` reports them.
    fn find(&self, dir: &Path, kind: FindKind) -> Result<Vec<String>> {
        let output = self.exec(dir, &kind.find_args())?;
        Ok(parse_find_output(&output))
    }
}

/// Strips the `./` prefix `find .` puts on every line and drops `.` itself.
pub fn parse_find_output(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .map(|line| line.strip_prefix("./").unwrap_or(line))
        .filter(|line| !line.is_empty() && *line != ".")
        .map(str::to_string)
        .collect()
}
