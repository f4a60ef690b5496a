//! Host Shell Facade
//!
//! The core never touches a real operating system. Everything observable -
//! external command execution, pipes, file bridging, filesystem predicates,
//! glob and tilde resolution - goes through this facade, supplied by the
//! embedding host.

use async_trait::async_trait;
use thiserror::Error;

use crate::context::ExecContext;

pub mod memory;

pub use memory::MemoryShell;

/// Errors surfaced by facade calls.
#[derive(Error, Debug, Clone)]
pub enum HostError {
    #[error("{0}: command not found")]
    NotFound(String),

    #[error("{0}: no such file or directory")]
    NoSuchFile(String),

    #[error("{0}: is a directory")]
    IsDirectory(String),

    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Io(String),
}

impl HostError {
    /// Exit code a command failing with this error should yield.
    pub fn exit_code(&self) -> i32 {
        match self {
            HostError::NotFound(_) => 127,
            _ => 1,
        }
    }
}

/// Options forwarded with external command execution.
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// The command carried a trailing `&`. Recorded and forwarded; the
    /// executor does not otherwise implement job control.
    pub asynchronous: bool,
}

/// Path-test operations delegated to the host (`test`, `[`, `[[ ]]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathTest {
    Exists,
    RegularFile,
    Directory,
    Readable,
    Writable,
    Executable,
    NonEmpty,
    Symlink,
    BlockDevice,
    CharDevice,
    NamedPipe,
    Socket,
    Setgid,
    Setuid,
    Sticky,
    OwnedByEuid,
    OwnedByEgid,
    ModifiedSinceLastRead,
    FdIsTerminal,
    NewerThan,
    OlderThan,
    SameDeviceAndInode,
}

/// The abstract shell the executor runs against.
///
/// Pipes are identified by opaque names chosen by the host; `is_pipe`
/// distinguishes them from filesystem paths. A write of an empty string is
/// the EOF signal; readers observe EOF as a zero-length read.
#[async_trait(?Send)]
pub trait ShellHost {
    /// Run an external command. Builtins and functions never reach here.
    async fn execute(
        &self,
        ctx: &ExecContext,
        name: &str,
        args: &[String],
        opts: &ExecuteOptions,
    ) -> Result<i32, HostError>;

    async fn pipe_open(&self) -> Result<String, HostError>;
    async fn pipe_close(&self, name: &str) -> Result<(), HostError>;
    async fn pipe_remove(&self, name: &str) -> Result<(), HostError>;
    /// Blocks until data or EOF; returns "" at EOF.
    async fn pipe_read(&self, name: &str) -> Result<String, HostError>;
    /// Blocks while the pipe is full; empty `data` signals EOF.
    async fn pipe_write(&self, name: &str, data: &str) -> Result<(), HostError>;
    fn is_pipe(&self, name: &str) -> bool;

    /// Stream a file's content into `pipe`, then signal EOF.
    async fn pipe_from_file(
        &self,
        ctx: &ExecContext,
        path: &str,
        pipe: &str,
    ) -> Result<(), HostError>;

    /// Drain `pipe` into a file until EOF.
    async fn pipe_to_file(
        &self,
        ctx: &ExecContext,
        pipe: &str,
        path: &str,
        append: bool,
    ) -> Result<(), HostError>;

    /// Glob resolution. `None` means the capability is absent; `Some`
    /// returns the matches, or the pattern itself when nothing matched.
    async fn resolve_path(&self, _ctx: &ExecContext, _pattern: &str) -> Option<Vec<String>> {
        None
    }

    /// Home directory for tilde expansion. An empty string means
    /// "unknown user, keep the original text".
    async fn resolve_home_user(&self, _ctx: &ExecContext, _user: Option<&str>) -> String {
        String::new()
    }

    /// Read a file for `source` / `.`.
    async fn read_file(&self, _ctx: &ExecContext, path: &str) -> Result<String, HostError> {
        Err(HostError::Unsupported(format!("read_file {}", path)))
    }

    /// Filesystem predicate for conditional file tests.
    async fn test_path(
        &self,
        _ctx: &ExecContext,
        _op: PathTest,
        _path: &str,
        _other: Option<&str>,
    ) -> bool {
        false
    }
}
