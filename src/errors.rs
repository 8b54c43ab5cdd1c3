use std::ffi::NulError;
use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

/// Failures of the execution engine.
///
/// Errors raised in the invoking process (pipe, fork, descriptor
/// duplication) surface through `Result`s. Errors on the child side of a
/// fork never cross the process boundary; the child reports them on stderr
/// and turns them into a distinguished exit status via
/// [`EngineError::child_exit_code`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot create pipe: {0}")]
    Pipe(#[source] Errno),

    #[error("cannot fork: {0}")]
    Spawn(#[source] Errno),

    #[error("cannot rebind descriptor: {0}")]
    Dup(#[source] Errno),

    #[error("{}: {source}", .path.display())]
    Redirect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("command not found: {0}")]
    NotFound(String),

    #[error("cannot execute {0}: {1}")]
    Exec(String, #[source] Errno),

    #[error("argument contains a NUL byte")]
    NulArg(#[from] NulError),
}

impl EngineError {
    /// Exit status a child reports when it dies on this error before a
    /// successful exec: 127 for an unresolvable command name, 126 otherwise.
    pub fn child_exit_code(&self) -> i32 {
        match self {
            EngineError::NotFound(_) => 127,
            _ => 126,
        }
    }
}
