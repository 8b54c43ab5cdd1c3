use std::fs::OpenOptions;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use nix::unistd;
use tracing::error;

use crate::errors::EngineError;
use crate::types::{OutputMode, Stage};

/// Rebind the calling process's stdin/stdout to the stage's declared
/// redirection files. Absent fields are no-ops.
///
/// This permanently mutates the caller's descriptor table: call it in a
/// freshly forked child, or bracket it with [`SavedStreams`].
pub fn apply(stage: &Stage) -> Result<(), EngineError> {
    if let Some(path) = &stage.stdin_file {
        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(|e| EngineError::Redirect { path: path.clone(), source: e })?;
        unistd::dup2(file.as_raw_fd(), libc::STDIN_FILENO).map_err(EngineError::Dup)?;
        // `file` drops here, closing the now-redundant original descriptor.
    }
    if let Some(target) = &stage.stdout_file {
        let mut opts = OpenOptions::new();
        opts.write(true).create(true);
        match target.mode {
            OutputMode::Truncate => {
                opts.truncate(true);
            }
            OutputMode::Append => {
                opts.append(true);
            }
        }
        let file = opts
            .open(&target.path)
            .map_err(|e| EngineError::Redirect { path: target.path.clone(), source: e })?;
        unistd::dup2(file.as_raw_fd(), libc::STDOUT_FILENO).map_err(EngineError::Dup)?;
    }
    Ok(())
}

/// Duplicates of the invoker's stdin/stdout, restored on drop. Brackets a
/// builtin's temporary redirection so the streams come back on every exit
/// path.
pub struct SavedStreams {
    stdin: OwnedFd,
    stdout: OwnedFd,
}

impl SavedStreams {
    pub fn save() -> Result<SavedStreams, EngineError> {
        let stdin = dup_owned(libc::STDIN_FILENO)?;
        let stdout = dup_owned(libc::STDOUT_FILENO)?;
        Ok(SavedStreams { stdin, stdout })
    }
}

fn dup_owned(fd: RawFd) -> Result<OwnedFd, EngineError> {
    let copy = unistd::dup(fd).map_err(EngineError::Dup)?;
    Ok(unsafe { OwnedFd::from_raw_fd(copy) })
}

impl Drop for SavedStreams {
    fn drop(&mut self) {
        // Restoration is best-effort: there is no caller left to hand an
        // error to once the bracket unwinds.
        if let Err(e) = unistd::dup2(self.stdin.as_raw_fd(), libc::STDIN_FILENO) {
            error!(error = %e, "cannot restore stdin");
        }
        if let Err(e) = unistd::dup2(self.stdout.as_raw_fd(), libc::STDOUT_FILENO) {
            error!(error = %e, "cannot restore stdout");
        }
    }
}
