use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::types::PipelineStatus;

/// One spawned child, owned by the invoking process until reaped.
#[derive(Debug)]
pub struct ProcHandle {
    pid: Pid,
    status: Option<PipelineStatus>,
}

impl ProcHandle {
    pub fn new(pid: Pid) -> ProcHandle {
        ProcHandle { pid, status: None }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn status(&self) -> Option<PipelineStatus> {
        self.status
    }

    /// Wait for this child until it has actually terminated, caching the
    /// result. Reaping an already-reaped handle returns the cached status
    /// without blocking.
    pub fn reap(&mut self) -> PipelineStatus {
        if let Some(status) = self.status {
            return status;
        }
        let status = loop {
            match waitpid(self.pid, None) {
                Ok(WaitStatus::Exited(_, code)) => break PipelineStatus::Exited(code),
                Ok(WaitStatus::Signaled(_, sig, _)) => break PipelineStatus::Signaled(sig),
                // Stop/continue notifications are not terminations.
                Ok(_) => continue,
                Err(e) => {
                    warn!(pid = %self.pid, error = %e, "waitpid failed");
                    break PipelineStatus::Exited(126);
                }
            }
        };
        debug!(pid = %self.pid, ?status, "reaped");
        self.status = Some(status);
        status
    }
}

/// Drain every handle, in order, and report the last stage's status
/// (`None` only for an empty handle set). Safe to call again on the same
/// set; nothing is waited twice.
pub fn reap_all(handles: &mut [ProcHandle]) -> Option<PipelineStatus> {
    let mut last = None;
    for handle in handles.iter_mut() {
        last = Some(handle.reap());
    }
    last
}
