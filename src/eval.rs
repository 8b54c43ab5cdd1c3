use std::ffi::CString;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;

use nix::fcntl::OFlag;
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::unistd::{self, ForkResult};
use tracing::{debug, error};

use crate::builtin;
use crate::errors::EngineError;
use crate::reap::{self, ProcHandle};
use crate::redirect;
use crate::search::SearchCache;
use crate::state::State;
use crate::types::{BuiltinStatus, EvalResult, Pipeline, PipelineStatus, Stage};

/// Run one parsed pipeline to completion.
///
/// A single stage naming a builtin runs in this process; everything else
/// becomes one forked child per stage, connected by pipes, and the call
/// blocks until every child has been reaped.
pub fn eval(state: &mut State, pipeline: &Pipeline) -> Result<EvalResult, EngineError> {
    let stages = &pipeline.stages;
    assert!(!stages.is_empty());

    if stages.len() == 1 {
        if let Some(status) = builtin::try_dispatch(state, &stages[0])? {
            return Ok(match status {
                BuiltinStatus::Done(code) => EvalResult::Done(PipelineStatus::Exited(code)),
                BuiltinStatus::Exit(code) => EvalResult::Exit(code),
            });
        }
    }

    let mut handles = Vec::with_capacity(stages.len());
    let spawned = spawn_stages(&state.search_cache, stages, &mut handles);
    let status = reap::reap_all(&mut handles);
    // A pipe failure still reaps whatever was launched before surfacing.
    spawned?;
    Ok(EvalResult::Done(status.unwrap_or(PipelineStatus::Exited(126))))
}

/// Launch every stage left to right, one pipe per adjacent pair.
///
/// Handles are pushed as stages launch so the caller can reap them even if
/// the walk aborts. Pipe creation failure aborts the walk; a fork failure
/// loses only that stage (its pipe ends drop, so its neighbours observe
/// EOF or a broken pipe and run to completion on their own).
pub fn spawn_stages(
    cache: &SearchCache,
    stages: &[Stage],
    handles: &mut Vec<ProcHandle>,
) -> Result<(), EngineError> {
    spawn_stages_with(cache, stages, handles, || unistd::pipe2(OFlag::O_CLOEXEC))
}

fn spawn_stages_with<P>(
    cache: &SearchCache,
    stages: &[Stage],
    handles: &mut Vec<ProcHandle>,
    mut make_pipe: P,
) -> Result<(), EngineError>
where
    P: FnMut() -> nix::Result<(OwnedFd, OwnedFd)>,
{
    let mut upstream: Option<OwnedFd> = None;
    for (i, stage) in stages.iter().enumerate() {
        let is_last = i + 1 == stages.len();
        let (next_upstream, downstream) = if is_last {
            (None, None)
        } else {
            let (read_end, write_end) = make_pipe().map_err(EngineError::Pipe)?;
            (Some(read_end), Some(write_end))
        };
        match launch_stage(cache, stage, upstream.as_ref(), downstream.as_ref()) {
            Ok(handle) => handles.push(handle),
            Err(e) => error!(command = ?stage.name(), error = %e, "cannot launch stage"),
        }
        // The child owns its copies now. Dropping here closes the previous
        // read end and this pipe's write end in the invoking process; a
        // stray write end would keep the downstream reader from ever seeing
        // end-of-input.
        upstream = next_upstream;
        drop(downstream);
    }
    Ok(())
}

/// Fork one external stage, wiring its stdin/stdout to the given pipe ends
/// (`None` inherits the caller's stream), and return without waiting.
pub fn launch_stage(
    cache: &SearchCache,
    stage: &Stage,
    stdin: Option<&OwnedFd>,
    stdout: Option<&OwnedFd>,
) -> Result<ProcHandle, EngineError> {
    match unsafe { unistd::fork() }.map_err(EngineError::Spawn)? {
        ForkResult::Parent { child } => {
            debug!(pid = %child, command = ?stage.name(), "spawned");
            Ok(ProcHandle::new(child))
        }
        ForkResult::Child => exec_stage(cache, stage, stdin, stdout),
    }
}

fn exec_stage(
    cache: &SearchCache,
    stage: &Stage,
    stdin: Option<&OwnedFd>,
    stdout: Option<&OwnedFd>,
) -> ! {
    let err = do_exec_stage(cache, stage, stdin, stdout);
    let _ = writeln!(io::stderr(), "psh: {}", err);
    unsafe { libc::_exit(err.child_exit_code()) }
}

// Child side between fork and exec; returns only on failure.
fn do_exec_stage(
    cache: &SearchCache,
    stage: &Stage,
    stdin: Option<&OwnedFd>,
    stdout: Option<&OwnedFd>,
) -> EngineError {
    if let Some(fd) = stdin {
        if let Err(e) = unistd::dup2(fd.as_raw_fd(), libc::STDIN_FILENO) {
            return EngineError::Dup(e);
        }
    }
    if let Some(fd) = stdout {
        if let Err(e) = unistd::dup2(fd.as_raw_fd(), libc::STDOUT_FILENO) {
            return EngineError::Dup(e);
        }
    }
    // Applied after the pipe ends, so an explicit `<file`/`>file` on a
    // stage overrides its pipe connection.
    if let Err(e) = redirect::apply(stage) {
        return e;
    }
    // The Rust runtime ignores SIGPIPE; exec'd programs expect the default.
    unsafe {
        let _ = signal(Signal::SIGPIPE, SigHandler::SigDfl);
    }
    let (path, argv) = match resolve(cache, stage) {
        Ok(resolved) => resolved,
        Err(e) => return e,
    };
    match unistd::execv(&path, &argv) {
        Ok(never) => match never {},
        Err(e) => EngineError::Exec(stage.name().to_string_lossy().into_owned(), e),
    }
}

fn resolve(cache: &SearchCache, stage: &Stage) -> Result<(CString, Vec<CString>), EngineError> {
    let name = stage.name();
    let path = if name.as_bytes().contains(&b'/') {
        CString::new(name.as_bytes())?
    } else {
        match cache.lookup(name) {
            Some(path) => CString::new(path.as_os_str().as_bytes())?,
            None => return Err(EngineError::NotFound(name.to_string_lossy().into_owned())),
        }
    };
    let argv = stage
        .argv
        .iter()
        .map(|arg| CString::new(arg.as_bytes()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((path, argv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    use nix::errno::Errno;

    fn stage(argv: &[&str]) -> Stage {
        Stage::new(argv.iter().map(OsString::from).collect())
    }

    #[test]
    fn single_stage_spawns_one_process() {
        let cache = SearchCache::new();
        let mut handles = Vec::new();
        spawn_stages(&cache, &[stage(&["true"])], &mut handles).unwrap();
        assert_eq!(handles.len(), 1);
        let status = reap::reap_all(&mut handles);
        assert_eq!(status, Some(PipelineStatus::Exited(0)));
    }

    #[test]
    fn pipe_failure_aborts_later_stages_but_reaps_launched_ones() {
        let cache = SearchCache::new();
        let stages = vec![
            stage(&["echo", "hi"]),
            stage(&["cat"]),
            stage(&["cat"]),
            stage(&["cat"]),
        ];
        let mut handles = Vec::new();
        let mut pipes = 0;
        let result = spawn_stages_with(&cache, &stages, &mut handles, || {
            pipes += 1;
            if pipes >= 3 {
                Err(Errno::EMFILE)
            } else {
                unistd::pipe2(OFlag::O_CLOEXEC)
            }
        });
        assert!(matches!(result, Err(EngineError::Pipe(Errno::EMFILE))));
        // Only the stages before the failed junction were launched.
        assert_eq!(handles.len(), 2);
        let status = reap::reap_all(&mut handles);
        assert!(status.is_some());
        assert!(handles.iter().all(|h| h.status().is_some()));
    }
}
