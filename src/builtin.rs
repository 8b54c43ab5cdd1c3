use std::env;
use std::ffi::{OsStr, OsString};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use crate::errors::EngineError;
use crate::redirect::{self, SavedStreams};
use crate::state::State;
use crate::types::{BuiltinStatus, Stage};

pub type BuiltinFn = fn(&mut State, &[OsString]) -> BuiltinStatus;

pub fn match_builtin(name: &OsStr) -> Option<BuiltinFn> {
    match name.as_bytes() {
        b"cd" => Some(builtin_cd),
        b"pwd" => Some(builtin_pwd),
        b"exit" => Some(builtin_exit),
        b"rehash" => Some(builtin_rehash),
        _ => None,
    }
}

/// Run the stage as a builtin if its name matches one; `None` means the
/// caller should launch it as an external command.
///
/// The builtin runs in the invoking process under the stage's temporary
/// redirection. The invoker's stdin/stdout are saved first and restored on
/// every exit path, including a failed redirect open.
pub fn try_dispatch(state: &mut State, stage: &Stage) -> Result<Option<BuiltinStatus>, EngineError> {
    let Some(func) = match_builtin(stage.name()) else {
        return Ok(None);
    };
    let saved = SavedStreams::save()?;
    let status = match redirect::apply(stage) {
        Ok(()) => func(state, &stage.argv),
        Err(e) => {
            let _ = writeln!(io::stderr(), "psh: {}", e);
            BuiltinStatus::Done(1)
        }
    };
    // Anything still buffered has to land in the redirect target, not in
    // the restored stream.
    let _ = io::stdout().flush();
    drop(saved);
    Ok(Some(status))
}

fn builtin_cd(_: &mut State, argv: &[OsString]) -> BuiltinStatus {
    let dest = match argv.get(1) {
        Some(dir) => PathBuf::from(dir),
        None => match env::var_os("HOME") {
            Some(home) => PathBuf::from(home),
            None => {
                let _ = writeln!(io::stderr(), "cd: HOME not set");
                return BuiltinStatus::Done(1);
            }
        },
    };
    match env::set_current_dir(&dest) {
        Ok(()) => BuiltinStatus::Done(0),
        Err(e) => {
            let _ = writeln!(io::stderr(), "cd: {}: {}", dest.display(), e);
            BuiltinStatus::Done(1)
        }
    }
}

fn builtin_pwd(_: &mut State, _: &[OsString]) -> BuiltinStatus {
    match env::current_dir() {
        Ok(dir) => {
            let mut out = io::stdout();
            let _ = out.write_all(dir.as_os_str().as_bytes());
            let _ = out.write_all(b"\n");
            BuiltinStatus::Done(0)
        }
        Err(e) => {
            let _ = writeln!(io::stderr(), "pwd: {}", e);
            BuiltinStatus::Done(1)
        }
    }
}

fn builtin_exit(_: &mut State, argv: &[OsString]) -> BuiltinStatus {
    match argv.get(1) {
        None => BuiltinStatus::Exit(0),
        Some(arg) => match arg.to_str().and_then(|s| s.parse::<i32>().ok()) {
            Some(code) => BuiltinStatus::Exit(code),
            None => {
                let _ = writeln!(
                    io::stderr(),
                    "exit: {}: numeric argument required",
                    arg.to_string_lossy()
                );
                BuiltinStatus::Done(1)
            }
        },
    }
}

fn builtin_rehash(state: &mut State, _: &[OsString]) -> BuiltinStatus {
    state.search_cache.rehash();
    BuiltinStatus::Done(0)
}
