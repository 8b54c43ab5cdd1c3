use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use nix::sys::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Truncate,
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub path: PathBuf,
    pub mode: OutputMode,
}

/// One command of a pipeline: its argument vector and optional file
/// redirections. Built once by the parser, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub argv: Vec<OsString>,
    pub stdin_file: Option<PathBuf>,
    pub stdout_file: Option<OutputTarget>,
}

impl Stage {
    pub fn new(argv: Vec<OsString>) -> Stage {
        assert!(!argv.is_empty());
        Stage { argv, stdin_file: None, stdout_file: None }
    }

    pub fn name(&self) -> &OsStr {
        &self.argv[0]
    }
}

/// An ordered, non-empty chain of stages connected by pipes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

/// How a pipeline ended: the last stage's exit code, or the signal that
/// killed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Exited(i32),
    Signaled(Signal),
}

impl PipelineStatus {
    pub fn success(self) -> bool {
        self == PipelineStatus::Exited(0)
    }

    /// Numeric form for `$?`-style reporting; signals map to `128 + signo`.
    pub fn code(self) -> i32 {
        match self {
            PipelineStatus::Exited(code) => code,
            PipelineStatus::Signaled(sig) => 128 + sig as i32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinStatus {
    Done(i32),
    /// The builtin asked the whole session to end with this code.
    Exit(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalResult {
    Done(PipelineStatus),
    Exit(i32),
}
