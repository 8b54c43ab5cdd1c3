pub mod builtin;
pub mod cli;
pub mod errors;
pub mod eval;
pub mod logging;
pub mod parser;
pub mod reap;
pub mod redirect;
pub mod search;
pub mod state;
pub mod types;

pub use errors::EngineError;
pub use state::State;
pub use types::{EvalResult, Pipeline, PipelineStatus, Stage};
