//! Hook definitions and execution
//!
//! - `definition`: a manifest entry merged with the document's overrides
//! - `executor`: runs one hook against its files
//! - `runner`: plans and runs every hook of a stage, in parallel
//! - `builtin`, `pygrep`: hooks evaluated in-process

pub mod builtin;
pub mod definition;
pub mod executor;
pub mod pygrep;
pub mod runner;

pub use definition::{HookDefinition, HookFilters};
pub use executor::{CancelFlag, ExecutionContext, HookReport, HookStatus};
pub use runner::{HookRunner, HookRunnerBuilder, NoopObserver, RunObserver, RunReport};
