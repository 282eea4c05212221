//! CLI command implementations
//!
//! One module per subcommand; each exposes a clap `Args` struct that
//! implements [`Command`](crate::command::Command).

pub mod autoupdate;
pub mod clean;
pub mod hook_impl;
pub mod install;
pub mod list;
pub mod run;
pub mod sample_config;
pub mod validate;
