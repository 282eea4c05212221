//! Command trait for hitch CLI
//!
//! Every subcommand that works inside a repository implements [`Command`]
//! and receives the shared [`RuntimeContext`].

use crate::common::RuntimeContext;
use crate::error::Result;

/// Trait for all hitch commands
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Debug, Args)]
/// pub struct MyCommand {
///     #[arg(short, long)]
///     pub some_flag: bool,
/// }
///
/// impl Command for MyCommand {
///     type Output = i32;
///
///     fn execute(&self, context: &RuntimeContext) -> Result<i32> {
///         let work_tree = context.work_tree()?;
///         Ok(0)
///     }
/// }
/// ```
pub trait Command {
    /// The type returned by this command
    ///
    /// Commands that decide the process exit status return an `i32`.
    type Output;

    /// Execute the command with the given runtime context
    fn execute(&self, context: &RuntimeContext) -> Result<Self::Output>;
}
