//! Clean and gc command implementations

use clap::Args;
use hitch_config::Config;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;
use crate::ui::StatusIcon;

/// Delete the hook repository cache
#[derive(Debug, Args)]
pub struct CleanCommand;

/// Remove cached repositories no recorded document still uses
#[derive(Debug, Args)]
pub struct GcCommand;

impl Command for CleanCommand {
    type Output = i32;

    fn execute(&self, context: &RuntimeContext) -> Result<i32> {
        let root = context.cache.root().display().to_string();
        if context.cache.clean()? {
            println!("{} Cleaned {root}", StatusIcon::Success.get());
        } else {
            println!("{} Nothing to clean at {root}", StatusIcon::Info.get());
        }
        Ok(0)
    }
}

impl Command for GcCommand {
    type Output = i32;

    fn execute(&self, context: &RuntimeContext) -> Result<i32> {
        let removed = context.cache.gc(|path| {
            let config = Config::load(path).ok()?;
            Some(
                config
                    .remote_repos()
                    .map(|repo| (repo.repo.clone(), repo.rev().to_string()))
                    .collect(),
            )
        })?;
        println!("{removed} repo(s) removed.");
        Ok(0)
    }
}
