//! Sample-config command implementation

use clap::Args;
use hitch_config::document::SAMPLE_CONFIG;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;

/// Print a starter hook document
#[derive(Debug, Args)]
pub struct SampleConfigCommand;

impl Command for SampleConfigCommand {
    type Output = i32;

    fn execute(&self, _context: &RuntimeContext) -> Result<i32> {
        print!("{SAMPLE_CONFIG}");
        Ok(0)
    }
}
