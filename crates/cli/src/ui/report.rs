//! Run report rendering
//!
//! One status line per hook, padded with dots to a fixed width:
//!
//! ```text
//! check json...............................................................Passed
//! trim trailing whitespace.................................................Failed
//! - hook id: trailing-whitespace
//! - exit code: 1
//! ```

use hitch_engine::{HookReport, HookStatus, RunReport};
use owo_colors::OwoColorize;
use std::fmt::Write as _;

const LINE_WIDTH: usize = 79;
const NO_FILES: &str = "(no files to check)";

/// Renders reports, with or without color
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    color: bool,
}

impl Printer {
    /// Create a printer
    #[must_use]
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint_status(&self, status: HookStatus) -> String {
        let label = match status {
            HookStatus::NoFiles => "Skipped",
            other => other.label(),
        };
        if !self.color {
            return label.to_string();
        }
        match status {
            HookStatus::Passed => label.green().to_string(),
            HookStatus::Failed | HookStatus::Errored => label.red().to_string(),
            HookStatus::Skipped | HookStatus::NoFiles => label.on_cyan().black().to_string(),
            HookStatus::Cancelled => label.yellow().to_string(),
        }
    }

    /// `name.....Status`
    #[must_use]
    pub fn status_line(&self, name: &str, status: HookStatus) -> String {
        let label = status.label();
        let dots = LINE_WIDTH
            .saturating_sub(name.chars().count() + label.chars().count())
            .max(1);
        let prefix = if status == HookStatus::NoFiles {
            NO_FILES
        } else {
            ""
        };
        format!(
            "{name}{}{prefix}{}",
            ".".repeat(dots),
            self.paint_status(status)
        )
    }

    fn details(&self, hook: &HookReport, out: &mut String) {
        let show = (hook.status.is_failure() && hook.status != HookStatus::Cancelled)
            || (hook.verbose && hook.status == HookStatus::Passed);
        if !show {
            return;
        }

        let _ = writeln!(out, "- hook id: {}", hook.id);
        if hook.verbose {
            let _ = writeln!(out, "- duration: {:.2}s", hook.duration.as_secs_f64());
        }
        if let Some(code) = hook.exit_code
            && code != 0
        {
            let _ = writeln!(out, "- exit code: {code}");
        }

        let output = hook.output.trim_end();
        if !output.is_empty() {
            out.push('\n');
            out.push_str(output);
            out.push_str("\n\n");
        }
    }

    /// Full report: resolution errors first, then every hook in order
    #[must_use]
    pub fn render(&self, report: &RunReport) -> String {
        let mut out = String::new();

        for error in &report.resolution_errors {
            let label = if self.color {
                "Resolution error".red().bold().to_string()
            } else {
                "Resolution error".to_string()
            };
            let _ = writeln!(out, "{label}: {error}");
        }

        for hook in &report.hooks {
            out.push_str(&self.status_line(&hook.name, hook.status));
            out.push('\n');
            self.details(hook, &mut out);
        }

        if report.cancelled {
            out.push_str("Interrupted by user.\n");
        }
        out
    }
}
