//! Hitch CLI library
//!
//! Argument parsing and command dispatch for the `hitch` binary, kept in a
//! library so commands can be driven from tests.

pub mod cmd;
pub mod command;
pub mod common;
pub mod error;
pub mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hitch_config::{ColorMode, Settings};
use std::fmt::Write as _;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::LazyLock;

use cmd::autoupdate::AutoupdateCommand;
use cmd::clean::{CleanCommand, GcCommand};
use cmd::hook_impl::HookImplCommand;
use cmd::install::{InstallCommand, UninstallCommand};
use cmd::list::ListCommand;
use cmd::run::RunCommand;
use cmd::sample_config::SampleConfigCommand;
use cmd::validate::{ValidateConfigCommand, ValidateManifestCommand};
use command::Command;
use common::RuntimeContext;

/// `--version` output with the build metadata emitted by build.rs
static LONG_VERSION: LazyLock<String> = LazyLock::new(|| {
    let mut version = env!("CARGO_PKG_VERSION").to_string();
    if let Some(sha) = option_env!("VERGEN_GIT_SHA") {
        let _ = write!(version, " ({})", &sha[..sha.len().min(12)]);
    }
    if let Some(rustc) = option_env!("VERGEN_RUSTC_SEMVER") {
        let _ = write!(version, "\nrustc {rustc}");
    }
    if let Some(built) = option_env!("VERGEN_BUILD_TIMESTAMP") {
        let _ = write!(version, "\nbuilt {built}");
    }
    version
});

/// Hitch - declarative git hooks
#[derive(Parser)]
#[command(name = "hitch")]
#[command(about = "Run the git hooks declared in .pre-commit-config.yaml")]
#[command(version, long_version = LONG_VERSION.as_str())]
#[command(long_about = "Run the git hooks declared in .pre-commit-config.yaml

Hook repositories are fetched at their pinned revision and cached; hooks run
against the files they select, concurrently when they are independent.")]
pub struct Cli {
    /// Path to the hook document (defaults to .pre-commit-config.yaml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// When to use colors
    #[arg(long, global = true, value_name = "WHEN")]
    pub color: Option<ColorMode>,

    /// Enable verbose output (shows DEBUG level logs)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write logs to a file (useful for debugging)
    #[arg(long, global = true, env = "HITCH_LOG_FILE", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for hitch CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Install hook scripts into the repository
    Install(InstallCommand),
    /// Remove installed hook scripts
    Uninstall(UninstallCommand),
    /// Run hooks
    Run(RunCommand),
    /// Update pinned repository revisions
    Autoupdate(AutoupdateCommand),
    /// Check hook documents
    ValidateConfig(ValidateConfigCommand),
    /// Check hook manifests
    ValidateManifest(ValidateManifestCommand),
    /// Print a starter hook document
    SampleConfig(SampleConfigCommand),
    /// Delete the repository cache
    Clean(CleanCommand),
    /// Remove unused cached repositories
    Gc(GcCommand),
    /// List the hooks the document resolves to
    List(ListCommand),
    /// Entry point of installed hook scripts
    #[command(hide = true)]
    HookImpl(HookImplCommand),
}

impl Commands {
    fn execute(&self, context: &RuntimeContext) -> error::Result<i32> {
        match self {
            Self::Install(cmd) => cmd.execute(context),
            Self::Uninstall(cmd) => cmd.execute(context),
            Self::Run(cmd) => cmd.execute(context),
            Self::Autoupdate(cmd) => cmd.execute(context),
            Self::ValidateConfig(cmd) => cmd.execute(context),
            Self::ValidateManifest(cmd) => cmd.execute(context),
            Self::SampleConfig(cmd) => cmd.execute(context),
            Self::Clean(cmd) => cmd.execute(context),
            Self::Gc(cmd) => cmd.execute(context),
            Self::List(cmd) => cmd.execute(context),
            Self::HookImpl(cmd) => cmd.execute(context),
        }
    }
}

fn install_interrupt_handler(context: &RuntimeContext) {
    let cancel = context.cancel.clone();
    let result = ctrlc::set_handler(move || {
        // A second interrupt does not wait for running hooks
        if cancel.is_cancelled() {
            std::process::exit(130);
        }
        cancel.cancel();
    });
    if let Err(e) = result {
        tracing::warn!(error = %e, "Failed to install interrupt handler");
    }
}

/// Main entry point for the CLI application
///
/// Returns the process exit code.
///
/// # Errors
///
/// Returns an error if:
/// - Logging initialization fails
/// - The user settings file cannot be parsed
/// - No cache directory can be determined
/// - Command execution fails
pub fn run(cli: Cli) -> Result<i32> {
    hitch_config::logging::init(cli.verbose, cli.log_file.as_deref())?;

    let settings = Settings::load_default().context("Failed to load user settings")?;
    let cache_dir = settings
        .cache_dir()
        .context("Could not determine a cache directory; set HITCH_HOME")?;
    let cwd = std::env::current_dir().context("Failed to get current directory")?;

    let color_mode = cli.color.unwrap_or(settings.run.color);
    let mut context = RuntimeContext::new(settings, cache_dir, cwd, cli.config.clone());
    context.color = color_mode.should_color(std::io::stdout().is_terminal());

    install_interrupt_handler(&context);

    let code = cli.command.execute(&context)?;
    Ok(code)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use hitch_config::Stage;

    #[test]
    fn test_parse_run_with_global_flags() {
        let cli = Cli::try_parse_from([
            "hitch",
            "run",
            "--all-files",
            "--color",
            "never",
            "-c",
            "other.yaml",
        ])
        .unwrap();
        assert_eq!(cli.color, Some(ColorMode::Never));
        assert_eq!(cli.config, Some(PathBuf::from("other.yaml")));
        assert!(matches!(cli.command, Commands::Run(ref run) if run.all_files));
    }

    #[test]
    fn test_parse_install_hook_types() {
        let cli = Cli::try_parse_from([
            "hitch",
            "install",
            "-t",
            "pre-commit",
            "--hook-type",
            "pre-push",
        ])
        .unwrap();
        match cli.command {
            Commands::Install(install) => {
                assert_eq!(install.hook_types, vec![Stage::PreCommit, Stage::PrePush]);
                assert!(!install.overwrite);
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_parse_hook_impl_trailing_args() {
        let cli = Cli::try_parse_from([
            "hitch",
            "hook-impl",
            "--hook-type=commit-msg",
            "--hook-dir",
            "/repo/.git/hooks",
            "--",
            ".git/COMMIT_EDITMSG",
        ])
        .unwrap();
        match cli.command {
            Commands::HookImpl(hook) => {
                assert_eq!(hook.hook_type, Stage::CommitMsg);
                assert_eq!(hook.args, vec![".git/COMMIT_EDITMSG".to_string()]);
            }
            _ => panic!("expected hook-impl"),
        }
    }

    #[test]
    fn test_rejects_unknown_stage_and_color() {
        assert!(Cli::try_parse_from(["hitch", "run", "--hook-stage", "nope"]).is_err());
        assert!(Cli::try_parse_from(["hitch", "--color", "sometimes", "list"]).is_err());
    }

    #[test]
    fn test_long_version_starts_with_package_version() {
        assert!(LONG_VERSION.starts_with(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_validate_commands_take_files() {
        let cli = Cli::try_parse_from(["hitch", "validate-config", "a.yaml", "b.yaml"]).unwrap();
        assert!(matches!(cli.command, Commands::ValidateConfig(ref v) if v.files.len() == 2));
        let cli = Cli::try_parse_from(["hitch", "validate-manifest"]).unwrap();
        assert!(matches!(cli.command, Commands::ValidateManifest(ref v) if v.files.is_empty()));
    }
}
