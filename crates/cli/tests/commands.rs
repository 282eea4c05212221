//! Commands driven against scratch repositories

#![allow(clippy::unwrap_used, clippy::panic)]

use hitch::cmd::install::{InstallCommand, UninstallCommand};
use hitch::cmd::run::RunCommand;
use hitch::command::Command;
use hitch::common::RuntimeContext;
use hitch::error::CommandError;
use hitch_config::{Settings, Stage};
use serial_test::serial;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const BUILTIN_CONFIG: &str = "\
repos:
  - repo: builtin
    hooks:
      - id: check-json
      - id: trailing-whitespace
";

struct Project {
    dir: TempDir,
    cache: TempDir,
    repo: git2::Repository,
}

impl Project {
    fn new(config: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        let project = Self {
            dir,
            cache: TempDir::new().unwrap(),
            repo,
        };
        project.stage(hitch_config::CONFIG_FILE, config);
        project
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn stage(&self, name: &str, content: &str) {
        fs::write(self.path().join(name), content).unwrap();
        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
    }

    fn context(&self) -> RuntimeContext {
        RuntimeContext::new(
            Settings::default(),
            self.cache.path().to_path_buf(),
            self.path().to_path_buf(),
            None,
        )
    }

    fn run(&self) -> i32 {
        RunCommand {
            hook: None,
            all_files: false,
            files: Vec::new(),
            from_ref: None,
            to_ref: None,
            hook_stage: Stage::PreCommit,
            jobs: Some(2),
            show_diff_on_failure: false,
            commit_msg_filename: None,
        }
        .execute(&self.context())
        .unwrap()
    }
}

#[test]
#[serial]
fn test_run_passes_on_clean_staged_files() {
    let project = Project::new(BUILTIN_CONFIG);
    project.stage("a.json", "{\"ok\": true}\n");
    temp_env::with_var_unset("SKIP", || assert_eq!(project.run(), 0));
}

#[test]
#[serial]
fn test_run_fails_on_invalid_json_unless_skipped() {
    let project = Project::new(BUILTIN_CONFIG);
    project.stage("a.json", "{oops\n");

    temp_env::with_var_unset("SKIP", || assert_eq!(project.run(), 1));
    temp_env::with_var("SKIP", Some("check-json"), || assert_eq!(project.run(), 0));
}

#[test]
#[serial]
fn test_run_checks_staged_content_and_restores_unstaged_edits() {
    let project = Project::new(BUILTIN_CONFIG);
    project.stage("a.json", "{}\n");
    fs::write(project.path().join("a.json"), "{broken\n").unwrap();

    temp_env::with_var_unset("SKIP", || assert_eq!(project.run(), 0));
    assert_eq!(
        fs::read_to_string(project.path().join("a.json")).unwrap(),
        "{broken\n"
    );
}

#[test]
#[serial]
fn test_fixer_modifications_fail_the_run() {
    let project = Project::new(BUILTIN_CONFIG);
    project.stage("notes.txt", "trailing   \n");

    temp_env::with_var_unset("SKIP", || assert_eq!(project.run(), 1));
    assert_eq!(
        fs::read_to_string(project.path().join("notes.txt")).unwrap(),
        "trailing\n"
    );
}

#[test]
fn test_missing_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    git2::Repository::init(dir.path()).unwrap();
    let cache = TempDir::new().unwrap();
    let context = RuntimeContext::new(
        Settings::default(),
        cache.path().to_path_buf(),
        dir.path().to_path_buf(),
        None,
    );

    let err = RunCommand {
        hook: None,
        all_files: true,
        files: Vec::new(),
        from_ref: None,
        to_ref: None,
        hook_stage: Stage::PreCommit,
        jobs: None,
        show_diff_on_failure: false,
        commit_msg_filename: None,
    }
    .execute(&context)
    .unwrap_err();
    assert!(matches!(err, CommandError::ConfigNotFound(_)));
}

#[test]
fn test_install_then_uninstall() {
    let project = Project::new(BUILTIN_CONFIG);
    let context = project.context();
    let hook = project.path().join(".git/hooks/pre-commit");

    let code = InstallCommand {
        hook_types: vec![Stage::PreCommit],
        overwrite: false,
    }
    .execute(&context)
    .unwrap();
    assert_eq!(code, 0);
    assert!(hitch::cmd::install::is_managed(&hook));

    UninstallCommand {
        hook_types: vec![Stage::PreCommit],
    }
    .execute(&context)
    .unwrap();
    assert!(!hook.exists());
}
