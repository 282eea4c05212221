//! End-to-end runs: real git repositories for both the hook repository and
//! the project, resolved through the cache and executed by the runner.

#![allow(clippy::unwrap_used, clippy::panic)]

use hitch_config::{Config, Stage};
use hitch_engine::hooks::runner::parse_skip;
use hitch_engine::{
    CandidateSet, Error, Git2Provider, HookRunner, HookStatus, RepoCache, Resolver, RunReport,
    worktree,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const HOOKS_MANIFEST: &str = "\
- id: check-json
  name: check json
  entry: check-json
  language: builtin
  types: [json]
- id: no-tabs
  name: no tabs
  entry: '\\t'
  language: pygrep
  types: [text]
";

fn commit_all(repo: &git2::Repository, files: &[(&str, &str)], message: &str) -> git2::Oid {
    let workdir = repo.workdir().unwrap().to_path_buf();
    let mut index = repo.index().unwrap();
    for (name, content) in files {
        fs::write(workdir.join(name), content).unwrap();
        index.add_path(Path::new(name)).unwrap();
    }
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = git2::Signature::now("Test", "test@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

/// Hook repository with `v1.0.0` tagged
fn hook_repository() -> TempDir {
    let dir = TempDir::new().unwrap();
    let repo = git2::Repository::init(dir.path()).unwrap();
    let oid = commit_all(
        &repo,
        &[(hitch_config::MANIFEST_FILE, HOOKS_MANIFEST)],
        "hooks",
    );
    let object = repo.find_object(oid, None).unwrap();
    repo.tag_lightweight("v1.0.0", &object, false).unwrap();
    dir
}

/// Project with `files` staged but not committed
fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    let repo = git2::Repository::init(dir.path()).unwrap();
    let mut index = repo.index().unwrap();
    for (name, content) in files {
        fs::write(dir.path().join(name), content).unwrap();
        index.add_path(Path::new(name)).unwrap();
    }
    index.write().unwrap();
    dir
}

struct Fixture {
    hooks_repo: TempDir,
    cache_dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            hooks_repo: hook_repository(),
            cache_dir: TempDir::new().unwrap(),
        }
    }

    fn url(&self) -> String {
        self.hooks_repo.path().to_string_lossy().into_owned()
    }

    fn run(&self, work_tree: &Path, yaml: &str, jobs: usize, skip: &str) -> RunReport {
        let config = Config::from_yaml_str(yaml, Path::new(".pre-commit-config.yaml")).unwrap();
        let cache = RepoCache::new(self.cache_dir.path());
        let provider = Git2Provider::new();
        let (hooks, errors) = Resolver::new(&cache, &provider)
            .resolve(&config)
            .unwrap()
            .into_parts();

        let staged = worktree::staged_files(work_tree).unwrap();
        let candidates = CandidateSet::identify(work_tree, staged);
        let mut report = HookRunner::builder(&hooks, &candidates, work_tree)
            .global_patterns(config.files.clone(), config.exclude.clone())
            .stage(Stage::PreCommit)
            .jobs(jobs)
            .fail_fast(config.fail_fast)
            .skip(parse_skip(skip))
            .build()
            .unwrap()
            .run()
            .unwrap();
        report.resolution_errors = errors;
        report
    }
}

fn single_check_json(url: &str) -> String {
    format!("repos:\n  - repo: {url}\n    rev: v1.0.0\n    hooks:\n      - id: check-json\n")
}

#[test]
fn test_check_json_selects_only_json_and_passes_when_valid() {
    let fixture = Fixture::new();
    let work = project(&[("a.json", "{\"ok\": true}"), ("b.txt", "not json")]);

    let report = fixture.run(work.path(), &single_check_json(&fixture.url()), 1, "");
    assert_eq!(report.hooks.len(), 1);
    assert_eq!(report.hooks[0].status, HookStatus::Passed);
    assert_eq!(report.hooks[0].files, 1);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn test_check_json_fails_when_invalid() {
    let fixture = Fixture::new();
    let work = project(&[("a.json", "{oops"), ("b.txt", "not json")]);

    let report = fixture.run(work.path(), &single_check_json(&fixture.url()), 1, "");
    assert_eq!(report.hooks[0].status, HookStatus::Failed);
    assert!(report.hooks[0].output.contains("a.json"));
    assert!(!report.hooks[0].output.contains("b.txt"));
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn test_missing_revision_fails_only_that_repository() {
    let fixture = Fixture::new();
    let work = project(&[("a.json", "{}")]);
    let yaml = format!(
        "repos:\n  - repo: {url}\n    rev: does-not-exist\n    hooks:\n      - id: check-json\n  - repo: {url}\n    rev: v1.0.0\n    hooks:\n      - id: no-tabs\n",
        url = fixture.url()
    );

    let report = fixture.run(work.path(), &yaml, 2, "");
    assert_eq!(report.resolution_errors.len(), 1);
    assert!(matches!(
        report.resolution_errors[0],
        Error::Resolution { .. }
    ));
    assert_eq!(report.hooks.len(), 1);
    assert_eq!(report.hooks[0].id, "no-tabs");
    assert_eq!(report.hooks[0].status, HookStatus::Passed);
    assert_eq!(report.exit_code(), 1);
}

#[test]
fn test_skip_omits_hook_from_outcome() {
    let fixture = Fixture::new();
    let work = project(&[("a.json", "{oops")]);

    let report = fixture.run(
        work.path(),
        &single_check_json(&fixture.url()),
        1,
        "check-json",
    );
    assert_eq!(report.hooks[0].status, HookStatus::Skipped);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn test_parallel_and_sequential_agree() {
    let fixture = Fixture::new();
    let work = project(&[
        ("a.json", "{}"),
        ("b.json", "[1,"),
        ("c.txt", "tab\there\n"),
        ("d.txt", "clean\n"),
    ]);
    let yaml = format!(
        "repos:\n  - repo: {url}\n    rev: v1.0.0\n    hooks:\n      - id: check-json\n      - id: no-tabs\n  - repo: builtin\n    hooks:\n      - id: check-yaml\n      - id: detect-private-key\n",
        url = fixture.url()
    );

    let sequential = fixture.run(work.path(), &yaml, 1, "");
    let parallel = fixture.run(work.path(), &yaml, 4, "");

    let outcome = |r: &RunReport| -> Vec<(String, HookStatus)> {
        r.hooks.iter().map(|h| (h.id.clone(), h.status)).collect()
    };
    assert_eq!(outcome(&sequential), outcome(&parallel));
    assert_eq!(
        outcome(&sequential),
        vec![
            ("check-json".to_string(), HookStatus::Failed),
            ("no-tabs".to_string(), HookStatus::Failed),
            ("check-yaml".to_string(), HookStatus::NoFiles),
            ("detect-private-key".to_string(), HookStatus::Passed),
        ]
    );
    assert_eq!(sequential.exit_code(), parallel.exit_code());
}

#[test]
fn test_global_exclude_hides_files() {
    let fixture = Fixture::new();
    let work = project(&[("a.json", "{oops")]);
    let yaml = format!("exclude: '\\.json$'\n{}", single_check_json(&fixture.url()));

    let report = fixture.run(work.path(), &yaml, 1, "");
    assert_eq!(report.hooks[0].status, HookStatus::NoFiles);
    assert!(report.passed());
}
