//! Autoupdate command implementation
//!
//! Moves each remote repository's pinned `rev` to its newest tag (or the
//! default branch head with `--bleeding-edge`). The document is edited
//! line by line so comments, quoting and key order survive.

use anyhow::Context;
use clap::Args;
use hitch_config::{Config, RepoEntry, manifest::load_manifest};
use hitch_engine::{Git2Provider, GitProvider, RepoCache};
use rayon::prelude::*;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::IsTerminal;
use std::sync::LazyLock;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;
use crate::ui::{StatusIcon, create_spinner};

static REPO_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:-\s+)?repo:\s*['"]?([^'"\s#]+)['"]?"#)
        .expect("REPO_LINE compilation should never fail")
});

static ENTRY_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*-\s+(?:repo|rev):").expect("ENTRY_START compilation should never fail")
});

static REV_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\s*(?:-\s+)?rev:\s*)(['"]?)([^'"\s#]+)(['"]?)(.*)$"#)
        .expect("REV_LINE compilation should never fail")
});

/// Update pinned revisions to the latest release
#[derive(Debug, Args)]
pub struct AutoupdateCommand {
    /// Use the default branch head instead of the latest tag
    #[arg(long)]
    pub bleeding_edge: bool,

    /// Only update this repository (repeatable)
    #[arg(long = "repo", value_name = "URL")]
    pub repos: Vec<String>,
}

/// Outcome for one repository entry
#[derive(Debug)]
enum Update {
    Current,
    Updated(String),
    Failed(String),
}

/// Document text after [`rewrite_revs`]
#[derive(Debug)]
pub struct Rewrite {
    /// The edited document
    pub content: String,
    /// `(repo, old rev)` keys whose `rev:` line was found and replaced
    pub applied: HashSet<(String, String)>,
}

/// Replace `rev` values in `content`
///
/// `updates` maps `(repo, old rev)` to the new revision. Repository entries
/// are delimited by their `- repo:` / `- rev:` item markers, so `rev` may
/// come before or after `repo` within an entry.
#[must_use]
pub fn rewrite_revs(content: &str, updates: &HashMap<(String, String), String>) -> Rewrite {
    let mut rewrite = Rewrite {
        content: String::with_capacity(content.len()),
        applied: HashSet::new(),
    };
    let mut entry: Vec<&str> = Vec::new();

    for line in content.split_inclusive('\n') {
        let top_level = line.starts_with(|c: char| !c.is_whitespace() && c != '-' && c != '#');
        if ENTRY_START.is_match(line) || top_level {
            rewrite_entry(&entry, updates, &mut rewrite);
            entry.clear();
        }
        entry.push(line);
    }
    rewrite_entry(&entry, updates, &mut rewrite);
    rewrite
}

fn rewrite_entry(
    lines: &[&str],
    updates: &HashMap<(String, String), String>,
    rewrite: &mut Rewrite,
) {
    let repo = lines
        .iter()
        .find_map(|line| REPO_LINE.captures(line).map(|caps| caps[1].to_string()));

    for line in lines {
        let body = line.strip_suffix('\n').unwrap_or(line);
        let body = body.strip_suffix('\r').unwrap_or(body);
        let newline = &line[body.len()..];

        let replacement = repo.as_ref().and_then(|repo| {
            let caps = REV_LINE.captures(body)?;
            let key = (repo.clone(), caps[3].to_string());
            let new_rev = updates.get(&key)?;
            let replaced = format!(
                "{}{}{new_rev}{}{}",
                &caps[1], &caps[2], &caps[4], &caps[5]
            );
            rewrite.applied.insert(key);
            Some(replaced)
        });

        match replacement {
            Some(replaced) => {
                rewrite.content.push_str(&replaced);
                rewrite.content.push_str(newline);
            }
            None => rewrite.content.push_str(line),
        }
    }
}

fn check_repo(
    repo: &RepoEntry,
    bleeding_edge: bool,
    cache: &RepoCache,
    provider: &dyn GitProvider,
) -> Update {
    let latest = match provider.latest_revision(&repo.repo, bleeding_edge) {
        Ok(rev) => rev,
        Err(e) => return Update::Failed(e.to_string()),
    };
    if latest == repo.rev() {
        return Update::Current;
    }

    // Hook ids referenced by the document must still exist at the new revision
    let manifest = cache
        .checkout(&repo.repo, &latest, provider)
        .and_then(|dir| load_manifest(&dir));
    match manifest {
        Ok(hooks) => {
            let missing: Vec<&str> = repo
                .hooks
                .iter()
                .filter(|h| !hooks.iter().any(|m| m.id == h.id))
                .map(|h| h.id.as_str())
                .collect();
            if missing.is_empty() {
                Update::Updated(latest)
            } else {
                Update::Failed(format!(
                    "cannot update to {latest}: hooks {} are missing",
                    missing.join(", ")
                ))
            }
        }
        Err(e) => Update::Failed(e.to_string()),
    }
}

impl Command for AutoupdateCommand {
    type Output = i32;

    fn execute(&self, context: &RuntimeContext) -> Result<i32> {
        let work_tree = context.work_tree()?;
        let (path, config) = context.load_config(&work_tree)?;

        let targets: Vec<&RepoEntry> = config
            .remote_repos()
            .filter(|repo| self.repos.is_empty() || self.repos.contains(&repo.repo))
            .collect();

        let spinner = create_spinner("Checking for updates...", std::io::stderr().is_terminal());
        let provider = Git2Provider::new();
        let outcomes: Vec<Update> = targets
            .par_iter()
            .map(|repo| check_repo(repo, self.bleeding_edge, &context.cache, &provider))
            .collect();
        spinner.finish_and_clear();

        let updates: HashMap<(String, String), String> = targets
            .iter()
            .zip(&outcomes)
            .filter_map(|(repo, outcome)| match outcome {
                Update::Updated(new_rev) => {
                    Some(((repo.repo.clone(), repo.rev().to_string()), new_rev.clone()))
                }
                Update::Current | Update::Failed(_) => None,
            })
            .collect();

        let mut applied = HashSet::new();
        if !updates.is_empty() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let rewrite = rewrite_revs(&content, &updates);
            Config::from_yaml_str(&rewrite.content, &path)
                .context("Updated document failed to parse; leaving it unchanged")?;
            fs::write(&path, &rewrite.content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            applied = rewrite.applied;
        }

        let mut failed = false;
        for (repo, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Update::Current => println!("[{}] already up to date!", repo.repo),
                Update::Updated(new_rev) => {
                    let key = (repo.repo.clone(), repo.rev().to_string());
                    if applied.contains(&key) {
                        println!("[{}] updating {} -> {new_rev}", repo.repo, repo.rev());
                    } else {
                        failed = true;
                        eprintln!(
                            "{} [{}] `rev: {}` not found in {}; set it to {new_rev} by hand",
                            StatusIcon::Error.get(),
                            repo.repo,
                            repo.rev(),
                            path.display()
                        );
                    }
                }
                Update::Failed(message) => {
                    failed = true;
                    eprintln!("{} [{}] {message}", StatusIcon::Error.get(), repo.repo);
                }
            }
        }

        Ok(i32::from(failed))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    fn updates(entries: &[(&str, &str, &str)]) -> HashMap<(String, String), String> {
        entries
            .iter()
            .map(|(repo, old, new)| ((repo.to_string(), old.to_string()), new.to_string()))
            .collect()
    }

    #[test]
    fn test_rewrite_preserves_quotes_and_comments() {
        let content = "\
# top comment
repos:
  - repo: https://example.com/a
    rev: 'v1.0.0'  # pinned
    hooks:
      - id: one
  - repo: https://example.com/b
    rev: v2.0.0
    hooks:
      - id: two
";
        let out = rewrite_revs(
            content,
            &updates(&[("https://example.com/a", "v1.0.0", "v1.2.0")]),
        )
        .content;
        assert!(out.contains("    rev: 'v1.2.0'  # pinned\n"));
        assert!(out.contains("    rev: v2.0.0\n"));
        assert!(out.starts_with("# top comment\n"));
        assert_eq!(out.lines().count(), content.lines().count());
    }

    #[test]
    fn test_rewrite_distinguishes_same_repo_at_different_revs() {
        let content = "\
repos:
  - repo: https://example.com/a
    rev: v1
    hooks: [{id: x}]
  - repo: https://example.com/a
    rev: v2
    hooks: [{id: y}]
";
        let update = updates(&[("https://example.com/a", "v2", "v3")]);
        let out = rewrite_revs(content, &update).content;
        assert!(out.contains("rev: v1\n"));
        assert!(out.contains("rev: v3\n"));
        assert!(!out.contains("rev: v2"));
    }

    #[test]
    fn test_rewrite_keeps_crlf() {
        let content = "repos:\r\n  - repo: u\r\n    rev: old\r\n    hooks: []\r\n";
        let out = rewrite_revs(content, &updates(&[("u", "old", "new")])).content;
        assert_eq!(out, "repos:\r\n  - repo: u\r\n    rev: new\r\n    hooks: []\r\n");
    }

    #[test]
    fn test_rewrite_without_updates_is_identity() {
        let content = "repos:\n  - repo: local\n    hooks: []\n";
        let rewrite = rewrite_revs(content, &HashMap::new());
        assert_eq!(rewrite.content, content);
        assert!(rewrite.applied.is_empty());
    }

    #[test]
    fn test_rewrite_rev_written_before_repo() {
        let content = "\
repos:
  - repo: https://example.com/a
    rev: v1
    hooks: [{id: x}]
  - rev: v1
    repo: https://example.com/b
    hooks: [{id: y}]
";
        let rewrite = rewrite_revs(content, &updates(&[("https://example.com/b", "v1", "v2")]));
        assert!(rewrite.content.contains("  - repo: https://example.com/a\n    rev: v1\n"));
        assert!(rewrite.content.contains("  - rev: v2\n    repo: https://example.com/b\n"));
        assert!(
            rewrite
                .applied
                .contains(&("https://example.com/b".to_string(), "v1".to_string()))
        );
    }

    #[test]
    fn test_rewrite_reports_unlocated_revs() {
        let content = "repos:\n  - {repo: u, rev: old, hooks: []}\n";
        let rewrite = rewrite_revs(content, &updates(&[("u", "old", "new")]));
        assert_eq!(rewrite.content, content);
        assert!(rewrite.applied.is_empty());
    }
}
