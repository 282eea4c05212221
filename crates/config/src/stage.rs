//! Git hook stages
//!
//! A stage is the lifecycle point at which a hook runs. Legacy short names
//! (`commit`, `merge-commit`, `push`) are accepted on input and normalized.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Execution stage of a hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Before a commit is created
    #[serde(alias = "commit")]
    PreCommit,
    /// Before a merge commit is created
    #[serde(alias = "merge-commit")]
    PreMergeCommit,
    /// Before refs are pushed
    #[serde(alias = "push")]
    PrePush,
    /// Validate the commit message
    CommitMsg,
    /// Edit the default commit message
    PrepareCommitMsg,
    /// After a checkout
    PostCheckout,
    /// After a commit
    PostCommit,
    /// After a merge
    PostMerge,
    /// After commits are rewritten
    PostRewrite,
    /// Only when requested explicitly with `--hook-stage manual`
    Manual,
}

impl Stage {
    /// Every stage, in git lifecycle order
    pub const ALL: [Stage; 10] = [
        Stage::PreCommit,
        Stage::PreMergeCommit,
        Stage::PrePush,
        Stage::CommitMsg,
        Stage::PrepareCommitMsg,
        Stage::PostCheckout,
        Stage::PostCommit,
        Stage::PostMerge,
        Stage::PostRewrite,
        Stage::Manual,
    ];

    /// Canonical name, which is also the git hook file name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Stage::PreCommit => "pre-commit",
            Stage::PreMergeCommit => "pre-merge-commit",
            Stage::PrePush => "pre-push",
            Stage::CommitMsg => "commit-msg",
            Stage::PrepareCommitMsg => "prepare-commit-msg",
            Stage::PostCheckout => "post-checkout",
            Stage::PostCommit => "post-commit",
            Stage::PostMerge => "post-merge",
            Stage::PostRewrite => "post-rewrite",
            Stage::Manual => "manual",
        }
    }

    /// Whether this stage can be installed as a git hook script
    #[must_use]
    pub fn is_installable(&self) -> bool {
        *self != Stage::Manual
    }

    /// Whether hooks of this stage operate on the staged file set
    #[must_use]
    pub fn uses_staged_files(&self) -> bool {
        matches!(self, Stage::PreCommit | Stage::PreMergeCommit)
    }

    /// Whether hooks of this stage receive the commit message file
    #[must_use]
    pub fn uses_message_file(&self) -> bool {
        matches!(self, Stage::CommitMsg | Stage::PrepareCommitMsg)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commit" => return Ok(Stage::PreCommit),
            "merge-commit" => return Ok(Stage::PreMergeCommit),
            "push" => return Ok(Stage::PrePush),
            _ => {}
        }
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Stage::ALL.iter().map(Stage::name).collect();
                format!("unknown stage '{s}' (valid: {})", valid.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_stage_names_round_trip_through_from_str() {
        for stage in Stage::ALL {
            assert_eq!(stage.name().parse::<Stage>().unwrap(), stage);
        }
    }

    #[test]
    fn test_legacy_aliases() {
        assert_eq!("commit".parse::<Stage>().unwrap(), Stage::PreCommit);
        assert_eq!("push".parse::<Stage>().unwrap(), Stage::PrePush);
        assert_eq!(
            serde_yaml::from_str::<Stage>("merge-commit").unwrap(),
            Stage::PreMergeCommit
        );
    }

    #[test]
    fn test_unknown_stage() {
        let err = "pre-bake".parse::<Stage>().unwrap_err();
        assert!(err.contains("unknown stage 'pre-bake'"));
        assert!(serde_yaml::from_str::<Stage>("pre-bake").is_err());
    }

    #[test]
    fn test_stage_serialization_uses_canonical_name() {
        let yaml = serde_yaml::to_string(&vec![Stage::PreCommit, Stage::CommitMsg]).unwrap();
        assert!(yaml.contains("pre-commit"));
        assert!(yaml.contains("commit-msg"));
    }

    #[test]
    fn test_stage_capabilities() {
        assert!(Stage::PreCommit.uses_staged_files());
        assert!(!Stage::PrePush.uses_staged_files());
        assert!(Stage::CommitMsg.uses_message_file());
        assert!(!Stage::Manual.is_installable());
        assert!(Stage::PrePush.is_installable());
    }
}
