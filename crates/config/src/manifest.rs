//! Hook manifest published by a hook repository
//!
//! A hook repository carries a `.pre-commit-hooks.yaml` file at its root
//! listing the hooks it provides. Each entry declares how to run the hook
//! (`entry`, `language`) and the default file filters that invocations in a
//! project document may override.

use crate::stage::Stage;
use hitch_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Language a hook is implemented in
///
/// Determines how the entry point is located and invoked. Names not known
/// to hitch are kept verbatim in [`Language::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    /// Executable found on `PATH`
    System,
    /// Script shipped inside the hook repository
    Script,
    /// Always fails, listing the offending files
    Fail,
    /// Regular expression searched in each file
    Pygrep,
    /// Implemented inside hitch itself
    Builtin,
    /// Any other toolchain (python, node, rust, ...)
    Other(String),
}

impl Language {
    /// Language name as written in documents
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Language::System => "system",
            Language::Script => "script",
            Language::Fail => "fail",
            Language::Pygrep => "pygrep",
            Language::Builtin => "builtin",
            Language::Other(name) => name,
        }
    }
}

impl From<String> for Language {
    fn from(value: String) -> Self {
        match value.as_str() {
            "system" => Language::System,
            "script" => Language::Script,
            "fail" => Language::Fail,
            "pygrep" => Language::Pygrep,
            "builtin" => Language::Builtin,
            _ => Language::Other(value),
        }
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hook as declared by its repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestHook {
    /// Identifier referenced by project documents
    pub id: String,

    /// Human readable name printed while running
    pub name: String,

    /// Command (program plus leading arguments) to invoke
    pub entry: String,

    /// How the entry is located and run
    pub language: Language,

    /// Regex of files to include
    #[serde(default)]
    pub files: String,

    /// Regex of files to exclude
    #[serde(default = "default_exclude")]
    pub exclude: String,

    /// File type tags that must all match
    #[serde(default = "default_types")]
    pub types: Vec<String>,

    /// File type tags of which at least one must match
    #[serde(default)]
    pub types_or: Vec<String>,

    /// File type tags that must not match
    #[serde(default)]
    pub exclude_types: Vec<String>,

    /// Extra arguments placed after the entry
    #[serde(default)]
    pub args: Vec<String>,

    /// Packages the hook environment needs
    #[serde(default)]
    pub additional_dependencies: Vec<String>,

    /// Stages the hook is allowed to run in (None = every stage)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stages: Option<Vec<Stage>>,

    /// Run even when no file matches
    #[serde(default)]
    pub always_run: bool,

    /// Append the selected filenames to the command line
    #[serde(default = "default_true")]
    pub pass_filenames: bool,

    /// Never split filenames into several invocations
    #[serde(default)]
    pub require_serial: bool,

    /// Print output even when the hook passes
    #[serde(default)]
    pub verbose: bool,

    /// Stop the run when this hook fails
    #[serde(default)]
    pub fail_fast: bool,

    /// Interpreter version requested for the hook environment
    #[serde(default = "default_language_version")]
    pub language_version: String,

    /// Seconds before the hook is killed (0 = no timeout)
    #[serde(default)]
    pub timeout: u64,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Oldest runner version the hook supports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_pre_commit_version: Option<String>,
}

impl ManifestHook {
    /// Check the fields that must be non-empty
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Validation("hook id cannot be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::Validation(format!(
                "hook '{}' has an empty 'name'",
                self.id
            )));
        }
        if self.entry.trim().is_empty() && self.language != Language::Builtin {
            return Err(Error::Validation(format!(
                "hook '{}' has an empty 'entry'",
                self.id
            )));
        }
        for (field, pattern) in [("files", &self.files), ("exclude", &self.exclude)] {
            regex::Regex::new(pattern).map_err(|e| {
                Error::Validation(format!(
                    "hook '{}' has an invalid '{field}' pattern: {e}",
                    self.id
                ))
            })?;
        }
        Ok(())
    }
}

/// Parse a manifest from YAML text
pub fn parse_manifest(content: &str, path: &Path) -> Result<Vec<ManifestHook>> {
    let hooks: Vec<ManifestHook> = serde_yaml::from_str(content).map_err(|e| Error::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    for hook in &hooks {
        hook.validate()?;
    }

    Ok(hooks)
}

/// Load the manifest file of a hook repository checkout
pub fn load_manifest(repo_dir: &Path) -> Result<Vec<ManifestHook>> {
    let path = repo_dir.join(crate::MANIFEST_FILE);
    let content = std::fs::read_to_string(&path).map_err(|e| Error::Parse {
        path: path.clone(),
        message: format!("cannot read manifest: {e}"),
    })?;
    tracing::debug!(path = %path.display(), "Loading hook manifest");
    parse_manifest(&content, &path)
}

pub(crate) fn default_exclude() -> String {
    "^$".to_string()
}

pub(crate) fn default_types() -> Vec<String> {
    vec!["file".to_string()]
}

pub(crate) fn default_language_version() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;

    const MANIFEST: &str = r"
- id: check-json
  name: check json
  description: checks json files for parseable syntax.
  entry: check-json
  language: builtin
  types: [json]
- id: flake8
  name: flake8
  entry: flake8
  language: python
  require_serial: true
  args: [--max-line-length=100]
";

    #[test]
    fn test_parse_manifest_defaults() {
        let hooks = parse_manifest(MANIFEST, Path::new("m.yaml")).unwrap();
        assert_eq!(hooks.len(), 2);

        let json = &hooks[0];
        assert_eq!(json.language, Language::Builtin);
        assert_eq!(json.types, vec!["json"]);
        assert_eq!(json.exclude, "^$");
        assert_eq!(json.files, "");
        assert!(json.pass_filenames);
        assert_eq!(json.language_version, "default");
        assert!(json.stages.is_none());

        let flake8 = &hooks[1];
        assert_eq!(flake8.language, Language::Other("python".to_string()));
        assert_eq!(flake8.types, vec!["file"]);
        assert!(flake8.require_serial);
        assert_eq!(flake8.args, vec!["--max-line-length=100"]);
    }

    #[test]
    fn test_parse_manifest_missing_entry_is_parse_error() {
        let err = parse_manifest("- id: x\n  name: x\n  language: system\n", Path::new("m"))
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_parse_manifest_bad_regex_is_validation_error() {
        let yaml = "- id: x\n  name: x\n  entry: x\n  language: system\n  files: '('\n";
        let err = parse_manifest(yaml, Path::new("m")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("invalid 'files' pattern"));
    }

    #[test]
    fn test_language_round_trip_names() {
        for name in ["system", "script", "fail", "pygrep", "builtin", "node"] {
            let lang = Language::from(name.to_string());
            assert_eq!(lang.as_str(), name);
        }
    }

    #[test]
    fn test_load_manifest_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(crate::MANIFEST_FILE), MANIFEST).unwrap();
        let hooks = load_manifest(dir.path()).unwrap();
        assert_eq!(hooks[0].id, "check-json");
    }

    #[test]
    fn test_load_manifest_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_manifest(dir.path()).unwrap_err();
        assert!(err.to_string().contains("cannot read manifest"));
    }
}
