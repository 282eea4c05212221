//! Hooks implemented inside hitch
//!
//! Available from `repo: builtin` and from manifests declaring
//! `language: builtin`. Each check reports offending files in its output and
//! returns exit code 1 on failure. Fixers rewrite files in place and also
//! return 1 so the modification is noticed.

use hitch_config::{Language, ManifestHook};
use hitch_core::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of running a builtin hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinOutput {
    /// Process-style exit code
    pub code: i32,
    /// Text printed by the check
    pub output: String,
}

type Check = fn(&Invocation<'_>, &mut String) -> Result<bool>;

struct Builtin {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    types: &'static [&'static str],
    check: Check,
}

const BUILTINS: &[Builtin] = &[
    Builtin {
        id: "check-json",
        name: "check json",
        description: "checks json files for parseable syntax.",
        types: &["json"],
        check: check_json,
    },
    Builtin {
        id: "check-yaml",
        name: "check yaml",
        description: "checks yaml files for parseable syntax.",
        types: &["yaml"],
        check: check_yaml,
    },
    Builtin {
        id: "check-toml",
        name: "check toml",
        description: "checks toml files for parseable syntax.",
        types: &["toml"],
        check: check_toml,
    },
    Builtin {
        id: "check-merge-conflict",
        name: "check for merge conflicts",
        description: "checks for files that contain merge conflict strings.",
        types: &["text"],
        check: check_merge_conflict,
    },
    Builtin {
        id: "check-added-large-files",
        name: "check for added large files",
        description: "prevents giant files from being committed.",
        types: &["file"],
        check: check_added_large_files,
    },
    Builtin {
        id: "trailing-whitespace",
        name: "trim trailing whitespace",
        description: "trims trailing whitespace.",
        types: &["text"],
        check: trailing_whitespace,
    },
    Builtin {
        id: "end-of-file-fixer",
        name: "fix end of files",
        description: "ensures that a file is either empty, or ends with one newline.",
        types: &["text"],
        check: end_of_file_fixer,
    },
    Builtin {
        id: "check-case-conflict",
        name: "check for case conflicts",
        description: "checks for files that would conflict in case-insensitive filesystems.",
        types: &["file"],
        check: check_case_conflict,
    },
    Builtin {
        id: "detect-private-key",
        name: "detect private key",
        description: "detects the presence of private keys.",
        types: &["text"],
        check: detect_private_key,
    },
];

fn find(id: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.id == id)
}

/// Whether `id` names a builtin hook
#[must_use]
pub fn exists(id: &str) -> bool {
    find(id).is_some()
}

/// Manifest of the `builtin` repository
#[must_use]
pub fn manifest() -> Vec<ManifestHook> {
    BUILTINS
        .iter()
        .map(|b| ManifestHook {
            id: b.id.to_string(),
            name: b.name.to_string(),
            entry: b.id.to_string(),
            language: Language::Builtin,
            files: String::new(),
            exclude: "^$".to_string(),
            types: b.types.iter().map(|t| (*t).to_string()).collect(),
            types_or: Vec::new(),
            exclude_types: Vec::new(),
            args: Vec::new(),
            additional_dependencies: Vec::new(),
            stages: None,
            always_run: false,
            pass_filenames: true,
            require_serial: false,
            verbose: false,
            fail_fast: false,
            language_version: "default".to_string(),
            timeout: 0,
            description: Some(b.description.to_string()),
            minimum_pre_commit_version: None,
        })
        .collect()
}

struct Invocation<'a> {
    args: &'a [String],
    files: &'a [PathBuf],
    work_tree: &'a Path,
}

impl Invocation<'_> {
    fn flag(&self, name: &str) -> bool {
        self.args.iter().any(|a| a == name)
    }

    /// Value of `--name=value` or `--name value`
    fn option(&self, name: &str) -> Option<&str> {
        let prefix = format!("{name}=");
        let mut args = self.args.iter();
        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix(&prefix) {
                return Some(value);
            }
            if arg == name {
                return args.next().map(String::as_str);
            }
        }
        None
    }

    fn read(&self, file: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(self.work_tree.join(file))?)
    }

    fn write(&self, file: &Path, content: &[u8]) -> Result<()> {
        Ok(fs::write(self.work_tree.join(file), content)?)
    }
}

/// Run builtin hook `id` over `files` (relative to `work_tree`)
pub fn run(
    id: &str,
    args: &[String],
    files: &[PathBuf],
    work_tree: &Path,
) -> Result<BuiltinOutput> {
    let builtin =
        find(id).ok_or_else(|| Error::execution(id, format!("unknown builtin hook '{id}'")))?;
    let invocation = Invocation {
        args,
        files,
        work_tree,
    };

    let mut output = String::new();
    let failed = (builtin.check)(&invocation, &mut output)?;
    Ok(BuiltinOutput {
        code: i32::from(failed),
        output,
    })
}

fn check_json(inv: &Invocation<'_>, out: &mut String) -> Result<bool> {
    let mut failed = false;
    for file in inv.files {
        if let Err(e) = serde_json::from_slice::<serde_json::Value>(&inv.read(file)?) {
            let _ = writeln!(out, "{}: Failed to json decode ({e})", file.display());
            failed = true;
        }
    }
    Ok(failed)
}

fn check_yaml(inv: &Invocation<'_>, out: &mut String) -> Result<bool> {
    use serde::Deserialize;

    let allow_multiple = inv.flag("--allow-multiple-documents") || inv.flag("-m");
    let mut failed = false;
    for file in inv.files {
        let content = String::from_utf8_lossy(&inv.read(file)?).into_owned();
        let mut documents = 0;
        for document in serde_yaml::Deserializer::from_str(&content) {
            documents += 1;
            if let Err(e) = serde_yaml::Value::deserialize(document) {
                let _ = writeln!(out, "{}: {e}", file.display());
                failed = true;
                break;
            }
        }
        if documents > 1 && !allow_multiple {
            let _ = writeln!(
                out,
                "{}: expected a single document in the stream",
                file.display()
            );
            failed = true;
        }
    }
    Ok(failed)
}

fn check_toml(inv: &Invocation<'_>, out: &mut String) -> Result<bool> {
    let mut failed = false;
    for file in inv.files {
        let content = String::from_utf8_lossy(&inv.read(file)?).into_owned();
        if let Err(e) = toml::from_str::<toml::Table>(&content) {
            let _ = writeln!(out, "{}: {}", file.display(), e.message());
            failed = true;
        }
    }
    Ok(failed)
}

fn check_merge_conflict(inv: &Invocation<'_>, out: &mut String) -> Result<bool> {
    const MARKERS: [&[u8]; 3] = [b"<<<<<<< ", b"=======", b">>>>>>> "];

    if !inv.flag("--assume-in-merge") && !crate::worktree::merge_in_progress(inv.work_tree) {
        return Ok(false);
    }

    let mut failed = false;
    for file in inv.files {
        let content = inv.read(file)?;
        for (lineno, line) in content.split(|b| *b == b'\n').enumerate() {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            let hit = MARKERS
                .iter()
                .any(|m| line.starts_with(m) && (m.ends_with(b" ") || line == *m));
            if hit {
                let _ = writeln!(
                    out,
                    "{}:{}: Merge conflict string {:?} found",
                    file.display(),
                    lineno + 1,
                    String::from_utf8_lossy(&line[..line.len().min(7)])
                );
                failed = true;
            }
        }
    }
    Ok(failed)
}

fn check_added_large_files(inv: &Invocation<'_>, out: &mut String) -> Result<bool> {
    let max_kb: u64 = match inv.option("--maxkb") {
        Some(value) => value.parse().map_err(|_| {
            Error::execution("check-added-large-files", format!("invalid --maxkb '{value}'"))
        })?,
        None => 500,
    };

    let mut failed = false;
    for file in inv.files {
        let size = fs::metadata(inv.work_tree.join(file))?.len();
        let kb = size.div_ceil(1024);
        if kb > max_kb {
            let _ = writeln!(out, "{} ({kb} KB) exceeds {max_kb} KB.", file.display());
            failed = true;
        }
    }
    Ok(failed)
}

fn trailing_whitespace(inv: &Invocation<'_>, out: &mut String) -> Result<bool> {
    let markdown_exts: BTreeSet<String> = inv
        .option("--markdown-linebreak-ext")
        .map(|exts| {
            exts.split(',')
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let chars: Option<Vec<char>> = inv.option("--chars").map(|c| c.chars().collect());
    let is_strippable = |c: char| match &chars {
        Some(set) => set.contains(&c),
        None => c.is_whitespace() && c != '\n' && c != '\r',
    };

    let mut failed = false;
    for file in inv.files {
        let raw = inv.read(file)?;
        let Ok(content) = String::from_utf8(raw) else {
            continue;
        };
        let markdown = file
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| markdown_exts.contains(&e.to_ascii_lowercase()));

        let mut fixed = String::with_capacity(content.len());
        for line in content.split_inclusive('\n') {
            let (body, eol) = match line.strip_suffix("\r\n") {
                Some(body) => (body, "\r\n"),
                None => match line.strip_suffix('\n') {
                    Some(body) => (body, "\n"),
                    None => (line, ""),
                },
            };
            let trimmed = body.trim_end_matches(is_strippable);
            // Markdown hard line break: exactly two trailing spaces
            if markdown && body.ends_with("  ") && !trimmed.is_empty() {
                fixed.push_str(trimmed);
                fixed.push_str("  ");
            } else {
                fixed.push_str(trimmed);
            }
            fixed.push_str(eol);
        }

        if fixed != content {
            let _ = writeln!(out, "Fixing {}", file.display());
            inv.write(file, fixed.as_bytes())?;
            failed = true;
        }
    }
    Ok(failed)
}

fn end_of_file_fixer(inv: &Invocation<'_>, out: &mut String) -> Result<bool> {
    let mut failed = false;
    for file in inv.files {
        let content = inv.read(file)?;
        let body_len = content
            .iter()
            .rposition(|b| !matches!(b, b'\n' | b'\r'))
            .map_or(0, |i| i + 1);

        let fixed = if body_len == 0 {
            Vec::new()
        } else {
            let eol: &[u8] = if content[body_len..].starts_with(b"\r\n") {
                b"\r\n"
            } else {
                b"\n"
            };
            let mut fixed = content[..body_len].to_vec();
            fixed.extend_from_slice(eol);
            fixed
        };

        if fixed != content {
            let _ = writeln!(out, "Fixing {}", file.display());
            inv.write(file, &fixed)?;
            failed = true;
        }
    }
    Ok(failed)
}

fn lowercase_with_parents(path: &Path) -> Vec<String> {
    let mut keys = Vec::new();
    let mut current = Some(path);
    while let Some(p) = current {
        if p.as_os_str().is_empty() {
            break;
        }
        keys.push(p.to_string_lossy().replace('\\', "/"));
        current = p.parent();
    }
    keys
}

fn check_case_conflict(inv: &Invocation<'_>, out: &mut String) -> Result<bool> {
    let tracked = crate::worktree::all_files(inv.work_tree).unwrap_or_default();
    let checked: BTreeSet<String> = inv
        .files
        .iter()
        .flat_map(|path| lowercase_with_parents(path))
        .collect();

    let mut by_lower: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for path in tracked.iter().chain(inv.files.iter()) {
        for key in lowercase_with_parents(path) {
            by_lower.entry(key.to_lowercase()).or_default().insert(key);
        }
    }

    // Collisions among tracked files only are not this run's concern
    let mut failed = false;
    for (_, names) in by_lower {
        if names.len() > 1 && names.iter().any(|name| checked.contains(name)) {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            let _ = writeln!(out, "Case-insensitivity conflict found: {}", names.join(", "));
            failed = true;
        }
    }
    Ok(failed)
}

fn detect_private_key(inv: &Invocation<'_>, out: &mut String) -> Result<bool> {
    const BLACKLIST: [&[u8]; 10] = [
        b"BEGIN RSA PRIVATE KEY",
        b"BEGIN DSA PRIVATE KEY",
        b"BEGIN EC PRIVATE KEY",
        b"BEGIN OPENSSH PRIVATE KEY",
        b"BEGIN PRIVATE KEY",
        b"PuTTY-User-Key-File-2",
        b"BEGIN SSH2 ENCRYPTED PRIVATE KEY",
        b"BEGIN PGP PRIVATE KEY BLOCK",
        b"BEGIN ENCRYPTED PRIVATE KEY",
        b"BEGIN OpenVPN Static key V1",
    ];

    let mut failed = false;
    for file in inv.files {
        let content = inv.read(file)?;
        let found = BLACKLIST
            .iter()
            .any(|needle| content.windows(needle.len()).any(|w| w == *needle));
        if found {
            let _ = writeln!(out, "Private key found: {}", file.display());
            failed = true;
        }
    }
    Ok(failed)
}
