//! File type identification
//!
//! Every candidate file gets a set of tags used by the `types`, `types_or`
//! and `exclude_types` filters:
//!
//! - kind: `file`, `symlink`, `directory`
//! - mode: `executable` or `non-executable`
//! - encoding: `text` or `binary` (NUL byte in the first 8 KiB)
//! - language tags from the extension, the file name or a shebang line

use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::Path;

/// Tags of one file
pub type Tags = BTreeSet<&'static str>;

const SNIFF_LEN: usize = 8 * 1024;

fn extension_tags(ext: &str) -> &'static [&'static str] {
    match ext {
        "json" => &["json"],
        "jsonc" => &["jsonc"],
        "json5" => &["json5"],
        "yaml" | "yml" => &["yaml"],
        "toml" => &["toml"],
        "lock" => &["lock"],
        "py" => &["python"],
        "pyi" => &["python", "pyi"],
        "rs" => &["rust"],
        "sh" => &["shell", "sh"],
        "bash" => &["shell", "bash"],
        "zsh" => &["shell", "zsh"],
        "fish" => &["fish"],
        "md" | "markdown" => &["markdown"],
        "rst" => &["rst"],
        "txt" => &["plain-text"],
        "js" | "mjs" | "cjs" => &["javascript"],
        "jsx" => &["javascript", "jsx"],
        "ts" | "mts" | "cts" => &["ts"],
        "tsx" => &["ts", "tsx"],
        "html" | "htm" => &["html"],
        "css" => &["css"],
        "scss" => &["scss"],
        "c" => &["c"],
        "h" => &["c", "header"],
        "cc" | "cpp" | "cxx" => &["c++"],
        "hpp" | "hh" | "hxx" => &["c++", "header"],
        "go" => &["go"],
        "java" => &["java"],
        "kt" | "kts" => &["kotlin"],
        "rb" => &["ruby"],
        "pl" | "pm" => &["perl"],
        "lua" => &["lua"],
        "sql" => &["sql"],
        "xml" => &["xml"],
        "svg" => &["svg", "xml", "image"],
        "ini" => &["ini"],
        "cfg" => &["ini"],
        "csv" => &["csv"],
        "proto" => &["proto"],
        "tf" | "tfvars" => &["terraform"],
        "nix" => &["nix"],
        "dockerfile" => &["dockerfile"],
        "png" => &["image", "png"],
        "jpg" | "jpeg" => &["image", "jpeg"],
        "gif" => &["image", "gif"],
        "ico" => &["image", "icon"],
        "pdf" => &["pdf"],
        "zip" => &["zip"],
        "gz" | "tgz" => &["gzip"],
        _ => &[],
    }
}

fn name_tags(name: &str) -> &'static [&'static str] {
    match name {
        "Dockerfile" | "Containerfile" => &["dockerfile"],
        "Makefile" | "makefile" | "GNUmakefile" => &["makefile"],
        "Cargo.lock" => &["toml", "lock"],
        "Pipfile" => &["toml"],
        ".bashrc" | ".bash_profile" | ".bash_aliases" => &["shell", "bash"],
        ".zshrc" | ".zshenv" | ".zprofile" => &["shell", "zsh"],
        ".gitignore" | ".dockerignore" => &["gitignore"],
        ".gitattributes" => &["gitattributes"],
        ".pre-commit-config.yaml" | ".pre-commit-hooks.yaml" => &["yaml"],
        "LICENSE" | "COPYING" => &["plain-text"],
        _ => &[],
    }
}

fn interpreter_tags(interpreter: &str) -> &'static [&'static str] {
    match interpreter {
        "sh" | "dash" => &["shell", "sh"],
        "bash" => &["shell", "bash"],
        "zsh" => &["shell", "zsh"],
        "python" | "python2" | "python3" => &["python"],
        "node" | "nodejs" => &["javascript"],
        "ruby" => &["ruby"],
        "perl" => &["perl"],
        "lua" => &["lua"],
        _ => &[],
    }
}

/// Interpreter named by a `#!` line, looking through `/usr/bin/env`
fn shebang_interpreter(head: &[u8]) -> Option<String> {
    let line = head.strip_prefix(b"#!")?;
    let line = line.split(|b| *b == b'\n').next()?;
    let line = String::from_utf8_lossy(line);
    let mut words = line.split_whitespace();

    let program = words.next()?;
    let program = program.rsplit('/').next().unwrap_or(program);
    let program = if program == "env" {
        words.find(|w| !w.starts_with('-'))?
    } else {
        program
    };

    // python3.12 -> python3
    let base = program
        .split_once('.')
        .map_or(program, |(name, _)| name);
    Some(base.to_string())
}

/// Identify a file by path
///
/// Returns an empty set for paths that do not exist.
#[must_use]
pub fn tags_for(path: &Path) -> Tags {
    let mut tags = Tags::new();

    let Ok(meta) = fs::symlink_metadata(path) else {
        return tags;
    };

    if meta.file_type().is_symlink() {
        tags.insert("symlink");
        return tags;
    }
    if meta.is_dir() {
        tags.insert("directory");
        return tags;
    }

    tags.insert("file");
    let executable = is_executable(&meta);
    tags.insert(if executable {
        "executable"
    } else {
        "non-executable"
    });

    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        tags.extend(name_tags(name));
        if let Some((_, ext)) = name.rsplit_once('.')
            && !ext.is_empty()
        {
            tags.extend(extension_tags(&ext.to_ascii_lowercase()));
        }
    }

    let head = read_head(path).unwrap_or_default();
    if head.contains(&0) {
        tags.insert("binary");
    } else {
        tags.insert("text");
        if executable && let Some(interpreter) = shebang_interpreter(&head) {
            tags.extend(interpreter_tags(&interpreter));
        }
    }

    tags
}

fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(SNIFF_LEN);
    fs::File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(unix)]
fn is_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &fs::Metadata) -> bool {
    false
}
