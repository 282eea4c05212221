//! `pygrep` language: the hook entry is a regular expression
//!
//! Lines matching the pattern are printed as `file:line:text` and fail the
//! hook. With `--negate`, files that do *not* match anywhere fail instead.

use hitch_core::{Error, Result};
use regex::bytes::RegexBuilder;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, Copy)]
struct Flags {
    ignore_case: bool,
    multiline: bool,
    negate: bool,
}

fn parse_flags(hook: &str, args: &[String]) -> Result<Flags> {
    let mut flags = Flags::default();
    for arg in args {
        match arg.as_str() {
            "-i" | "--ignore-case" => flags.ignore_case = true,
            "--multiline" => flags.multiline = true,
            "--negate" => flags.negate = true,
            other => {
                return Err(Error::execution(
                    hook,
                    format!("unsupported pygrep argument '{other}'"),
                ));
            }
        }
    }
    Ok(flags)
}

/// Search `files` for `pattern`; returns the exit code and report
pub fn run(
    hook: &str,
    pattern: &str,
    args: &[String],
    files: &[PathBuf],
    work_tree: &Path,
) -> Result<(i32, String)> {
    let flags = parse_flags(hook, args)?;
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(flags.ignore_case)
        .multi_line(flags.multiline)
        .dot_matches_new_line(flags.multiline)
        .build()
        .map_err(|e| Error::execution(hook, format!("invalid pattern: {e}")))?;

    let mut output = String::new();
    let mut failed = false;

    for file in files {
        let content = fs::read(work_tree.join(file))?;
        let name = file.display();

        if flags.negate {
            if !regex.is_match(&content) {
                let _ = writeln!(output, "{name}");
                failed = true;
            }
            continue;
        }

        if flags.multiline {
            for m in regex.find_iter(&content) {
                let lineno = content[..m.start()].iter().filter(|b| **b == b'\n').count() + 1;
                let _ = writeln!(
                    output,
                    "{name}:{lineno}:{}",
                    String::from_utf8_lossy(m.as_bytes())
                );
                failed = true;
            }
            continue;
        }

        for (index, line) in content.split(|b| *b == b'\n').enumerate() {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if regex.is_match(line) {
                let _ = writeln!(
                    output,
                    "{name}:{}:{}",
                    index + 1,
                    String::from_utf8_lossy(line)
                );
                failed = true;
            }
        }
    }

    Ok((i32::from(failed), output))
}
