// ============================================================================
// src/changelog.rs – CHANGELOG.md from git history
// ============================================================================

use anyhow::Result;
use chrono::Local;
use std::path::{Path, PathBuf};

use crate::cmd::base::{path_arg, Runner};
use crate::error::ProvisionError;
use crate::util::atomic::atomic_write_bytes;

pub const OUTPUT_FILE: &str = "CHANGELOG.md";
pub const TITLE: &str = "# Changelog";

/// One line per commit, oldest first: `- <date> <subject> (<short hash>)`.
const LOG_ARGS: &[&str] = &[
    "log",
    "--reverse",
    "--date=short",
    "--pretty=format:- %ad %s (%h)",
];

/// Header, timestamp line, blank line, commits, trailing newline.
pub fn render(generated_at: &str, commits: &[String]) -> String {
    let mut out = format!("{TITLE}\nGenerated on {generated_at}\n\n");
    for line in commits {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Commit lines for the repository at `repo`, oldest to newest.
pub fn collect<R: Runner + ?Sized>(runner: &R, repo: &Path) -> Result<Vec<String>> {
    let mut args = vec!["-C".to_string(), path_arg(repo)];
    args.extend(LOG_ARGS.iter().map(|a| a.to_string()));

    let out = runner.run("git", &args)?;
    if !out.success() {
        return Err(ProvisionError::CommandFailed {
            program: "git".into(),
            status: out.status,
            detail: out.detail(),
        }
        .into());
    }
    Ok(out
        .stdout
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Query history and overwrite `<repo>/CHANGELOG.md`. Returns the written
/// path and the number of commits.
pub fn generate<R: Runner + ?Sized>(runner: &R, repo: &Path) -> Result<(PathBuf, usize)> {
    let commits = collect(runner, repo)?;
    let stamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let target = repo.join(OUTPUT_FILE);
    atomic_write_bytes(&target, render(&stamp, &commits).as_bytes(), 0o644)?;
    Ok((target, commits.len()))
}
