// ============================================================================
// src/util/audit.rs – Append-only, timestamped run log
// ============================================================================

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::Mutex;

/// Line-oriented log file. Each entry is `[YYYY-MM-DD HH:MM:SS] LEVEL: detail`.
#[derive(Debug)]
pub struct AuditLog {
    file: Mutex<File>,
}

impl AuditLog {
    /// Open (creating if needed) the log at `path` in append mode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("create log directory {}", dir.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o644)
            .open(path)
            .with_context(|| format!("open log file {}", path.display()))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Append one entry. Write failures are swallowed so logging never
    /// aborts a run that is otherwise healthy.
    pub fn append(&self, level: &str, detail: &str) {
        let ts = Local::now().format("%Y-%m-%d %H:%M:%S");
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{}", format_entry(&ts.to_string(), level, detail));
        }
    }
}

pub(crate) fn format_entry(ts: &str, level: &str, detail: &str) -> String {
    format!("[{ts}] {level}: {detail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn entries_append_across_reopens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("provision.log");

        AuditLog::open(&path).unwrap().append("INFO", "first");
        AuditLog::open(&path).unwrap().append("ERROR", "second");

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] INFO: first"));
        assert!(lines[1].ends_with("] ERROR: second"));
    }

    #[test]
    fn entry_layout() {
        assert_eq!(
            format_entry("2024-01-02 03:04:05", "WARN", "disk busy"),
            "[2024-01-02 03:04:05] WARN: disk busy"
        );
    }
}
