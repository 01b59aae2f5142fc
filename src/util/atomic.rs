// ============================================================================
// src/util/atomic.rs – Durable atomic replacement of small state files
// ============================================================================

use anyhow::{bail, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

fn parent_dir(path: &Path) -> Result<PathBuf> {
    match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Ok(PathBuf::from(".")),
        Some(p) => Ok(p.to_path_buf()),
        None => bail!("target path has no parent directory: {}", path.display()),
    }
}

/// Fsync a directory so the rename is persisted.
fn fsync_dir(dir: &Path) -> Result<()> {
    let f = File::open(dir).with_context(|| format!("open dir for fsync: {dir:?}"))?;
    f.sync_all()
        .with_context(|| format!("fsync dir failed: {dir:?}"))?;
    Ok(())
}

fn reject_symlink_target(path: &Path) -> Result<()> {
    if let Ok(meta) = fs::symlink_metadata(path) {
        if meta.file_type().is_symlink() {
            bail!("refusing to write through symlink: {}", path.display());
        }
    }
    Ok(())
}

/// Write `bytes` to a sibling temp file, fsync it, rename it over `path`,
/// then fsync the parent directory. Readers see either the old or the new
/// contents, never a torn file.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8], mode: u32) -> Result<()> {
    reject_symlink_target(path)?;

    let dir = parent_dir(path)?;
    if !dir.exists() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("create parent directory failed: {dir:?}"))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("target path missing file name")?;

    let mut tmp = dir.join(format!("{file_name}.tmp-{}", nanoid::nanoid!(8)));
    for _ in 0..8 {
        if !tmp.exists() {
            break;
        }
        tmp = dir.join(format!("{file_name}.tmp-{}", nanoid::nanoid!(8)));
    }

    let mut f = OpenOptions::new()
        .create_new(true)
        .write(true)
        .mode(mode)
        .open(&tmp)
        .with_context(|| format!("open temp file failed: {tmp:?}"))?;

    let written = f
        .write_all(bytes)
        .context("write to temp file failed")
        .and_then(|_| f.sync_all().context("fsync temp file failed"));
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }

    fs::rename(&tmp, path).with_context(|| {
        format!(
            "atomic rename failed ({} -> {})",
            tmp.display(),
            path.display()
        )
    })?;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("set permissions failed for {}", path.display()))?;

    fsync_dir(&dir)?;
    Ok(())
}

/// Atomic write of a TOML-serializable value with 0644 permissions.
pub fn atomic_write_toml<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = toml::to_string_pretty(value).context("serialize TOML failed")?;
    atomic_write_bytes(path, s.as_bytes(), 0o644)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn replaces_contents_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("state").join("store.toml");

        atomic_write_bytes(&target, b"one", 0o644).unwrap();
        atomic_write_bytes(&target, b"two", 0o644).unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "two");
        let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn refuses_symlink_destination() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real");
        let link = dir.path().join("link");
        fs::write(&real, "x").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        assert!(atomic_write_bytes(&link, b"y", 0o644).is_err());
        assert_eq!(fs::read_to_string(&real).unwrap(), "x");
    }
}
