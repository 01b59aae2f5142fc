// ============================================================================
// src/checksum.rs – Image integrity store (filename → SHA-256)
// ============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::profile::is_image_file;
use crate::ui::UX;
use crate::util::atomic::atomic_write_toml;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    checksums: BTreeMap<String, String>,
}

/// Persistent filename → checksum map. Keys are unique by construction and
/// the serializer quotes them, so any filename round-trips.
#[derive(Debug)]
pub struct ChecksumStore {
    path: PathBuf,
    records: BTreeMap<String, String>,
    dirty: bool,
}

impl ChecksumStore {
    /// Load the store at `path`; a missing file is an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("read checksum store {}", path.display()))?;
            toml::from_str::<StoreFile>(&text)
                .with_context(|| format!("parse checksum store {}", path.display()))?
                .checksums
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            records,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, filename: &str) -> Option<&str> {
        self.records.get(filename).map(String::as_str)
    }

    /// Replace any record for `filename`. Returns whether anything changed.
    pub fn record(&mut self, filename: &str, checksum: &str) -> bool {
        if self.get(filename) == Some(checksum) {
            return false;
        }
        self.records
            .insert(filename.to_string(), checksum.to_string());
        self.dirty = true;
        true
    }

    /// Write the store if it changed since it was opened or last saved.
    pub fn save(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        let doc = StoreFile {
            checksums: self.records.clone(),
        };
        atomic_write_toml(&self.path, &doc)?;
        self.dirty = false;
        Ok(true)
    }
}

/// Streaming SHA-256 of a file, lowercase hex.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = BufReader::with_capacity(1 << 16, file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1 << 16];
    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Unchanged,
    Recorded,
    Updated,
    WouldRecord,
    WouldUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumReport {
    pub filename: String,
    pub checksum: String,
    pub verdict: Verdict,
}

/// Hash every image under `images_dir` and reconcile with the store at
/// `store_path`. In simulate mode the store is never written.
pub fn verify_images(
    images_dir: &Path,
    store_path: &Path,
    dry_run: bool,
    ui: &UX,
) -> Result<Vec<ChecksumReport>> {
    let mut store = ChecksumStore::open(store_path)?;
    let mut images: Vec<PathBuf> = if images_dir.is_dir() {
        fs::read_dir(images_dir)
            .with_context(|| format!("read images directory {}", images_dir.display()))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image_file(p))
            .collect()
    } else {
        Vec::new()
    };
    images.sort();

    let mut reports = Vec::with_capacity(images.len());
    for image in images {
        let filename = match image.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let checksum = sha256_file(&image)?;
        let short = &checksum[..12];

        let verdict = match (store.get(&filename), dry_run) {
            (Some(stored), _) if stored == checksum => {
                ui.success(&format!("{filename}: checksum unchanged ({short}…)"));
                Verdict::Unchanged
            }
            (Some(_), true) => {
                ui.dry_run(&format!("{filename}: checksum changed; would update record"));
                Verdict::WouldUpdate
            }
            (None, true) => {
                ui.dry_run(&format!("{filename}: no record; would record {short}…"));
                Verdict::WouldRecord
            }
            (Some(_), false) => {
                store.record(&filename, &checksum);
                ui.warn(&format!("{filename}: checksum changed; record updated ({short}…)"));
                Verdict::Updated
            }
            (None, false) => {
                store.record(&filename, &checksum);
                ui.info(&format!("{filename}: checksum recorded ({short}…)"));
                Verdict::Recorded
            }
        };
        reports.push(ChecksumReport {
            filename,
            checksum,
            verdict,
        });
    }

    if !dry_run && store.save()? {
        ui.note(&format!("Checksum store written to {}", store.path().display()));
    }
    Ok(reports)
}
