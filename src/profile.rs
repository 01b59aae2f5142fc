// ============================================================================
// src/profile.rs – Image filename → VM profile classification
// ============================================================================

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ProvisionError;

/// Extensions treated as candidate images.
pub const IMAGE_EXTENSIONS: &[&str] = &["iso"];

/// OS identifier used when a versioned family has no version in its name.
pub const UNVERSIONED_LINUX: &str = "linux2022";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    Contains(&'static str),
    AnyOf(&'static [&'static str]),
}

impl Matcher {
    /// Case-sensitive substring test.
    pub fn matches(&self, filename: &str) -> bool {
        match self {
            Matcher::Contains(needle) => filename.contains(needle),
            Matcher::AnyOf(needles) => needles.iter().any(|n| filename.contains(n)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsIdent {
    Fixed(&'static str),
    /// Prefix + first `N.N` run, e.g. `ubuntu22.04`.
    DottedVersion(&'static str),
    /// Prefix + first digit run, e.g. `debian12`.
    MajorVersion(&'static str),
}

impl OsIdent {
    pub fn render(&self, filename: &str) -> String {
        match self {
            OsIdent::Fixed(id) => id.to_string(),
            OsIdent::DottedVersion(prefix) => dotted_version(filename)
                .map(|v| format!("{prefix}{v}"))
                .unwrap_or_else(|| UNVERSIONED_LINUX.to_string()),
            OsIdent::MajorVersion(prefix) => major_version(filename)
                .map(|v| format!("{prefix}{v}"))
                .unwrap_or_else(|| UNVERSIONED_LINUX.to_string()),
        }
    }
}

/// One row of the classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub matcher: Matcher,
    pub os: OsIdent,
    pub disk_format: &'static str,
    pub memory_mb: u32,
    pub vcpus: u32,
}

/// Evaluated top to bottom; the first match wins.
pub const RULES: &[Rule] = &[
    Rule {
        matcher: Matcher::Contains("Server2022"),
        os: OsIdent::Fixed("win2k22"),
        disk_format: "qcow2",
        memory_mb: 8192,
        vcpus: 4,
    },
    Rule {
        matcher: Matcher::Contains("win"),
        os: OsIdent::Fixed("win10"),
        disk_format: "qcow2",
        memory_mb: 4096,
        vcpus: 2,
    },
    Rule {
        matcher: Matcher::Contains("ubuntu"),
        os: OsIdent::DottedVersion("ubuntu"),
        disk_format: "qcow2",
        memory_mb: 3072,
        vcpus: 2,
    },
    Rule {
        matcher: Matcher::Contains("debian"),
        os: OsIdent::MajorVersion("debian"),
        disk_format: "qcow2",
        memory_mb: 2048,
        vcpus: 2,
    },
    Rule {
        matcher: Matcher::Contains("fedora"),
        os: OsIdent::Fixed("fedora-unknown"),
        disk_format: "qcow2",
        memory_mb: 2048,
        vcpus: 2,
    },
    Rule {
        matcher: Matcher::AnyOf(&["centos", "rocky"]),
        os: OsIdent::Fixed("centos-stream9"),
        disk_format: "qcow2",
        memory_mb: 2048,
        vcpus: 2,
    },
];

/// Applied when no rule matches.
pub const FALLBACK: Rule = Rule {
    matcher: Matcher::AnyOf(&[]),
    os: OsIdent::Fixed("generic"),
    disk_format: "qcow2",
    memory_mb: 2048,
    vcpus: 2,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub filename: String,
    pub image: PathBuf,
    pub os_variant: String,
    pub disk_format: String,
    pub memory_mb: u32,
    pub vcpus: u32,
}

impl Profile {
    /// Build a profile from an image path using [`RULES`].
    pub fn classify(image: &Path) -> Option<Self> {
        let filename = image.file_name()?.to_str()?.to_string();
        let name = image.file_stem()?.to_str()?.to_string();
        let rule = RULES
            .iter()
            .find(|r| r.matcher.matches(&filename))
            .unwrap_or(&FALLBACK);

        Some(Self {
            os_variant: rule.os.render(&filename),
            disk_format: rule.disk_format.to_string(),
            memory_mb: rule.memory_mb,
            vcpus: rule.vcpus,
            image: image.to_path_buf(),
            name,
            filename,
        })
    }

    pub fn is_windows(&self) -> bool {
        self.os_variant.starts_with("win")
    }

    pub fn image_exists(&self) -> bool {
        self.image.is_file()
    }
}

/// Immutable name → profile mapping built once per run.
#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    profiles: BTreeMap<String, Profile>,
}

impl ProfileSet {
    /// Scan `images_dir`. A missing directory yields an empty set.
    pub fn load(images_dir: &Path) -> Result<Self> {
        if !images_dir.is_dir() {
            return Ok(Self::default());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(images_dir)
            .with_context(|| format!("read images directory {}", images_dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image_file(p))
            .collect();
        files.sort();

        let profiles = files
            .iter()
            .filter_map(|file| Profile::classify(file))
            .map(|p| (p.name.clone(), p))
            .collect();
        Ok(Self { profiles })
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Profiles whose backing image still exists, sorted by name.
    pub fn available(&self) -> Vec<&Profile> {
        self.profiles.values().filter(|p| p.image_exists()).collect()
    }

    pub fn available_names(&self) -> Vec<String> {
        self.available().iter().map(|p| p.name.clone()).collect()
    }

    pub fn resolve(&self, name: &str) -> std::result::Result<&Profile, ProvisionError> {
        match self.profiles.get(name) {
            Some(profile) if profile.image_exists() => Ok(profile),
            _ => {
                let names = self.available_names();
                Err(ProvisionError::UnknownProfile {
                    name: name.to_string(),
                    available: if names.is_empty() {
                        "none".to_string()
                    } else {
                        names.join(", ")
                    },
                })
            }
        }
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// First `digits.digits` run in `s`.
fn dotted_version(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
            let mut end = i + 1;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            return Some(s[start..end].to_string());
        }
    }
    None
}

/// First digit run in `s`.
fn major_version(s: &str) -> Option<String> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let rest = &s[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn classify(name: &str) -> Profile {
        Profile::classify(Path::new(name)).unwrap()
    }

    #[test]
    fn windows_client_images_map_to_win10() {
        for name in ["win10.iso", "Win11_23H2_windows.iso", "my-win-build.img"] {
            let p = classify(name);
            assert_eq!(p.os_variant, "win10", "{name}");
            assert_eq!(p.memory_mb, 4096, "{name}");
            assert!(p.is_windows());
        }
    }

    #[test]
    fn server_2022_takes_precedence_over_win() {
        let p = classify("windows-Server2022-eval.iso");
        assert_eq!(p.os_variant, "win2k22");
        assert_eq!(p.memory_mb, 8192);
        assert_eq!(p.vcpus, 4);
    }

    #[test]
    fn matching_is_case_sensitive() {
        let p = classify("WIN10.iso");
        assert_eq!(p.os_variant, "generic");
        let p = classify("Ubuntu-22.04.iso");
        assert_eq!(p.os_variant, "generic");
    }

    #[test]
    fn ubuntu_version_feeds_identifier() {
        let p = classify("ubuntu-22.04.iso");
        assert_eq!(p.name, "ubuntu-22.04");
        assert_eq!(p.os_variant, "ubuntu22.04");
        assert_eq!(p.memory_mb, 3072);
        assert_eq!(p.disk_format, "qcow2");

        let p = classify("ubuntu-24.04.1-live-server-amd64.iso");
        assert_eq!(p.os_variant, "ubuntu24.04");
    }

    #[test]
    fn debian_takes_major_version() {
        let p = classify("debian-12.5.0-amd64-netinst.iso");
        assert_eq!(p.os_variant, "debian12");
        assert_eq!(p.memory_mb, 2048);
    }

    #[test]
    fn versionless_family_falls_back() {
        assert_eq!(classify("ubuntu-daily.iso").os_variant, UNVERSIONED_LINUX);
        assert_eq!(classify("debian-testing.iso").os_variant, UNVERSIONED_LINUX);
    }

    #[test]
    fn unmatched_names_get_generic_defaults() {
        let p = classify("alpine-virt-3.19.iso");
        assert_eq!(p.os_variant, FALLBACK.os.render(""));
        assert_eq!(p.memory_mb, FALLBACK.memory_mb);
        assert_eq!(p.vcpus, FALLBACK.vcpus);
        assert_eq!(p.disk_format, FALLBACK.disk_format);
    }

    #[test]
    fn rocky_and_centos_share_a_rule() {
        assert_eq!(classify("Rocky-9-rocky-x86_64.iso").os_variant, "centos-stream9");
        assert_eq!(classify("centos-stream-9.iso").os_variant, "centos-stream9");
    }

    #[test]
    fn load_filters_extensions_and_sorts() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ubuntu-22.04.iso"), b"x").unwrap();
        fs::write(dir.path().join("debian-12.iso"), b"x").unwrap();
        fs::write(dir.path().join("debian-12.qcow2"), b"x").unwrap();
        fs::write(dir.path().join("README.txt"), b"x").unwrap();
        fs::write(dir.path().join("upper.ISO"), b"x").unwrap();
        fs::create_dir(dir.path().join("nested.iso")).unwrap();

        let set = ProfileSet::load(dir.path()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.available_names(), vec!["debian-12", "ubuntu-22.04"]);
        assert_eq!(set.resolve("debian-12").unwrap().filename, "debian-12.iso");
    }

    #[test]
    fn missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let set = ProfileSet::load(&dir.path().join("absent")).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn availability_tracks_file_presence() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("fedora-40.iso");
        fs::write(&image, b"x").unwrap();
        let set = ProfileSet::load(dir.path()).unwrap();
        assert!(set.resolve("fedora-40").is_ok());

        fs::remove_file(&image).unwrap();
        assert!(set.available().is_empty());
        match set.resolve("fedora-40") {
            Err(ProvisionError::UnknownProfile { name, available }) => {
                assert_eq!(name, "fedora-40");
                assert_eq!(available, "none");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_name_lists_alternatives() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ubuntu-22.04.iso"), b"x").unwrap();
        let set = ProfileSet::load(dir.path()).unwrap();

        let err = set.resolve("ubuntu").unwrap_err();
        assert!(err.to_string().contains("ubuntu-22.04"));
    }
}
