// ============================================================================
// src/config.rs – optional config file + on-disk layout
// ============================================================================

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const BASE_DIR_ENV: &str = "VM_PROVISION_BASE";
pub const DEFAULT_BASE_NAME: &str = "vm-provisioning";
pub const CONFIG_FILE_NAME: &str = "provision.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paths {
    /// Root of the images/configs/vms tree.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    /// Optional driver ISO attached to Windows guests.
    #[serde(default)]
    pub driver_iso: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmCfg {
    #[serde(default = "default_disk_size_gb")]
    pub disk_size_gb: u32,
    #[serde(default = "default_graphics")]
    pub graphics: String,
    #[serde(default = "default_console")]
    pub console: String,
    /// Kernel arguments passed to non-Windows installers.
    #[serde(default = "default_extra_args")]
    pub extra_args: String,
}

fn default_disk_size_gb() -> u32 {
    20
}

fn default_graphics() -> String {
    "vnc,listen=127.0.0.1".to_string()
}

fn default_console() -> String {
    "pty,target_type=serial".to_string()
}

fn default_extra_args() -> String {
    "console=ttyS0,115200n8".to_string()
}

impl Default for VmCfg {
    fn default() -> Self {
        Self {
            disk_size_gb: default_disk_size_gb(),
            graphics: default_graphics(),
            console: default_console(),
            extra_args: default_extra_args(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    #[serde(default = "default_libvirt_uri")]
    pub libvirt_uri: String,
    #[serde(default = "default_daemon_service")]
    pub daemon_service: String,
    /// Package-manager invocation; the package name is appended.
    #[serde(default = "default_installer")]
    pub installer: Vec<String>,
    /// Unset means external commands may run indefinitely.
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
}

fn default_libvirt_uri() -> String {
    "qemu:///system".to_string()
}

fn default_daemon_service() -> String {
    "libvirtd".to_string()
}

fn default_installer() -> Vec<String> {
    vec!["apt-get".into(), "install".into(), "-y".into()]
}

impl Default for Host {
    fn default() -> Self {
        Self {
            libvirt_uri: default_libvirt_uri(),
            daemon_service: default_daemon_service(),
            installer: default_installer(),
            command_timeout_secs: None,
        }
    }
}

impl Host {
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub vm: VmCfg,
    #[serde(default)]
    pub host: Host,
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Parse a TOML (`.toml`) or YAML (anything else) config file.
    pub fn load<P: AsRef<Path>>(p: P) -> Result<Self> {
        let s = fs::read_to_string(&p)
            .with_context(|| format!("read config: {}", p.as_ref().display()))?;
        let mut cfg: Self = if p.as_ref().extension().and_then(|e| e.to_str()) == Some("toml") {
            toml::from_str(&s).context("toml parse")?
        } else {
            serde_yaml::from_str(&s).context("yaml parse")?
        };
        if cfg.host.installer.is_empty() {
            return Err(anyhow!("host.installer must name at least a program"));
        }
        cfg.path = Some(p.as_ref().to_path_buf());
        Ok(cfg)
    }

    /// An explicit path must exist; otherwise `fallback` is used when
    /// present, and built-in defaults when it is not.
    pub fn discover(explicit: Option<&Path>, fallback: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None if fallback.is_file() => Self::load(fallback),
            None => Ok(Self::default()),
        }
    }
}

/// Explicit base directory: `--base-dir`, then `VM_PROVISION_BASE`. Either
/// one beats `paths.base_dir` from the config file.
pub fn base_dir_override(flag: Option<&Path>, env: Option<OsString>) -> Option<PathBuf> {
    flag.map(Path::to_path_buf)
        .or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
}

/// Where to look for the config file: the override if any, else
/// `~/vm-provisioning`.
pub fn initial_base_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir.to_path_buf());
    }
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_BASE_NAME))
        .ok_or_else(|| anyhow!("cannot determine home directory; set {BASE_DIR_ENV}"))
}

/// Every path the provisioner reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub base: PathBuf,
    pub images: PathBuf,
    pub configs: PathBuf,
    pub vms: PathBuf,
    pub driver_iso: PathBuf,
    pub checksum_store: PathBuf,
    pub log_file: PathBuf,
}

impl Layout {
    pub fn new<P: AsRef<Path>>(base: P, cfg: &Config) -> Self {
        let base = base.as_ref().to_path_buf();
        Self {
            images: base.join("images"),
            configs: base.join("configs"),
            vms: base.join("vms"),
            driver_iso: cfg
                .paths
                .driver_iso
                .clone()
                .unwrap_or_else(|| base.join("drivers").join("virtio-win.iso")),
            checksum_store: base.join("checksums.toml"),
            log_file: base.join("provision.log"),
            base,
        }
    }

    /// Override (flag or environment) wins, then `paths.base_dir` from
    /// config, then the pre-config default.
    pub fn resolve(override_dir: Option<&Path>, initial: &Path, cfg: &Config) -> Self {
        let base = match (override_dir, cfg.paths.base_dir.as_ref()) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(dir)) => dir.clone(),
            (None, None) => initial.to_path_buf(),
        };
        Self::new(base, cfg)
    }

    pub fn user_data(&self) -> PathBuf {
        self.configs.join("user-data")
    }

    pub fn meta_data(&self) -> PathBuf {
        self.configs.join("meta-data")
    }

    pub fn seed_image(&self, vm: &str) -> PathBuf {
        self.configs.join(format!("{vm}-seed.iso"))
    }

    pub fn disk_image(&self, vm: &str, format: &str) -> PathBuf {
        self.vms.join(format!("{vm}.{format}"))
    }
}
