// ============================================================================
// src/virt.rs – Thin wrappers around qemu-img, cloud-localds, file, virsh,
//               systemctl and virt-install
// ============================================================================

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::cmd::base::{path_arg, OutputData, Runner};
use crate::error::ProvisionError;

pub const ISO_MARKER: &str = "ISO 9660";
pub const BOOTABLE_MARKER: &str = "bootable";

/// How the installer reaches the install medium.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootMedia {
    Cdrom(PathBuf),
    Location(PathBuf),
}

impl BootMedia {
    /// `file` output mentioning "bootable" means the ISO can boot as a CD-ROM;
    /// anything else is handed to the installer as a tree location.
    pub fn from_inspection(file_output: &str, image: &Path) -> Self {
        if file_output.contains(BOOTABLE_MARKER) {
            BootMedia::Cdrom(image.to_path_buf())
        } else {
            BootMedia::Location(image.to_path_buf())
        }
    }

    fn push_args(&self, args: &mut Vec<String>) {
        match self {
            BootMedia::Cdrom(p) => {
                args.push("--cdrom".into());
                args.push(path_arg(p));
            }
            BootMedia::Location(p) => {
                args.push("--location".into());
                args.push(path_arg(p));
            }
        }
    }
}

/// Everything `virt-install` needs for one guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSpec {
    pub name: String,
    pub memory_mb: u32,
    pub vcpus: u32,
    pub disk: PathBuf,
    pub disk_format: String,
    pub seed: Option<PathBuf>,
    pub driver_iso: Option<PathBuf>,
    pub os_variant: String,
    pub graphics: String,
    pub console: String,
    pub boot: BootMedia,
    pub extra_args: Option<String>,
}

impl InstallSpec {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--name".to_string(),
            self.name.clone(),
            "--memory".to_string(),
            self.memory_mb.to_string(),
            "--vcpus".to_string(),
            self.vcpus.to_string(),
            "--disk".to_string(),
            format!(
                "path={},format={},bus=virtio",
                self.disk.display(),
                self.disk_format
            ),
        ];
        if let Some(seed) = &self.seed {
            args.push("--disk".into());
            args.push(format!("path={},device=cdrom", seed.display()));
        }
        if let Some(driver) = &self.driver_iso {
            args.push("--disk".into());
            args.push(format!("path={},device=cdrom", driver.display()));
        }
        args.extend([
            "--os-variant".to_string(),
            self.os_variant.clone(),
            "--graphics".to_string(),
            self.graphics.clone(),
            "--console".to_string(),
            self.console.clone(),
            "--noautoconsole".to_string(),
        ]);
        self.boot.push_args(&mut args);
        if let Some(extra) = &self.extra_args {
            args.push("--extra-args".into());
            args.push(extra.clone());
        }
        args
    }
}

/// Host virtualization toolkit driven through a [`Runner`].
pub struct Virt<'a, R: Runner + ?Sized> {
    runner: &'a R,
}

impl<'a, R: Runner + ?Sized> Virt<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    /// `file -b <path>` output.
    pub fn inspect(&self, path: &Path) -> Result<String> {
        let out = self.checked("file", vec!["-b".into(), path_arg(path)])?;
        Ok(out.stdout.trim().to_string())
    }

    pub fn create_disk_args(path: &Path, format: &str, size_gb: u32) -> Vec<String> {
        vec![
            "create".into(),
            "-f".into(),
            format.to_string(),
            path_arg(path),
            format!("{size_gb}G"),
        ]
    }

    pub fn create_disk(&self, path: &Path, format: &str, size_gb: u32) -> Result<()> {
        self.checked("qemu-img", Self::create_disk_args(path, format, size_gb))?;
        Ok(())
    }

    pub fn seed_args(seed: &Path, user_data: &Path, meta_data: &Path) -> Vec<String> {
        vec![path_arg(seed), path_arg(user_data), path_arg(meta_data)]
    }

    pub fn build_seed(&self, seed: &Path, user_data: &Path, meta_data: &Path) -> Result<()> {
        self.checked("cloud-localds", Self::seed_args(seed, user_data, meta_data))?;
        Ok(())
    }

    /// Installed, active, and answering: each failure maps to its own error.
    pub fn ensure_daemon(&self, service: &str, uri: &str) -> Result<()> {
        for tool in ["virsh", "systemctl"] {
            if self.runner.which(tool).is_none() {
                return Err(ProvisionError::DaemonNotInstalled(tool.into()).into());
            }
        }

        let active = self.runner.run(
            "systemctl",
            &["is-active".into(), "--quiet".into(), service.to_string()],
        )?;
        if !active.success() {
            return Err(ProvisionError::DaemonInactive(service.to_string()).into());
        }

        let list = self.runner.run(
            "virsh",
            &["-c".into(), uri.to_string(), "list".into(), "--all".into()],
        )?;
        if !list.success() {
            return Err(ProvisionError::DaemonUnreachable {
                uri: uri.to_string(),
                detail: list.detail(),
            }
            .into());
        }
        Ok(())
    }

    pub fn install(&self, spec: &InstallSpec) -> Result<()> {
        self.checked("virt-install", spec.to_args())?;
        Ok(())
    }

    fn checked(&self, program: &str, args: Vec<String>) -> Result<OutputData> {
        let out = self.runner.run(program, &args)?;
        if !out.success() {
            return Err(ProvisionError::CommandFailed {
                program: program.to_string(),
                status: out.status,
                detail: out.detail(),
            }
            .into());
        }
        Ok(out)
    }
}
