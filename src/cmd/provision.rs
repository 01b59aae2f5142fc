// ============================================================================
// src/cmd/provision.rs – Image → disk → seed → virt-install workflow
// ============================================================================

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::checksum::verify_images;
use crate::cmd::base::{render_command, Runner};
use crate::cmd::doctor::run_doctor;
use crate::config::{Config, Layout};
use crate::error::ProvisionError;
use crate::profile::{Profile, ProfileSet};
use crate::ui::UX;
use crate::virt::{BootMedia, InstallSpec, Virt, ISO_MARKER};

/// Result of a run: what was (or in simulate mode, would be) produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub profile: Profile,
    pub disk: PathBuf,
    pub seed: Option<PathBuf>,
    pub driver_iso: Option<PathBuf>,
    pub install: InstallSpec,
    pub executed: bool,
}

/// Everything a provisioning run needs, borrowed for its duration.
pub struct Session<'a, R: Runner + ?Sized> {
    pub runner: &'a R,
    pub ui: &'a UX,
    pub cfg: &'a Config,
    pub layout: &'a Layout,
    pub dry_run: bool,
}

impl<'a, R: Runner + ?Sized> Session<'a, R> {
    fn virt(&self) -> Virt<'a, R> {
        Virt::new(self.runner)
    }

    /// Full run. Every step gates the next; the first error is returned
    /// untouched and nothing already created is rolled back.
    pub fn provision(&self, profiles: &ProfileSet, vm_name: &str) -> Result<Outcome> {
        let mode = if self.dry_run { "simulate" } else { "live" };
        self.ui.phase(&format!("Provision // {vm_name} ({mode})"));

        let profile = self.resolve_profile(profiles, vm_name)?.clone();

        run_doctor(self.runner, self.ui, &self.cfg.host.installer, self.dry_run)?;

        self.ui.phase("Image Integrity // Checksums");
        verify_images(
            &self.layout.images,
            &self.layout.checksum_store,
            self.dry_run,
            self.ui,
        )?;

        self.ui.phase("Install Medium // Inspection");
        let inspection = self.validate_image(&profile)?;
        self.ledger(&profile);

        self.ui.phase("Virtual Disk");
        let disk = self.create_disk(&profile)?;

        self.ui.phase("Hypervisor // libvirt");
        self.check_daemon()?;

        self.ui.phase("Guest Media");
        let (seed, driver_iso) = self.prepare_guest_media(&profile)?;

        let boot = match &inspection {
            Some(output) => BootMedia::from_inspection(output, &profile.image),
            None => BootMedia::Cdrom(profile.image.clone()),
        };
        match &boot {
            BootMedia::Cdrom(_) => self.ui.info("Image is bootable; attaching as CD-ROM."),
            BootMedia::Location(_) => self
                .ui
                .info("Image is not marked bootable; passing it as an install location."),
        }

        self.ui.phase("Guest Creation // virt-install");
        let install = self.install_spec(&profile, disk.clone(), seed.clone(), driver_iso.clone(), boot);
        let executed = self.install(&install)?;

        if executed {
            self.ui
                .success(&format!("Guest {} defined and installing.", profile.name));
        } else {
            self.ui
                .success(&format!("Simulation for {} complete; nothing was changed.", profile.name));
        }

        Ok(Outcome {
            profile,
            disk,
            seed,
            driver_iso,
            install,
            executed,
        })
    }

    /// Step 1: the name must belong to a profile whose image exists now.
    pub fn resolve_profile<'p>(
        &self,
        profiles: &'p ProfileSet,
        vm_name: &str,
    ) -> std::result::Result<&'p Profile, ProvisionError> {
        let profile = profiles.resolve(vm_name)?;
        self.ui.info(&format!(
            "Profile {} → {} ({} MiB, {} vCPU)",
            profile.name, profile.os_variant, profile.memory_mb, profile.vcpus
        ));
        Ok(profile)
    }

    /// Step 2: image present and recognized as ISO 9660. Returns the `file`
    /// output for the boot decision, or `None` when simulate mode could not
    /// inspect because `file` is not installed yet.
    pub fn validate_image(&self, profile: &Profile) -> Result<Option<String>> {
        if !profile.image.is_file() {
            return Err(ProvisionError::MissingImage(profile.image.clone()).into());
        }

        if self.dry_run && self.runner.which("file").is_none() {
            self.ui.dry_run(&format!(
                "file(1) unavailable; skipping inspection of {}",
                profile.image.display()
            ));
            return Ok(None);
        }

        let output = self.virt().inspect(&profile.image)?;
        if !output.contains(ISO_MARKER) {
            return Err(ProvisionError::InvalidImage {
                path: profile.image.clone(),
                detail: output,
            }
            .into());
        }
        self.ui.success(&format!("{}: {}", profile.filename, output));
        Ok(Some(output))
    }

    /// Step 3: fixed-size disk under `vms/`.
    pub fn create_disk(&self, profile: &Profile) -> Result<PathBuf> {
        let disk = self.layout.disk_image(&profile.name, &profile.disk_format);
        let size = self.cfg.vm.disk_size_gb;

        if self.dry_run {
            let args = Virt::<R>::create_disk_args(&disk, &profile.disk_format, size);
            self.ui
                .dry_run(&format!("would run: {}", render_command("qemu-img", &args)));
            return Ok(disk);
        }

        fs::create_dir_all(&self.layout.vms)
            .with_context(|| format!("create {}", self.layout.vms.display()))?;
        self.virt()
            .create_disk(&disk, &profile.disk_format, size)?;
        self.ui.success(&format!(
            "Created {} GiB {} disk at {}",
            size,
            profile.disk_format,
            disk.display()
        ));
        Ok(disk)
    }

    /// Step 4: libvirt installed, running, and answering. Skipped when
    /// simulating.
    pub fn check_daemon(&self) -> Result<()> {
        if self.dry_run {
            self.ui.dry_run("skipping libvirt daemon checks");
            return Ok(());
        }
        self.virt()
            .ensure_daemon(&self.cfg.host.daemon_service, &self.cfg.host.libvirt_uri)?;
        self.ui.success(&format!(
            "{} active; {} answering.",
            self.cfg.host.daemon_service, self.cfg.host.libvirt_uri
        ));
        Ok(())
    }

    /// Step 5: Windows guests get the driver ISO (if any) and no seed; all
    /// others need a cloud-init seed built from `user-data` + `meta-data`.
    pub fn prepare_guest_media(
        &self,
        profile: &Profile,
    ) -> Result<(Option<PathBuf>, Option<PathBuf>)> {
        if profile.is_windows() {
            let driver = &self.layout.driver_iso;
            let driver_iso = if driver.is_file() {
                self.ui
                    .info(&format!("Attaching driver ISO {}", driver.display()));
                Some(driver.clone())
            } else {
                self.ui.note(&format!(
                    "No driver ISO at {}; continuing without one.",
                    driver.display()
                ));
                None
            };
            self.ui.note("Windows guest: cloud-init seed not generated.");
            return Ok((None, driver_iso));
        }

        let user_data = self.layout.user_data();
        let meta_data = self.layout.meta_data();
        for input in [&user_data, &meta_data] {
            if !input.is_file() {
                if self.dry_run {
                    self.ui.warn(&format!(
                        "cloud-init input missing: {} (fatal in a live run)",
                        input.display()
                    ));
                } else {
                    return Err(ProvisionError::MissingCloudInit(input.clone()).into());
                }
            }
        }

        let seed = self.layout.seed_image(&profile.name);
        if self.dry_run {
            let args = Virt::<R>::seed_args(&seed, &user_data, &meta_data);
            self.ui.dry_run(&format!(
                "would run: {}",
                render_command("cloud-localds", &args)
            ));
        } else {
            self.virt().build_seed(&seed, &user_data, &meta_data)?;
            self.ui
                .success(&format!("Seed image written to {}", seed.display()));
        }
        Ok((Some(seed), None))
    }

    /// Step 7 inputs: fixed graphics/console, kernel args only off Windows.
    pub fn install_spec(
        &self,
        profile: &Profile,
        disk: PathBuf,
        seed: Option<PathBuf>,
        driver_iso: Option<PathBuf>,
        boot: BootMedia,
    ) -> InstallSpec {
        let extra = self.cfg.vm.extra_args.trim();
        InstallSpec {
            name: profile.name.clone(),
            memory_mb: profile.memory_mb,
            vcpus: profile.vcpus,
            disk,
            disk_format: profile.disk_format.clone(),
            seed,
            driver_iso,
            os_variant: profile.os_variant.clone(),
            graphics: self.cfg.vm.graphics.clone(),
            console: self.cfg.vm.console.clone(),
            boot,
            extra_args: (!profile.is_windows() && !extra.is_empty()).then(|| extra.to_string()),
        }
    }

    /// Step 7: run (or describe) `virt-install`. Returns whether it ran.
    pub fn install(&self, spec: &InstallSpec) -> Result<bool> {
        let line = render_command("virt-install", &spec.to_args());
        if self.dry_run {
            self.ui.dry_run(&format!("would run: {line}"));
            return Ok(false);
        }
        self.ui.info(&format!("Running: {line}"));
        self.virt().install(spec)?;
        Ok(true)
    }

    fn ledger(&self, profile: &Profile) {
        self.ui.data_panel(
            "Provision Ledger",
            &[
                ("VM", profile.name.clone()),
                ("Image", profile.image.display().to_string()),
                ("OS variant", profile.os_variant.clone()),
                ("Memory (MiB)", profile.memory_mb.to_string()),
                ("vCPUs", profile.vcpus.to_string()),
                (
                    "Disk",
                    format!("{} GiB {}", self.cfg.vm.disk_size_gb, profile.disk_format),
                ),
                ("Mode", if self.dry_run { "simulate" } else { "live" }.to_string()),
            ],
        );
    }
}

/// `--list` / `--help` body: one available profile per line.
pub fn list_profiles(profiles: &ProfileSet) -> Vec<String> {
    profiles.available_names()
}

/// Detail rows for the `--list` panel.
pub fn profile_rows(profiles: &ProfileSet) -> Vec<(String, String)> {
    profiles
        .available()
        .into_iter()
        .map(|p| {
            (
                p.name.clone(),
                format!(
                    "{} · {} MiB · {} vCPU · {}",
                    p.os_variant, p.memory_mb, p.vcpus, p.disk_format
                ),
            )
        })
        .collect()
}
