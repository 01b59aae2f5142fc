// ============================================================================
// src/cmd/doctor.rs – Verify (and repair) host tooling before provisioning
// ============================================================================

use anyhow::Result;

use crate::cmd::base::{render_command, Runner};
use crate::error::ProvisionError;
use crate::ui::UX;

/// (command, package providing it)
pub const DEPENDENCIES: &[(&str, &str)] = &[
    ("qemu-img", "qemu-utils"),
    ("cloud-localds", "cloud-image-utils"),
    ("virt-install", "virtinst"),
    ("virsh", "libvirt-clients"),
    ("file", "file"),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Pass,
    Fixed,
    WouldInstall,
    Fail,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Pass => "[PASS]",
            Status::Fixed => "[FIXED]",
            Status::WouldInstall => "[WOULD INSTALL]",
            Status::Fail => "[FAIL]",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub command: &'static str,
    pub package: &'static str,
    pub status: Status,
    pub detail: String,
}

/// Check every entry in [`DEPENDENCIES`]. Missing commands are reported in
/// simulate mode and installed otherwise; the first failed install aborts.
pub fn run_doctor<R: Runner + ?Sized>(
    runner: &R,
    ui: &UX,
    installer: &[String],
    dry_run: bool,
) -> Result<Vec<ReportEntry>> {
    ui.phase("Host Tooling // Dependency Check");
    let mut report = Vec::with_capacity(DEPENDENCIES.len());

    for &(command, package) in DEPENDENCIES {
        if let Some(path) = runner.which(command) {
            log_entry(
                &mut report,
                ui,
                command,
                package,
                Status::Pass,
                format!("{command} found at {}", path.display()),
            );
            continue;
        }

        if dry_run {
            log_entry(
                &mut report,
                ui,
                command,
                package,
                Status::WouldInstall,
                format!("{command} missing; would install package {package}"),
            );
            continue;
        }

        match install_package(runner, installer, command, package) {
            Ok(()) => log_entry(
                &mut report,
                ui,
                command,
                package,
                Status::Fixed,
                format!("installed {package} for {command}"),
            ),
            Err(err) => {
                log_entry(
                    &mut report,
                    ui,
                    command,
                    package,
                    Status::Fail,
                    err.to_string(),
                );
                summarize(&report, ui);
                return Err(err.into());
            }
        }
    }

    summarize(&report, ui);
    Ok(report)
}

fn install_package<R: Runner + ?Sized>(
    runner: &R,
    installer: &[String],
    command: &str,
    package: &str,
) -> std::result::Result<(), ProvisionError> {
    let failure = |detail: String| ProvisionError::DependencyInstall {
        command: command.to_string(),
        package: package.to_string(),
        detail,
    };

    let (program, base_args) = installer
        .split_first()
        .ok_or_else(|| failure("no installer configured".to_string()))?;
    let mut args = base_args.to_vec();
    args.push(package.to_string());

    tracing::debug!(line = %render_command(program, &args), "installing dependency");
    let out = runner
        .run(program, &args)
        .map_err(|err| failure(err.to_string()))?;
    if !out.success() {
        return Err(failure(format!("exit status {}: {}", out.status, out.detail())));
    }
    if runner.which(command).is_none() {
        return Err(failure(format!(
            "{package} installed but {command} is still not on PATH"
        )));
    }
    Ok(())
}

fn log_entry(
    report: &mut Vec<ReportEntry>,
    ui: &UX,
    command: &'static str,
    package: &'static str,
    status: Status,
    detail: String,
) {
    let line = format!("{} {}", status.label(), detail);
    match status {
        Status::Pass | Status::Fixed => ui.success(&line),
        Status::WouldInstall => ui.dry_run(&line),
        Status::Fail => ui.error(&line),
    }
    report.push(ReportEntry {
        command,
        package,
        status,
        detail,
    });
}

fn summarize(report: &[ReportEntry], ui: &UX) {
    let count = |s: Status| report.iter().filter(|e| e.status == s).count().to_string();
    ui.data_panel(
        "Dependency Summary",
        &[
            ("Pass", count(Status::Pass)),
            ("Fixed", count(Status::Fixed)),
            ("Would install", count(Status::WouldInstall)),
            ("Fail", count(Status::Fail)),
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::base::OutputData;
    use crate::cmd::fake::{fail, FakeRunner};
    use std::path::PathBuf;

    fn installer() -> Vec<String> {
        vec!["apt-get".into(), "install".into(), "-y".into()]
    }

    fn all_commands() -> Vec<&'static str> {
        DEPENDENCIES.iter().map(|(c, _)| *c).collect()
    }

    #[test]
    fn everything_present_passes_without_spawning() {
        let runner = FakeRunner::new().with_installed(&all_commands());
        let ui = UX::capturing();
        let report = run_doctor(&runner, &ui, &installer(), false).unwrap();
        assert_eq!(report.len(), DEPENDENCIES.len());
        assert!(report.iter().all(|e| e.status == Status::Pass));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn dry_run_reports_and_never_installs() {
        let runner = FakeRunner::new().with_installed(&["file", "virsh"]);
        let ui = UX::capturing();
        let report = run_doctor(&runner, &ui, &installer(), true).unwrap();

        let pending: Vec<_> = report
            .iter()
            .filter(|e| e.status == Status::WouldInstall)
            .map(|e| e.package)
            .collect();
        assert_eq!(pending, vec!["qemu-utils", "cloud-image-utils", "virtinst"]);
        assert!(runner.calls().is_empty());
        assert!(ui
            .captured()
            .iter()
            .any(|l| l.contains("[WOULD INSTALL] qemu-img missing")));
    }

    /// Installs succeed and make the command resolvable.
    struct InstallingRunner {
        inner: FakeRunner,
    }

    impl Runner for InstallingRunner {
        fn which(&self, program: &str) -> Option<PathBuf> {
            self.inner.which(program)
        }

        fn run(&self, program: &str, args: &[String]) -> anyhow::Result<OutputData> {
            let out = self.inner.run(program, args)?;
            if let Some(pkg) = args.last() {
                if let Some((cmd, _)) = DEPENDENCIES.iter().find(|(_, p)| p == pkg) {
                    self.inner.install(cmd);
                }
            }
            Ok(out)
        }
    }

    #[test]
    fn live_mode_installs_missing_packages() {
        let runner = InstallingRunner {
            inner: FakeRunner::new().with_installed(&["qemu-img", "virt-install", "virsh", "file"]),
        };
        let ui = UX::capturing();
        let report = run_doctor(&runner, &ui, &installer(), false).unwrap();

        let fixed: Vec<_> = report
            .iter()
            .filter(|e| e.status == Status::Fixed)
            .map(|e| e.command)
            .collect();
        assert_eq!(fixed, vec!["cloud-localds"]);
        assert_eq!(
            runner.inner.args_of("apt-get").unwrap(),
            vec!["install", "-y", "cloud-image-utils"]
        );
    }

    #[test]
    fn failed_install_is_fatal_and_stops_checking() {
        let runner = FakeRunner::new()
            .with_installed(&["qemu-img"])
            .answer("apt-get", fail(100, "E: Unable to locate package"));
        let ui = UX::capturing();
        let err = run_doctor(&runner, &ui, &installer(), false).unwrap_err();

        match err.downcast_ref::<ProvisionError>() {
            Some(ProvisionError::DependencyInstall { command, package, detail }) => {
                assert_eq!(command, "cloud-localds");
                assert_eq!(package, "cloud-image-utils");
                assert!(detail.contains("Unable to locate package"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn install_that_does_not_provide_command_fails() {
        let runner = FakeRunner::new().with_installed(&["qemu-img"]);
        let ui = UX::capturing();
        let err = run_doctor(&runner, &ui, &installer(), false).unwrap_err();
        assert!(err.to_string().contains("still not on PATH"));
    }
}
