// ============================================================================
// src/cli.rs – provision command line: parse, dispatch, exit status
// ============================================================================

use anyhow::{anyhow, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use crate::cmd::provision::{list_profiles, profile_rows, Session};
use crate::cmd::SystemRunner;
use crate::config::{
    base_dir_override, initial_base_dir, Config, Layout, BASE_DIR_ENV, CONFIG_FILE_NAME,
};
use crate::profile::ProfileSet;
use crate::ui::UX;
use crate::util::audit::AuditLog;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FATAL: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "provision", version, disable_help_flag = true)]
#[command(about = "Provision a libvirt guest from an image in <base>/images")]
pub struct Cli {
    /// Log every mutating action instead of performing it
    #[arg(long)]
    pub dry_run: bool,

    /// List available profiles and exit
    #[arg(long)]
    pub list: bool,

    /// Print help and the available profiles
    #[arg(long, short = 'h')]
    pub help: bool,

    /// Config file (TOML or YAML); defaults to <base>/provision.toml
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Base directory (beats VM_PROVISION_BASE and the config file)
    #[arg(long, value_name = "PATH")]
    pub base_dir: Option<PathBuf>,

    /// Profile to provision: an image filename without its extension
    pub vm_name: Option<String>,
}

/// Parse `args`, run, and map the result to an exit status. Usage errors and
/// fatal errors alike are reported as `ERROR: ...` and yield [`EXIT_FATAL`].
pub fn execute<I, T>(args: I, ui: &mut UX, out: &mut dyn Write) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) if err.kind() == ErrorKind::DisplayVersion => {
            let _ = write!(out, "{err}");
            return EXIT_OK;
        }
        Err(err) => {
            ui.error(&usage_message(&err));
            return EXIT_FATAL;
        }
    };

    match run(&cli, ui, out) {
        Ok(()) => EXIT_OK,
        Err(err) => {
            ui.error(&format!("{err:#}"));
            EXIT_FATAL
        }
    }
}

pub fn run(cli: &Cli, ui: &mut UX, out: &mut dyn Write) -> Result<()> {
    let override_dir = base_dir_override(cli.base_dir.as_deref(), std::env::var_os(BASE_DIR_ENV));
    let initial = initial_base_dir(override_dir.as_deref())?;
    let cfg = Config::discover(cli.config.as_deref(), &initial.join(CONFIG_FILE_NAME))?;
    let layout = Layout::resolve(override_dir.as_deref(), &initial, &cfg);
    let profiles = ProfileSet::load(&layout.images)?;

    if cli.help {
        write!(out, "{}", Cli::command().render_help())?;
        writeln!(out, "\nAvailable profiles ({}):", layout.images.display())?;
        let names = list_profiles(&profiles);
        if names.is_empty() {
            writeln!(out, "  (none)")?;
        }
        for name in names {
            writeln!(out, "  {name}")?;
        }
        return Ok(());
    }

    if cli.list {
        for name in list_profiles(&profiles) {
            writeln!(out, "{name}")?;
        }
        let rows = profile_rows(&profiles);
        let rows: Vec<(&str, String)> = rows.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        ui.data_panel("Available Profiles", &rows);
        return Ok(());
    }

    let vm_name = cli
        .vm_name
        .as_deref()
        .ok_or_else(|| anyhow!("a VM name is required (see --list or --help)"))?;

    ui.attach_log(AuditLog::open(&layout.log_file)?);
    ui.banner(&format!("provision {vm_name}"));
    if let Some(path) = &cfg.path {
        ui.note(&format!("Config: {}", path.display()));
    }
    ui.note(&format!("Base directory: {}", layout.base.display()));

    let runner = SystemRunner::new(cfg.host.command_timeout());
    let session = Session {
        runner: &runner,
        ui: &*ui,
        cfg: &cfg,
        layout: &layout,
        dry_run: cli.dry_run,
    };
    session.provision(&profiles, vm_name)?;
    Ok(())
}

/// First line of a clap error without its `error: ` prefix.
fn usage_message(err: &clap::Error) -> String {
    let text = err.to_string();
    let first = text.lines().next().unwrap_or_default().trim();
    let first = first.strip_prefix("error: ").unwrap_or(first);
    format!("{first} (see --help)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn with_images(base: &Path, names: &[&str]) {
        let images = base.join("images");
        fs::create_dir_all(&images).unwrap();
        for name in names {
            fs::write(images.join(name), b"x").unwrap();
        }
    }

    fn exec(base: &Path, extra: &[&str], ui: &mut UX) -> (i32, String) {
        let mut args = vec![
            "provision".to_string(),
            "--base-dir".to_string(),
            base.display().to_string(),
        ];
        args.extend(extra.iter().map(|a| a.to_string()));
        let mut out = Vec::new();
        let code = execute(args, ui, &mut out);
        (code, String::from_utf8(out).unwrap())
    }

    #[test]
    fn help_lists_profiles_and_succeeds() {
        let dir = tempdir().unwrap();
        with_images(dir.path(), &["ubuntu-22.04.iso", "win10.iso"]);
        let mut ui = UX::capturing();

        let (code, out) = exec(dir.path(), &["--help"], &mut ui);
        assert_eq!(code, EXIT_OK);
        assert!(out.contains("Usage:"));
        assert!(out.contains("--dry-run"));
        assert!(out.contains("Available profiles"));
        assert!(out.contains("  ubuntu-22.04\n"));
        assert!(out.contains("  win10\n"));
        assert!(!dir.path().join("provision.log").exists());
    }

    #[test]
    fn list_prints_one_name_per_line() {
        let dir = tempdir().unwrap();
        with_images(dir.path(), &["ubuntu-22.04.iso", "debian-12.iso", "notes.txt"]);
        let mut ui = UX::capturing();

        let (code, out) = exec(dir.path(), &["--list"], &mut ui);
        assert_eq!(code, EXIT_OK);
        assert_eq!(out, "debian-12\nubuntu-22.04\n");
        assert!(ui
            .captured()
            .contains(&"PANEL: Available Profiles".to_string()));
    }

    #[test]
    fn fatal_error_is_logged_and_exits_one() {
        let dir = tempdir().unwrap();
        with_images(dir.path(), &["ubuntu-22.04.iso"]);
        let mut ui = UX::capturing();

        let (code, _) = exec(dir.path(), &["--dry-run", "fedora-40"], &mut ui);
        assert_eq!(code, EXIT_FATAL);

        let log = fs::read_to_string(dir.path().join("provision.log")).unwrap();
        let last = log.lines().last().unwrap();
        assert!(
            last.contains("] ERROR: unknown profile 'fedora-40' (available: ubuntu-22.04)"),
            "{last}"
        );
        assert!(!dir.path().join("vms").exists());
        assert!(!dir.path().join("checksums.toml").exists());
    }

    #[test]
    fn missing_vm_name_exits_one() {
        let dir = tempdir().unwrap();
        let mut ui = UX::capturing();

        let (code, out) = exec(dir.path(), &[], &mut ui);
        assert_eq!(code, EXIT_FATAL);
        assert!(out.is_empty());
        assert!(ui
            .captured()
            .iter()
            .any(|l| l.starts_with("ERROR: a VM name is required")));
    }

    #[test]
    fn usage_errors_exit_one_with_error_line() {
        let dir = tempdir().unwrap();
        let mut ui = UX::capturing();

        let (code, _) = exec(dir.path(), &["--bogus"], &mut ui);
        assert_eq!(code, EXIT_FATAL);
        let lines = ui.captured();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ERROR: "));
        assert!(lines[0].contains("--bogus"));
        assert!(!lines[0].starts_with("ERROR: error:"));
    }

    #[test]
    fn version_exits_zero() {
        let dir = tempdir().unwrap();
        let mut ui = UX::capturing();

        let (code, out) = exec(dir.path(), &["--version"], &mut ui);
        assert_eq!(code, EXIT_OK);
        assert!(out.starts_with("provision "));
        assert!(ui.captured().is_empty());
    }

    #[test]
    fn dry_run_position_does_not_matter() {
        let before = Cli::try_parse_from(["provision", "--dry-run", "ubuntu-22.04"]).unwrap();
        let after = Cli::try_parse_from(["provision", "ubuntu-22.04", "--dry-run"]).unwrap();
        assert!(before.dry_run && after.dry_run);
        assert_eq!(after.vm_name.as_deref(), Some("ubuntu-22.04"));
    }
}
