// ============================================================================
// src/bin/changelog.rs – Write CHANGELOG.md for the repository in the cwd
// ============================================================================

use clap::error::ErrorKind;
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use virt_provision::changelog;
use virt_provision::cmd::SystemRunner;
use virt_provision::ui::UX;

#[derive(Parser, Debug)]
#[command(name = "changelog", version)]
#[command(about = "Generate CHANGELOG.md from git history (oldest commit first)")]
struct Cli {}

fn main() {
    let ui = UX::new(None);
    match Cli::try_parse() {
        Ok(_) => {}
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{err}");
            return;
        }
        Err(err) => {
            let text = err.to_string();
            let first = text.lines().next().unwrap_or_default();
            ui.error(first.strip_prefix("error: ").unwrap_or(first));
            std::process::exit(1);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match changelog::generate(&SystemRunner::new(None), Path::new(".")) {
        Ok((path, count)) => {
            ui.success(&format!("Wrote {} ({count} commits)", path.display()));
        }
        Err(err) => {
            ui.error(&format!("{err:#}"));
            std::process::exit(1);
        }
    }
}
