// ============================================================================
// src/main.rs – provision: create a libvirt guest from an install image
// ============================================================================

use tracing_subscriber::EnvFilter;

use virt_provision::cli;
use virt_provision::ui::UX;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut ui = UX::new(None);
    let code = cli::execute(std::env::args_os(), &mut ui, &mut std::io::stdout());
    std::process::exit(code);
}
