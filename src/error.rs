// ============================================================================
// src/error.rs – Fatal provisioning conditions
// ============================================================================

use std::path::PathBuf;
use thiserror::Error;

/// Every condition that stops a provisioning run. Steps return these wrapped
/// in `anyhow::Error`; the binary prints them with an `ERROR:` prefix and
/// exits with status 1.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("unknown profile '{name}' (available: {available})")]
    UnknownProfile { name: String, available: String },

    #[error("image not found: {0}")]
    MissingImage(PathBuf),

    #[error("{path} is not an ISO 9660 image ({detail})")]
    InvalidImage { path: PathBuf, detail: String },

    #[error("virtualization tooling '{0}' is not installed")]
    DaemonNotInstalled(String),

    #[error("service '{0}' is not running")]
    DaemonInactive(String),

    #[error("libvirt at {uri} is not answering: {detail}")]
    DaemonUnreachable { uri: String, detail: String },

    #[error("cloud-init input missing: {0}")]
    MissingCloudInit(PathBuf),

    #[error("failed to install package '{package}' for '{command}': {detail}")]
    DependencyInstall {
        command: String,
        package: String,
        detail: String,
    },

    #[error("{program} exited with status {status}: {detail}")]
    CommandFailed {
        program: String,
        status: i32,
        detail: String,
    },
}
