// ============================================================================
// src/lib.rs – libvirt guest provisioning and changelog generation
// ============================================================================

pub mod changelog; // git history → CHANGELOG.md
pub mod checksum; // image integrity store
pub mod cli; // provision argument parsing + exit status
pub mod cmd; // external commands, dependency check, provision workflow
pub mod config; // config file + directory layout
pub mod error; // fatal conditions
pub mod profile; // image → guest profile classification
pub mod ui; // console output mirrored to the run log
pub mod util; // atomic writes, audit log
pub mod virt; // qemu-img / cloud-localds / virsh / virt-install wrappers

pub use error::ProvisionError;
