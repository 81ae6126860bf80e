//! Workspace placeholder crate.
//!
//! Re-exports the `core-service` façade so hosts can depend on
//! `jobfolder-workspace` and enable `desktop-shims` without wiring the
//! individual bridge, provider and sync crates themselves.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
