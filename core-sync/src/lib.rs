//! # Job Folder Sync Engine
//!
//! Turns newly created or modified tracking-system jobs into provisioned
//! folders in a team storage namespace.
//!
//! ## Components
//!
//! - **Name Formatter** (`naming`): canonical `"{id} - {TITLE}"` folder names
//! - **Destination Router** (`routing`): identifier prefix to destination folder
//! - **Folder Locator** (`locator`): startup resolution of the team member and
//!   destination folders
//! - **Existence / Duplicate Checker** (`checker`): exact and base-identifier screens
//! - **Folder Provisioner** (`provisioner`): template copy with empty-folder fallback
//! - **Sync Coordinator** (`coordinator`): checkpointed polling loop

pub mod checker;
pub mod coordinator;
pub mod cycle;
pub mod error;
pub mod locator;
pub mod naming;
pub mod provisioner;
pub mod routing;

pub use checker::FolderChecker;
pub use coordinator::{SyncContext, SyncCoordinator};
pub use cycle::{CycleId, CycleReport, ItemOutcome};
pub use error::{Result, SyncError};
pub use locator::{resolve_destinations, resolve_team_member};
pub use naming::{base_identifier, format_name};
pub use provisioner::{FolderProvisioner, Materialized, MaterializedVia};
pub use routing::{DestinationCategory, DestinationFolder, DestinationMap};
