//! # Host Bridge Traits
//!
//! Abstraction traits between the sync core and the outside world.
//!
//! ## Overview
//!
//! This crate defines the contract between the core library and concrete
//! implementations. Each trait represents a capability the core requires but
//! that is provided differently in production and in tests.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and TLS
//!
//! ### External services
//! - [`JobSource`](jobs::JobSource) - Work items from the job-tracking system
//! - [`TeamFolderStore`](storage::TeamFolderStore) - Team namespace folder operations
//!
//! ### Security & Storage
//! - [`SecureStore`](storage::SecureStore) - Credential persistence
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Storage
//! implementations must report missing paths as `NotFound` and existing write
//! targets as `Conflict`; the provisioning state machine branches on them.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so they can be shared across
//! async tasks behind `Arc`.

pub mod error;
pub mod http;
pub mod jobs;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use jobs::{FetchWindow, Job, JobSource};
pub use storage::{
    join_path, EntryKind, FolderEntry, SecureStore, TeamContext, TeamFolderStore, TeamMember,
};
pub use time::{Clock, LogLevel, SystemClock};
