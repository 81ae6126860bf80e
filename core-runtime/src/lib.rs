//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by every crate of the job
//! folder sync service:
//! - Logging and tracing setup
//! - Typed service configuration loaded from the environment
//! - Event bus for auth and polling-cycle events

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
