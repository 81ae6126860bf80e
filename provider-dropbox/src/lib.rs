//! # Dropbox Provider
//!
//! Implements the `TeamFolderStore` trait for Dropbox Business team spaces.
//!
//! ## Overview
//!
//! This module provides:
//! - Team member listing, used to resolve the operating member by email
//! - Namespace-rooted metadata lookup, folder listing, copy and create-folder
//! - Classification of `409` error summaries into `NotFound` / `Conflict`
//!
//! Every file call carries the `Dropbox-API-Path-Root` and
//! `Dropbox-API-Select-User` headers built from the caller's `TeamContext`.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::DropboxConnector;
pub use error::{DropboxError, Result};
