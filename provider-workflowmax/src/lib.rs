//! # WorkflowMax Provider
//!
//! Implements the `JobSource` trait for the WorkflowMax v2 job API.
//!
//! ## Overview
//!
//! This module provides:
//! - The job list call bounded by `from`/`to` dates, scoped by account
//! - Normalisation of both response shapes the API answers with (an XML
//!   `<Job>` document or a JSON `Response` envelope) into `Job`
//! - Classification of HTTP and API-level failures

pub mod connector;
pub mod error;
pub mod types;

pub use connector::WorkflowMaxConnector;
pub use error::{Result, WorkflowMaxError};
