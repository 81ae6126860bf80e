//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and server hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `SecureStore` backed by JSON files in a private directory
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FileSecureStore, ReqwestHttpClient};
//!
//! let http_client = ReqwestHttpClient::new()?;
//! let store = FileSecureStore::new(FileSecureStore::default_directory());
//! ```

mod http;
mod secure_store;

pub use http::ReqwestHttpClient;
pub use secure_store::FileSecureStore;
