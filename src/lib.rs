//! Annotation Platform Client Library
//!
//! This library provides an asynchronous client for a video/image annotation
//! platform's REST API: proxying of individual job records, annotation file
//! import, and dataset export with server-side generation polling.
//!
//! # Modules
//!
//! - `api`: REST endpoint definitions and URL construction
//! - `client`: client handle tying configuration and transport together
//! - `config`: configuration management
//! - `error`: error types and handling
//! - `record`: record proxy with schema-validated field access
//! - `transfer`: upload/download machinery and the polling protocol
//! - `transport`: HTTP transport seam
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use annosync::{Client, Config};
//! use annosync::record::ExportOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let client = Client::new(config)?;
//!
//!     let mut job = client.record(42).await?;
//!     job.set("state", serde_json::json!("in progress"))?;
//!     job.commit(false).await?;
//!
//!     job.export_dataset("COCO 1.0", Path::new("dataset.zip"), &ExportOptions::default())
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod record;
pub mod transfer;
pub mod transport;

// Re-export commonly used types
pub use client::Client;
pub use config::Config;
pub use error::{AnnosyncError, Result};
pub use record::{RecordProxy, RemoteRecord};
pub use transfer::{Downloader, ProgressReporter, Uploader};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}
