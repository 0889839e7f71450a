//! File transfer module for annotation import and dataset export
//!
//! This module implements the asynchronous transfer protocol shared by
//! imports and exports:
//!
//! 1. **Uploader**: pushes a local annotation file to an import endpoint,
//!    chunking large files into an upload session
//! 2. **Downloader**: requests export generation and streams the result to
//!    local storage with bounded memory
//! 3. **Polling**: both sides poll the server's operation status at a fixed
//!    interval until `finished` or `failed`, driven as an explicit state
//!    machine
//! 4. **ProgressReporter**: observer fed at chunk boundaries and poll ticks
//!
//! Transfers block the calling task for their whole duration; cancellation
//! is observed at poll iteration boundaries via a `CancellationToken`.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use annosync::api::CREATE_JOB_ANNOTATIONS;
//! use annosync::client::Client;
//! use annosync::config::Config;
//! use annosync::transfer::Uploader;
//!
//! # async fn example() -> annosync::error::Result<()> {
//! let client = Client::new(Config::load()?)?;
//! let uploader = Uploader::new(&client);
//! uploader
//!     .upload_annotation_file(
//!         &CREATE_JOB_ANNOTATIONS,
//!         Path::new("annotations.zip"),
//!         "YOLO ZIP 1.0",
//!         &[("id", "42".to_string())],
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod downloader;
pub mod poll;
pub mod progress;
pub mod uploader;

pub use downloader::Downloader;
pub use poll::{OperationStatus, PollLoop, PollState, StatusReply, TransferOperation};
pub use progress::{ConsoleProgressReporter, NullProgressReporter, ProgressReporter};
pub use uploader::Uploader;
