//! Error handling module for annotation platform operations.
//!
//! This module provides comprehensive error handling for API operations with:
//! - Structured error information extraction from HTTP error responses
//! - Consistent JSON error formatting for logging
//! - Application-specific error types
//!
//! # Example
//!
//! ```rust,no_run
//! use annosync::error::{Result, AnnosyncError};
//! use annosync::error::http::ErrorInfo;
//!
//! fn example_operation() -> Result<()> {
//!     // API operations automatically convert errors
//!     // to structured error types
//!     Ok(())
//! }
//!
//! fn handle_error(status: u16, body: &[u8]) {
//!     let info = ErrorInfo::from_response(status, body);
//!     println!("{}", info.to_json().unwrap());
//! }
//! ```

pub mod http;
pub mod kinds;

// Re-export commonly used types
pub use http::ErrorInfo;
pub use kinds::{AnnosyncError, ConfigError, Result, SchemaError, TransferError, TransportError};
