use std::{fmt, io};

/// Crate-wide `Result` type using [`AnnosyncError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, AnnosyncError>;

/// Top-level error type for annosync operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum AnnosyncError {
    /// Network/HTTP-layer errors.
    Transport(TransportError),

    /// The requested record or resource is unknown to the server.
    NotFound(String),

    /// Asynchronous transfer (import/export) errors.
    Transfer(TransferError),

    /// Record field schema violations.
    Schema(SchemaError),

    /// Configuration errors.
    Config(ConfigError),

    /// Local filesystem I/O errors.
    Io(io::Error),

    /// Operation aborted by the caller.
    Cancelled(String),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Transport-specific errors.
#[derive(Debug)]
pub enum TransportError {
    /// The request could not be sent or the response not received.
    RequestFailed(String),

    /// The request timed out.
    Timeout,

    /// The request URL could not be built.
    InvalidUrl(String),

    /// The server answered with a non-success status.
    Server { status: u16, message: String },

    /// The response body could not be decoded.
    Decode(String),
}

/// Transfer-specific errors.
#[derive(Debug)]
pub enum TransferError {
    /// The server reported that the asynchronous operation failed.
    Failed(String),

    /// The server accepted the request for asynchronous processing but
    /// the response carried no operation id to poll.
    MissingOperationId,

    /// An upload session could not be opened.
    SessionRejected(String),
}

/// Record field schema violations.
#[derive(Debug)]
pub enum SchemaError {
    /// The field is not part of the record schema.
    UnknownField { kind: String, field: String },

    /// The field exists but is not writable.
    ReadOnlyField { kind: String, field: String },

    /// The server response was not a JSON object.
    NotAnObject,

    /// The server response carried no usable record id.
    MissingId,
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for AnnosyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnosyncError::Transport(e) => write!(f, "Transport error: {e}"),
            AnnosyncError::NotFound(what) => write!(f, "Not found: {what}"),
            AnnosyncError::Transfer(e) => write!(f, "Transfer error: {e}"),
            AnnosyncError::Schema(e) => write!(f, "Schema error: {e}"),
            AnnosyncError::Config(e) => write!(f, "Configuration error: {e}"),
            AnnosyncError::Io(e) => write!(f, "I/O error: {e}"),
            AnnosyncError::Cancelled(msg) => write!(f, "Cancelled: {msg}"),
            AnnosyncError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::RequestFailed(msg) => write!(f, "Request failed: {msg}"),
            TransportError::Timeout => write!(f, "Request timed out"),
            TransportError::InvalidUrl(msg) => write!(f, "Invalid URL: {msg}"),
            TransportError::Server { status, message } => {
                write!(f, "Server returned {status}: {message}")
            }
            TransportError::Decode(msg) => write!(f, "Failed to decode response: {msg}"),
        }
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Failed(msg) => write!(f, "Operation failed on server: {msg}"),
            TransferError::MissingOperationId => {
                write!(f, "Server response carried no operation id")
            }
            TransferError::SessionRejected(msg) => {
                write!(f, "Upload session rejected: {msg}")
            }
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::UnknownField { kind, field } => {
                write!(f, "Unknown field '{field}' for record kind '{kind}'")
            }
            SchemaError::ReadOnlyField { kind, field } => {
                write!(f, "Field '{field}' of record kind '{kind}' is read-only")
            }
            SchemaError::NotAnObject => write!(f, "Record payload is not a JSON object"),
            SchemaError::MissingId => write!(f, "Record payload has no integer 'id' field"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for AnnosyncError {}
impl std::error::Error for TransportError {}
impl std::error::Error for TransferError {}
impl std::error::Error for SchemaError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to AnnosyncError ========================= */

impl From<io::Error> for AnnosyncError {
    fn from(err: io::Error) -> Self {
        AnnosyncError::Io(err)
    }
}

impl From<TransportError> for AnnosyncError {
    fn from(err: TransportError) -> Self {
        AnnosyncError::Transport(err)
    }
}

impl From<TransferError> for AnnosyncError {
    fn from(err: TransferError) -> Self {
        AnnosyncError::Transfer(err)
    }
}

impl From<SchemaError> for AnnosyncError {
    fn from(err: SchemaError) -> Self {
        AnnosyncError::Schema(err)
    }
}

impl From<ConfigError> for AnnosyncError {
    fn from(err: ConfigError) -> Self {
        AnnosyncError::Config(err)
    }
}

impl From<reqwest::Error> for AnnosyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AnnosyncError::Transport(TransportError::Timeout)
        } else {
            AnnosyncError::Transport(TransportError::RequestFailed(err.to_string()))
        }
    }
}

impl From<url::ParseError> for AnnosyncError {
    fn from(err: url::ParseError) -> Self {
        AnnosyncError::Transport(TransportError::InvalidUrl(err.to_string()))
    }
}

impl From<serde_json::Error> for AnnosyncError {
    fn from(err: serde_json::Error) -> Self {
        AnnosyncError::Transport(TransportError::Decode(err.to_string()))
    }
}

impl From<String> for AnnosyncError {
    fn from(msg: String) -> Self {
        AnnosyncError::Generic(msg)
    }
}

impl From<&str> for AnnosyncError {
    fn from(msg: &str) -> Self {
        AnnosyncError::Generic(msg.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = AnnosyncError::Transport(TransportError::Server {
            status: 503,
            message: "maintenance".to_string(),
        });
        assert_eq!(err.to_string(), "Transport error: Server returned 503: maintenance");
    }

    #[test]
    fn test_transfer_failed_display() {
        let err = AnnosyncError::Transfer(TransferError::Failed("bad archive".to_string()));
        assert_eq!(err.to_string(), "Transfer error: Operation failed on server: bad archive");
    }

    #[test]
    fn test_schema_error_display() {
        let err = SchemaError::ReadOnlyField {
            kind: "job".to_string(),
            field: "task_id".to_string(),
        };
        assert_eq!(err.to_string(), "Field 'task_id' of record kind 'job' is read-only");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let err: AnnosyncError = io_err.into();
        assert!(matches!(err, AnnosyncError::Io(_)));
    }

    #[test]
    fn test_string_conversion() {
        let err: AnnosyncError = "something odd".into();
        assert_eq!(err.to_string(), "something odd");
    }
}
