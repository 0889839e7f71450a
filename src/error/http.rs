use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::kinds::{AnnosyncError, TransportError};

/// Structured error information extracted from HTTP error responses.
///
/// This is intended to be serialized to JSON and consumed by other
/// components (e.g. logging).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) message: Option<String>,
}

impl ErrorInfo {
    /// Extract structured information from an HTTP error response.
    ///
    /// The annotation platform reports errors as JSON objects carrying one of
    /// `detail`, `message` or `error`; anything else falls back to the raw
    /// body text.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        Self {
            status: Some(status),
            name: status_name(status).map(str::to_string),
            message: extract_message(body),
        }
    }

    /// Convert error info to pretty-printed JSON string.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Convert error info to compact JSON string (single line).
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The extracted message, or the status name if the body had none.
    pub fn message_or_status(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| format!("HTTP {}", self.status.unwrap_or(0)))
    }
}

/// Map a non-success HTTP response to the crate error taxonomy.
///
/// A 404 becomes [`AnnosyncError::NotFound`]; everything else becomes a
/// transport-level server error carrying the extracted message.
pub(crate) fn server_error(status: u16, body: &[u8]) -> AnnosyncError {
    let info = ErrorInfo::from_response(status, body);
    if status == 404 {
        AnnosyncError::NotFound(info.message_or_status())
    } else {
        AnnosyncError::Transport(TransportError::Server {
            status,
            message: info.message_or_status(),
        })
    }
}

/// Pull a human-readable message out of an error body.
///
/// Tries the JSON fields the platform uses (`detail`, `message`, `error`),
/// then falls back to the body as text.
fn extract_message(body: &[u8]) -> Option<String> {
    if body.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        for key in ["detail", "message", "error"] {
            match value.get(key) {
                Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
                // DRF-style field errors arrive as arrays of strings.
                Some(Value::Array(items)) => {
                    let joined: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                    if !joined.is_empty() {
                        return Some(joined.join("; "));
                    }
                }
                _ => {}
            }
        }
    }

    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        // Cap free-form bodies so HTML error pages don't flood the logs.
        Some(trimmed.chars().take(200).collect())
    }
}

/// Get a human-readable name for an HTTP status code.
fn status_name(status: u16) -> Option<&'static str> {
    let name = match status {
        400 => "BadRequest",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "NotFound",
        409 => "Conflict",
        413 => "PayloadTooLarge",
        429 => "TooManyRequests",
        500 => "InternalServerError",
        502 => "BadGateway",
        503 => "ServiceUnavailable",
        _ => return None,
    };

    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_detail_field() {
        let info = ErrorInfo::from_response(400, br#"{"detail": "format is required"}"#);
        assert_eq!(info.message.as_deref(), Some("format is required"));
        assert_eq!(info.name.as_deref(), Some("BadRequest"));
    }

    #[test]
    fn test_extract_array_detail() {
        let info = ErrorInfo::from_response(400, br#"{"detail": ["bad frame", "bad label"]}"#);
        assert_eq!(info.message.as_deref(), Some("bad frame; bad label"));
    }

    #[test]
    fn test_extract_plain_text_body() {
        let info = ErrorInfo::from_response(500, b"  worker crashed  ");
        assert_eq!(info.message.as_deref(), Some("worker crashed"));
    }

    #[test]
    fn test_empty_body_falls_back_to_status() {
        let info = ErrorInfo::from_response(503, b"");
        assert_eq!(info.message, None);
        assert_eq!(info.message_or_status(), "ServiceUnavailable");
    }

    #[test]
    fn test_unknown_status_without_body() {
        let info = ErrorInfo::from_response(418, b"");
        assert_eq!(info.message_or_status(), "HTTP 418");
    }

    #[test]
    fn test_server_error_maps_404_to_not_found() {
        let err = server_error(404, br#"{"detail": "job does not exist"}"#);
        assert!(matches!(err, AnnosyncError::NotFound(_)));
    }

    #[test]
    fn test_server_error_maps_other_statuses_to_transport() {
        let err = server_error(500, b"boom");
        match err {
            AnnosyncError::Transport(TransportError::Server { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_to_json_skips_missing_fields() {
        let info = ErrorInfo::from_response(418, b"");
        let json = info.to_json_compact().unwrap();
        assert_eq!(json, r#"{"status":418}"#);
    }
}
