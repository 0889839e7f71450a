//! Endpoint definitions for the annotation platform REST API
//!
//! This module declares the fixed set of endpoints the client talks to and
//! provides URL construction from a base URL plus path parameters. Endpoints
//! are path templates; `{name}` placeholders are substituted from the
//! `url_params` supplied by the caller (e.g. `{"id": 42}`).

use std::fmt;

use url::Url;

use crate::error::{Result, TransportError};

/// HTTP method of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        };
        write!(f, "{s}")
    }
}

/// A REST endpoint: an HTTP method plus a path template relative to the
/// API base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    /// HTTP method used when calling the endpoint
    pub method: HttpMethod,

    /// Path template with `{name}` placeholders, relative to the base URL
    pub path: &'static str,
}

impl Endpoint {
    /// Declare a GET endpoint
    pub const fn get(path: &'static str) -> Self {
        Self {
            method: HttpMethod::Get,
            path,
        }
    }

    /// Declare a POST endpoint
    pub const fn post(path: &'static str) -> Self {
        Self {
            method: HttpMethod::Post,
            path,
        }
    }

    /// Declare a PATCH endpoint
    pub const fn patch(path: &'static str) -> Self {
        Self {
            method: HttpMethod::Patch,
            path,
        }
    }

    /// Build the request URL for this endpoint
    ///
    /// # Arguments
    /// * `base` - API base URL (with trailing slash)
    /// * `url_params` - Path parameter name/value pairs
    ///
    /// # Returns
    /// * `Result<Url>` - Resolved URL or error if a placeholder is unresolved
    pub fn url(&self, base: &Url, url_params: &[(&str, String)]) -> Result<Url> {
        let mut path = self.path.to_string();
        for (name, value) in url_params {
            path = path.replace(&format!("{{{name}}}"), value);
        }

        if path.contains('{') {
            return Err(TransportError::InvalidUrl(format!(
                "unresolved parameter in endpoint path '{path}'"
            ))
            .into());
        }

        let url = base
            .join(&path)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", self.path)))?;

        Ok(url)
    }
}

/// Retrieve one job record
pub const RETRIEVE_JOB: Endpoint = Endpoint::get("jobs/{id}");

/// Partially update one job record
pub const PARTIAL_UPDATE_JOB: Endpoint = Endpoint::patch("jobs/{id}");

/// Import an annotation file into a job
pub const CREATE_JOB_ANNOTATIONS: Endpoint = Endpoint::post("jobs/{id}/annotations");

/// Export job annotations without source media
pub const RETRIEVE_JOB_ANNOTATIONS: Endpoint = Endpoint::get("jobs/{id}/annotations");

/// Export a job dataset bundling source media
pub const RETRIEVE_JOB_DATASET: Endpoint = Endpoint::get("jobs/{id}/dataset");

/// Query the status of an asynchronous server-side operation
pub const RETRIEVE_REQUEST_STATUS: Endpoint = Endpoint::get("requests/{rq_id}");
