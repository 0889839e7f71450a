//! HTTP transport for the annotation platform API
//!
//! This module provides the transport seam between the client components and
//! the wire. All request execution goes through the [`Transport`] trait so the
//! record proxy and the transfer machinery can be exercised against a mock
//! transport in tests. The production implementation, [`HttpTransport`], is
//! built on `reqwest`.
//!
//! Every outgoing request is tagged with a unique `X-Request-Id` header so
//! server-side logs can be correlated with client traces.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::api::HttpMethod;
use crate::config::ApiConfig;
use crate::error::{http, AnnosyncError, Result, TransportError};

/// A stream of response body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Body of an outgoing API request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// No body.
    Empty,

    /// JSON payload.
    Json(serde_json::Value),

    /// A single file sent as a multipart form part.
    File {
        /// Multipart field name.
        field: &'static str,
        /// File name reported to the server.
        file_name: String,
        /// File content.
        content: Vec<u8>,
    },

    /// Raw binary payload (upload session chunks).
    Raw(Vec<u8>),
}

/// An outgoing API request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method.
    pub method: HttpMethod,

    /// Fully resolved request URL.
    pub url: Url,

    /// Query string parameters.
    pub query: Vec<(String, String)>,

    /// Additional request headers.
    pub headers: Vec<(String, String)>,

    /// Request body.
    pub body: RequestBody,
}

impl ApiRequest {
    /// Create a request with no query, headers or body.
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// Add a query string parameter.
    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    /// Add a request header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }
}

/// A fully buffered API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,

    /// Response body.
    pub body: Bytes,
}

impl ApiResponse {
    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| TransportError::Decode(e.to_string()).into())
    }

    /// Map a non-success response to the error taxonomy.
    ///
    /// 404 becomes [`AnnosyncError::NotFound`]; any other non-2xx status
    /// becomes a transport-level server error with the message extracted from
    /// the body.
    pub fn error_for_status(&self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(http::server_error(self.status, &self.body))
        }
    }
}

/// A response whose body is consumed as a stream.
pub struct StreamingResponse {
    /// HTTP status code.
    pub status: u16,

    /// Value of the Content-Length header, if the server sent one.
    pub content_length: Option<u64>,

    /// Body chunks.
    pub body: ByteStream,
}

impl StreamingResponse {
    /// Drain the stream into a single buffer.
    ///
    /// Used for the small JSON bodies (operation ids, error payloads) that
    /// can arrive on an endpoint normally answering with file content.
    pub async fn collect(self) -> Result<ApiResponse> {
        let mut buf = Vec::new();
        let mut body = self.body;
        while let Some(chunk) = body.try_next().await? {
            buf.extend_from_slice(&chunk);
        }

        Ok(ApiResponse {
            status: self.status,
            body: Bytes::from(buf),
        })
    }
}

/// Request execution seam.
///
/// Implemented by [`HttpTransport`] for production use and by mock transports
/// in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a request and buffer the whole response body.
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse>;

    /// Execute a request and hand the response body back as a stream.
    async fn execute_streaming(&self, request: ApiRequest) -> Result<StreamingResponse>;
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Production transport over `reqwest`.
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport from the API configuration.
    ///
    /// # Arguments
    /// * `config` - API configuration (timeout, user agent)
    ///
    /// # Returns
    /// * `Result<Self>` - New transport or error if the HTTP client cannot be built
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        Ok(Self { http })
    }

    fn build(&self, request: ApiRequest) -> Result<(reqwest::RequestBuilder, String)> {
        let request_id = Uuid::new_v4().to_string();

        debug!(
            "{} {} (request {})",
            request.method, request.url, request_id
        );

        let mut builder = self
            .http
            .request(request.method.into(), request.url)
            .header("X-Request-Id", &request_id)
            .query(&request.query);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::File {
                field,
                file_name,
                content,
            } => {
                let part = reqwest::multipart::Part::bytes(content).file_name(file_name);
                builder.multipart(reqwest::multipart::Form::new().part(field, part))
            }
            RequestBody::Raw(content) => builder
                .header("Content-Type", "application/octet-stream")
                .body(content),
        };

        Ok((builder, request_id))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let (builder, request_id) = self.build(request)?;
        let response = builder.send().await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?;
        debug!("request {} completed with status {}", request_id, status);

        Ok(ApiResponse { status, body })
    }

    async fn execute_streaming(&self, request: ApiRequest) -> Result<StreamingResponse> {
        let (builder, request_id) = self.build(request)?;
        let response = builder.send().await?;

        let status = response.status().as_u16();
        let content_length = response.content_length();
        debug!(
            "request {} streaming response with status {} ({:?} bytes)",
            request_id, status, content_length
        );

        let body: ByteStream =
            Box::pin(response.bytes_stream().map_err(AnnosyncError::from));

        Ok(StreamingResponse {
            status,
            content_length,
            body,
        })
    }
}
