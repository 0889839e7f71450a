//! Dataset export download
//!
//! Asks an export endpoint to produce a file, waits for server-side
//! generation when the server answers with an operation id, then streams the
//! result to local storage. Response bodies are written through a bounded
//! buffer so arbitrarily large exports never occupy memory whole.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::api::{Endpoint, HttpMethod};
use crate::client::Client;
use crate::error::{AnnosyncError, Result, TransferError};
use crate::transfer::poll::{self, TransferOperation};
use crate::transfer::progress::{NullProgressReporter, ProgressReporter};
use crate::transport::{ApiRequest, StreamingResponse, Transport};

/// Downloads a server-generated export file
pub struct Downloader {
    transport: Arc<dyn Transport>,
    base_url: Url,
    progress: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
    status_check_period: Duration,
    write_buffer_size: usize,
}

impl Downloader {
    /// Create a downloader with the client's configured defaults
    pub fn new(client: &Client) -> Self {
        Self {
            transport: client.transport(),
            base_url: client.base_url().clone(),
            progress: Arc::new(NullProgressReporter),
            cancel: CancellationToken::new(),
            status_check_period: client.config().status_check_period(),
            write_buffer_size: client.config().transfer.write_buffer_size,
        }
    }

    /// Set the progress observer for this download
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Set the cancellation token for this download
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Override the configured poll interval
    pub fn with_status_check_period(mut self, period: Duration) -> Self {
        self.status_check_period = period;
        self
    }

    /// Request an export and download the generated file
    ///
    /// A 200 response to the prepare request is the file itself and is
    /// streamed straight to `filename`, overwriting any existing file. A 202
    /// response carries an operation id; the operation is polled to
    /// completion and the file is then fetched with the `action=download`
    /// query parameter.
    ///
    /// # Arguments
    /// * `endpoint` - Export endpoint variant (dataset or annotations-only)
    /// * `filename` - Local destination path
    /// * `url_params` - Path parameters for the endpoint (record id)
    /// * `query_params` - Query parameters (format name)
    ///
    /// # Returns
    /// * `Result<()>` - Ok once the file is fully written to disk
    pub async fn prepare_and_download(
        &self,
        endpoint: &Endpoint,
        filename: &Path,
        url_params: &[(&str, String)],
        query_params: &[(&str, String)],
    ) -> Result<()> {
        let url = endpoint.url(&self.base_url, url_params)?;

        let mut request = ApiRequest::new(HttpMethod::Get, url.clone());
        for (name, value) in query_params {
            request = request.with_query(name, value);
        }

        let response = self.transport.execute_streaming(request).await?;
        match response.status {
            200 => {
                debug!("export ready immediately, streaming to '{}'", filename.display());
                self.write_to_file(response, filename).await?;
            }
            202 => {
                let collected = response.collect().await?;
                let operation = TransferOperation::from_body(&collected.body)
                    .ok_or(TransferError::MissingOperationId)?;

                poll::wait_for_operation(
                    self.transport.as_ref(),
                    &self.base_url,
                    operation,
                    self.status_check_period,
                    self.progress.as_ref(),
                    &self.cancel,
                )
                .await?;

                let mut request = ApiRequest::new(HttpMethod::Get, url);
                for (name, value) in query_params {
                    request = request.with_query(name, value);
                }
                request = request.with_query("action", "download");

                let response = self.transport.execute_streaming(request).await?;
                if response.status != 200 {
                    let collected = response.collect().await?;
                    collected.error_for_status()?;
                    return Err(AnnosyncError::Generic(format!(
                        "expected file content from export endpoint, got status {}",
                        collected.status
                    )));
                }

                debug!("export generated, streaming to '{}'", filename.display());
                self.write_to_file(response, filename).await?;
            }
            _ => {
                let collected = response.collect().await?;
                collected.error_for_status()?;
                return Err(AnnosyncError::Generic(format!(
                    "unexpected status {} from export endpoint",
                    collected.status
                )));
            }
        }

        self.progress.finish();
        Ok(())
    }

    /// Stream a response body to disk through a bounded buffer
    ///
    /// The file handle is released on every exit path; on success the buffer
    /// is flushed before returning.
    async fn write_to_file(&self, response: StreamingResponse, filename: &Path) -> Result<()> {
        validate_parent(filename)?;

        let file = File::create(filename).await?;
        let mut writer = BufWriter::with_capacity(self.write_buffer_size, file);

        let total = response.content_length;
        let mut body = response.body;
        let mut written: u64 = 0;

        while let Some(chunk) = body.try_next().await? {
            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
            self.progress.update(written, total);
        }

        writer.flush().await?;
        debug!("wrote {} bytes to '{}'", written, filename.display());
        Ok(())
    }
}

/// Reject destinations whose parent directory does not exist
fn validate_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("directory does not exist: {}", parent.display()),
            )
            .into());
        }
    }

    Ok(())
}
