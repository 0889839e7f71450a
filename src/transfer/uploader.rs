//! Annotation file upload
//!
//! Pushes a local annotation file to an import endpoint and waits for the
//! server to process it. Files at or below the configured chunk size are sent
//! as a single multipart request; larger files go through a chunked upload
//! session so no single request exceeds the server's size ceiling. Either
//! way, a response carrying an operation id switches to the polling protocol
//! in [`poll`](super::poll).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::api::{Endpoint, HttpMethod};
use crate::client::Client;
use crate::error::{AnnosyncError, Result, TransferError};
use crate::transfer::poll::{self, TransferOperation};
use crate::transfer::progress::{NullProgressReporter, ProgressReporter};
use crate::transport::{ApiRequest, ApiResponse, RequestBody, Transport};

/// Multipart field name the import endpoints expect.
const ANNOTATION_FILE_FIELD: &str = "annotation_file";

/// Uploads an annotation file and waits for server-side processing
pub struct Uploader {
    transport: Arc<dyn Transport>,
    base_url: Url,
    progress: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
    status_check_period: Duration,
    chunk_size: u64,
}

impl Uploader {
    /// Create an uploader with the client's configured defaults
    pub fn new(client: &Client) -> Self {
        Self {
            transport: client.transport(),
            base_url: client.base_url().clone(),
            progress: Arc::new(NullProgressReporter),
            cancel: CancellationToken::new(),
            status_check_period: client.config().status_check_period(),
            chunk_size: client.config().transfer.chunk_size,
        }
    }

    /// Set the progress observer for this upload
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Set the cancellation token for this upload
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Override the configured poll interval
    pub fn with_status_check_period(mut self, period: Duration) -> Self {
        self.status_check_period = period;
        self
    }

    /// Upload an annotation file and wait until the server has imported it
    ///
    /// # Arguments
    /// * `endpoint` - Import endpoint (e.g. `CREATE_JOB_ANNOTATIONS`)
    /// * `file_path` - Local annotation file to upload
    /// * `format_name` - Annotation schema name (e.g. `"YOLO ZIP 1.0"`)
    /// * `url_params` - Path parameters for the endpoint (record id)
    ///
    /// # Returns
    /// * `Result<()>` - Ok once the import has fully completed server-side
    pub async fn upload_annotation_file(
        &self,
        endpoint: &Endpoint,
        file_path: &Path,
        format_name: &str,
        url_params: &[(&str, String)],
    ) -> Result<()> {
        let total = tokio::fs::metadata(file_path).await?.len();
        let url = endpoint.url(&self.base_url, url_params)?;
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "annotations".to_string());

        debug!(
            "uploading '{}' ({} bytes) as format '{}'",
            file_path.display(),
            total,
            format_name
        );

        let response = if total <= self.chunk_size {
            self.upload_single(file_path, &url, format_name, file_name, total)
                .await?
        } else {
            self.upload_chunked(file_path, &url, format_name, total)
                .await?
        };

        response.error_for_status()?;

        if let Some(operation) = TransferOperation::from_body(&response.body) {
            poll::wait_for_operation(
                self.transport.as_ref(),
                &self.base_url,
                operation,
                self.status_check_period,
                self.progress.as_ref(),
                &self.cancel,
            )
            .await?;
        }

        self.progress.finish();
        Ok(())
    }

    /// Send the whole file as one multipart request
    async fn upload_single(
        &self,
        file_path: &Path,
        url: &Url,
        format_name: &str,
        file_name: String,
        total: u64,
    ) -> Result<ApiResponse> {
        let content = tokio::fs::read(file_path).await?;

        let request = ApiRequest::new(HttpMethod::Post, url.clone())
            .with_query("format", format_name)
            .with_body(RequestBody::File {
                field: ANNOTATION_FILE_FIELD,
                file_name,
                content,
            });

        let response = self.transport.execute(request).await?;
        self.progress.update(total, Some(total));
        Ok(response)
    }

    /// Send the file through a chunked upload session
    ///
    /// Opens a session, sends one raw-body request per chunk carrying the
    /// session id and byte offset, then finalizes. A failed chunk aborts the
    /// session (best effort) and surfaces the chunk's error, so a partial
    /// upload is never left usable server-side.
    async fn upload_chunked(
        &self,
        file_path: &Path,
        url: &Url,
        format_name: &str,
        total: u64,
    ) -> Result<ApiResponse> {
        #[derive(Deserialize)]
        struct SessionReply {
            upload_id: String,
        }

        let open = self
            .transport
            .execute(
                ApiRequest::new(HttpMethod::Post, url.clone())
                    .with_query("format", format_name)
                    .with_header("Upload-Start", "true"),
            )
            .await?;
        open.error_for_status()?;
        let session: SessionReply = open.json().map_err(|_| {
            TransferError::SessionRejected("session response carried no upload_id".to_string())
        })?;

        debug!(
            "opened upload session {} for {} bytes in chunks of {}",
            session.upload_id, total, self.chunk_size
        );

        let mut file = File::open(file_path).await?;
        let mut buf = vec![0u8; self.chunk_size as usize];
        let mut offset: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                self.abort_session(url, &session.upload_id).await;
                return Err(AnnosyncError::Cancelled(format!(
                    "upload session {} aborted by caller",
                    session.upload_id
                )));
            }

            let read = read_chunk(&mut file, &mut buf).await?;
            if read == 0 {
                break;
            }

            let request = ApiRequest::new(HttpMethod::Patch, url.clone())
                .with_header("Upload-Id", &session.upload_id)
                .with_header("Upload-Offset", &offset.to_string())
                .with_body(RequestBody::Raw(buf[..read].to_vec()));

            let outcome = match self.transport.execute(request).await {
                Ok(response) => response.error_for_status(),
                Err(err) => Err(err),
            };
            if let Err(err) = outcome {
                self.abort_session(url, &session.upload_id).await;
                return Err(err);
            }

            offset += read as u64;
            self.progress.update(offset, Some(total));
        }

        let finish = ApiRequest::new(HttpMethod::Post, url.clone())
            .with_query("format", format_name)
            .with_header("Upload-Finish", "true")
            .with_header("Upload-Id", &session.upload_id);

        self.transport.execute(finish).await
    }

    /// Tear down an upload session; the result is ignored
    async fn abort_session(&self, url: &Url, upload_id: &str) {
        let request =
            ApiRequest::new(HttpMethod::Delete, url.clone()).with_header("Upload-Id", upload_id);
        if self.transport.execute(request).await.is_err() {
            debug!("upload session {} abort request failed", upload_id);
        }
    }
}

/// Fill the buffer from the file, stopping only at EOF or a full buffer.
async fn read_chunk(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::api::CREATE_JOB_ANNOTATIONS;
    use crate::config::Config;
    use crate::transport::testing::MockTransport;

    fn client_with(mock: Arc<MockTransport>, chunk_size: u64) -> Client {
        let mut config = Config::default();
        config.transfer.chunk_size = chunk_size;
        config.transfer.status_check_period = 5;
        Client::with_transport(config, mock).unwrap()
    }

    fn write_temp_file(content: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotations.zip");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn id_params() -> Vec<(&'static str, String)> {
        vec![("id", "42".to_string())]
    }

    #[tokio::test]
    async fn test_missing_file_is_local_io_error() {
        let mock = Arc::new(MockTransport::new());
        let client = client_with(mock.clone(), 1024);
        let uploader = Uploader::new(&client);

        let err = uploader
            .upload_annotation_file(
                &CREATE_JOB_ANNOTATIONS,
                Path::new("/definitely/not/here.zip"),
                "YOLO ZIP 1.0",
                &id_params(),
            )
            .await
            .unwrap_err();

        match err {
            AnnosyncError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_immediate_completion_issues_no_status_query() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(200, b"");

        let client = client_with(mock.clone(), 1024);
        let (_dir, path) = write_temp_file(b"annotations");

        Uploader::new(&client)
            .upload_annotation_file(&CREATE_JOB_ANNOTATIONS, &path, "YOLO ZIP 1.0", &id_params())
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].path, "/api/jobs/42/annotations");
        assert_eq!(requests[0].query_value("format"), Some("YOLO ZIP 1.0"));
        match &requests[0].body {
            RequestBody::File {
                field,
                file_name,
                content,
            } => {
                assert_eq!(*field, "annotation_file");
                assert_eq!(file_name, "annotations.zip");
                assert_eq!(content, b"annotations");
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_id_triggers_polling() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(202, json!({"rq_id": "import:job-42"}));
        mock.push_json(200, json!({"status": "queued"}));
        mock.push_json(200, json!({"status": "finished"}));

        let client = client_with(mock.clone(), 1024);
        let (_dir, path) = write_temp_file(b"annotations");

        Uploader::new(&client)
            .upload_annotation_file(&CREATE_JOB_ANNOTATIONS, &path, "YOLO ZIP 1.0", &id_params())
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].path, "/api/requests/import:job-42");
        assert_eq!(requests[2].path, "/api/requests/import:job-42");
        assert_eq!(
            requests[2].at - requests[1].at,
            Duration::from_secs(5)
        );
    }

    #[tokio::test]
    async fn test_failed_operation_surfaces_server_message() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(202, json!({"rq_id": "import:job-42"}));
        mock.push_json(200, json!({"status": "failed", "message": "unknown label 'cat'"}));

        let client = client_with(mock.clone(), 1024);
        let (_dir, path) = write_temp_file(b"annotations");

        let err = Uploader::new(&client)
            .upload_annotation_file(&CREATE_JOB_ANNOTATIONS, &path, "YOLO ZIP 1.0", &id_params())
            .await
            .unwrap_err();

        match err {
            AnnosyncError::Transfer(TransferError::Failed(msg)) => {
                assert_eq!(msg, "unknown label 'cat'");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chunked_upload_offsets_and_session() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"upload_id": "sess-1"}));
        mock.push_response(200, b""); // chunk 0..4
        mock.push_response(200, b""); // chunk 4..8
        mock.push_response(200, b""); // chunk 8..10
        mock.push_response(200, b""); // finish, immediate completion

        let client = client_with(mock.clone(), 4);
        let (_dir, path) = write_temp_file(b"0123456789");

        Uploader::new(&client)
            .upload_annotation_file(&CREATE_JOB_ANNOTATIONS, &path, "COCO 1.0", &id_params())
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 5);

        assert_eq!(requests[0].header("Upload-Start"), Some("true"));

        let chunks = [
            (0u64, b"0123".as_slice()),
            (4, b"4567".as_slice()),
            (8, b"89".as_slice()),
        ];
        for (i, (offset, payload)) in chunks.iter().enumerate()
        {
            let request = &requests[i + 1];
            assert_eq!(request.method, HttpMethod::Patch);
            assert_eq!(request.header("Upload-Id"), Some("sess-1"));
            assert_eq!(request.header("Upload-Offset"), Some(offset.to_string().as_str()));
            match &request.body {
                RequestBody::Raw(content) => assert_eq!(content.as_slice(), *payload),
                other => panic!("unexpected body: {other:?}"),
            }
        }

        assert_eq!(requests[4].header("Upload-Finish"), Some("true"));
        assert_eq!(requests[4].header("Upload-Id"), Some("sess-1"));
        assert_eq!(requests[4].query_value("format"), Some("COCO 1.0"));
    }

    #[tokio::test]
    async fn test_chunk_failure_aborts_session() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"upload_id": "sess-2"}));
        mock.push_response(500, b"disk full"); // first chunk rejected
        mock.push_response(204, b""); // session abort

        let client = client_with(mock.clone(), 4);
        let (_dir, path) = write_temp_file(b"0123456789");

        let err = Uploader::new(&client)
            .upload_annotation_file(&CREATE_JOB_ANNOTATIONS, &path, "COCO 1.0", &id_params())
            .await
            .unwrap_err();

        assert!(matches!(err, AnnosyncError::Transport(_)));

        let requests = mock.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[2].method, HttpMethod::Delete);
        assert_eq!(requests[2].header("Upload-Id"), Some("sess-2"));
    }

    #[tokio::test]
    async fn test_progress_reported_at_chunk_boundaries() {
        use std::sync::Mutex;

        struct RecordingReporter {
            updates: Mutex<Vec<(u64, Option<u64>)>>,
        }

        impl ProgressReporter for RecordingReporter {
            fn update(&self, current: u64, total: Option<u64>) {
                self.updates.lock().unwrap().push((current, total));
            }
        }

        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"upload_id": "sess-3"}));
        mock.push_response(200, b"");
        mock.push_response(200, b"");
        mock.push_response(200, b"");
        mock.push_response(200, b"");

        let client = client_with(mock.clone(), 4);
        let (_dir, path) = write_temp_file(b"0123456789");
        let reporter = Arc::new(RecordingReporter {
            updates: Mutex::new(Vec::new()),
        });

        Uploader::new(&client)
            .with_progress(reporter.clone())
            .upload_annotation_file(&CREATE_JOB_ANNOTATIONS, &path, "COCO 1.0", &id_params())
            .await
            .unwrap();

        let updates = reporter.updates.lock().unwrap().clone();
        assert_eq!(
            updates,
            vec![(4, Some(10)), (8, Some(10)), (10, Some(10))]
        );
    }
}
