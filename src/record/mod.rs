//! Record proxy for remote annotation jobs
//!
//! A [`RecordProxy`] mirrors one server-side job record: it holds the last
//! known field values, refreshes them with [`fetch`](RecordProxy::fetch),
//! pushes local edits back with [`commit`](RecordProxy::commit), and offers
//! the record-scoped transfer operations (annotation import, dataset export).
//!
//! Field access goes through an explicit [`RecordSchema`] rather than dynamic
//! attribute delegation: unknown fields and writes to read-only fields are
//! rejected up front.
//!
//! A proxy owns its cached record exclusively; it is not synchronized and
//! must not be driven from multiple tasks concurrently.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::{self, HttpMethod};
use crate::client::Client;
use crate::error::{Result, SchemaError};
use crate::transfer::progress::ProgressReporter;
use crate::transfer::{Downloader, Uploader};
use crate::transport::{ApiRequest, RequestBody};

/// Server-side record identifier
pub type RecordId = i64;

/// One field of a record schema
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Field name as it appears on the wire
    pub name: &'static str,

    /// Whether the field may be changed through the proxy
    pub writable: bool,
}

/// Known fields of one record kind
#[derive(Debug)]
pub struct RecordSchema {
    kind: &'static str,
    fields: &'static [FieldSpec],
}

impl RecordSchema {
    /// Record kind name
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name == name)
    }

    /// Schema of the annotation job record
    pub fn job() -> &'static RecordSchema {
        &JOB_SCHEMA
    }
}

static JOB_SCHEMA: RecordSchema = RecordSchema {
    kind: "job",
    fields: &[
        FieldSpec { name: "id", writable: false },
        FieldSpec { name: "url", writable: false },
        FieldSpec { name: "task_id", writable: false },
        FieldSpec { name: "project_id", writable: false },
        FieldSpec { name: "assignee", writable: true },
        FieldSpec { name: "stage", writable: true },
        FieldSpec { name: "state", writable: true },
        FieldSpec { name: "status", writable: true },
        FieldSpec { name: "bug_tracker", writable: true },
        FieldSpec { name: "mode", writable: false },
        FieldSpec { name: "start_frame", writable: false },
        FieldSpec { name: "stop_frame", writable: false },
        FieldSpec { name: "data_chunk_size", writable: false },
        FieldSpec { name: "labels", writable: false },
        FieldSpec { name: "updated_date", writable: false },
    ],
};

/// Locally cached copy of one server-side record
///
/// The identifier is fixed at construction; the field map is replaced
/// wholesale on every fetch, never merged.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    id: RecordId,
    fields: Map<String, Value>,
}

impl RemoteRecord {
    /// Build a record from a server response payload
    ///
    /// # Arguments
    /// * `value` - JSON object carrying at least an integer `id`
    ///
    /// # Returns
    /// * `Result<Self>` - The record, or a schema error for malformed payloads
    pub fn from_value(value: Value) -> Result<Self> {
        let fields = match value {
            Value::Object(map) => map,
            _ => return Err(SchemaError::NotAnObject.into()),
        };

        let id = fields
            .get("id")
            .and_then(Value::as_i64)
            .ok_or(SchemaError::MissingId)?;

        Ok(Self { id, fields })
    }

    /// Record identifier
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Last known field values
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Value of one field, if present
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    /// Replace the field map wholesale, keeping the identifier
    fn replace_fields(&mut self, fields: Map<String, Value>) {
        self.fields = fields;
    }

    /// Serialize the cached state into a partial-update payload
    ///
    /// All fields are included; the proxy keeps no dirty tracking.
    pub fn to_patch_payload(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Options for [`RecordProxy::import_annotations`]
#[derive(Default)]
pub struct ImportOptions {
    /// Poll interval override; the client's configured period when None
    pub status_check_period: Option<Duration>,

    /// Progress observer
    pub progress: Option<Arc<dyn ProgressReporter>>,

    /// Caller-driven abort signal
    pub cancel: Option<CancellationToken>,
}

/// Options for [`RecordProxy::export_dataset`]
pub struct ExportOptions {
    /// Bundle source media with the annotations
    pub include_images: bool,

    /// Poll interval override; the client's configured period when None
    pub status_check_period: Option<Duration>,

    /// Progress observer
    pub progress: Option<Arc<dyn ProgressReporter>>,

    /// Caller-driven abort signal
    pub cancel: Option<CancellationToken>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_images: true,
            status_check_period: None,
            progress: None,
            cancel: None,
        }
    }
}

/// Proxy over one remote job record
pub struct RecordProxy {
    client: Client,
    schema: &'static RecordSchema,
    record: RemoteRecord,
}

impl std::fmt::Debug for RecordProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordProxy")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

impl RecordProxy {
    pub(crate) fn new(client: Client, schema: &'static RecordSchema, record: RemoteRecord) -> Self {
        Self {
            client,
            schema,
            record,
        }
    }

    /// Record identifier
    pub fn id(&self) -> RecordId {
        self.record.id()
    }

    /// The cached record
    pub fn record(&self) -> &RemoteRecord {
        &self.record
    }

    /// Read a field from the cached record
    ///
    /// # Arguments
    /// * `field` - Field name, validated against the schema
    ///
    /// # Returns
    /// * `Result<Option<&Value>>` - The cached value (None if the server has
    ///   not sent the field), or a schema error for unknown fields
    pub fn get(&self, field: &str) -> Result<Option<&Value>> {
        self.spec(field)?;
        Ok(self.record.get(field))
    }

    /// Change a field on the cached record
    ///
    /// The change is local until [`commit`](Self::commit) is called.
    ///
    /// # Arguments
    /// * `field` - Field name, validated against the schema
    /// * `value` - New value
    ///
    /// # Returns
    /// * `Result<()>` - Ok, or a schema error for unknown/read-only fields
    pub fn set(&mut self, field: &str, value: Value) -> Result<()> {
        let spec = self.spec(field)?;
        if !spec.writable {
            return Err(SchemaError::ReadOnlyField {
                kind: self.schema.kind().to_string(),
                field: field.to_string(),
            }
            .into());
        }

        self.record.set(field, value);
        Ok(())
    }

    /// Refresh the cached record from the server
    ///
    /// The field map is replaced wholesale with the server's current state.
    ///
    /// # Arguments
    /// * `force` - Reserved for revision checking; currently has no effect
    ///
    /// # Returns
    /// * `Result<()>` - Ok, `NotFound` if the id is unknown server-side, or a
    ///   transport error
    pub async fn fetch(&mut self, force: bool) -> Result<()> {
        // TODO: revision checking once the server exposes record revisions;
        // `force` will then override a conflicting revision.
        let _ = force;

        let url = api::RETRIEVE_JOB.url(self.client.base_url(), &self.url_params())?;
        let response = self
            .client
            .transport()
            .execute(ApiRequest::new(HttpMethod::Get, url))
            .await?;
        response.error_for_status()?;

        let fetched = RemoteRecord::from_value(response.json()?)?;
        self.record.replace_fields(fetched.fields);
        Ok(())
    }

    /// Push the cached record back to the server
    ///
    /// Issues a partial update carrying all cached fields.
    ///
    /// # Arguments
    /// * `force` - Reserved for revision checking; currently has no effect
    ///
    /// # Returns
    /// * `Result<()>` - Ok, `NotFound` if the id is unknown server-side, or a
    ///   transport error
    pub async fn commit(&mut self, force: bool) -> Result<()> {
        let _ = force;

        let url = api::PARTIAL_UPDATE_JOB.url(self.client.base_url(), &self.url_params())?;
        let request = ApiRequest::new(HttpMethod::Patch, url)
            .with_body(RequestBody::Json(self.record.to_patch_payload()));

        let response = self.client.transport().execute(request).await?;
        response.error_for_status()?;
        Ok(())
    }

    /// Upload annotations for this record in the given format
    ///
    /// # Arguments
    /// * `format_name` - Annotation schema name (e.g. `"YOLO ZIP 1.0"`)
    /// * `filename` - Local annotation file
    /// * `options` - Progress, cancellation and poll interval overrides
    ///
    /// # Returns
    /// * `Result<()>` - Ok once the server has fully imported the file
    pub async fn import_annotations(
        &self,
        format_name: &str,
        filename: &Path,
        options: &ImportOptions,
    ) -> Result<()> {
        let mut uploader = Uploader::new(&self.client);
        if let Some(progress) = &options.progress {
            uploader = uploader.with_progress(progress.clone());
        }
        if let Some(cancel) = &options.cancel {
            uploader = uploader.with_cancellation(cancel.clone());
        }
        if let Some(period) = options.status_check_period {
            uploader = uploader.with_status_check_period(period);
        }

        uploader
            .upload_annotation_file(
                &api::CREATE_JOB_ANNOTATIONS,
                filename,
                format_name,
                &self.url_params(),
            )
            .await?;

        info!(
            "Annotation file '{}' for job #{} uploaded",
            filename.display(),
            self.id()
        );
        Ok(())
    }

    /// Download this record's annotations in the given format
    ///
    /// With `include_images` set, the export bundles source media; otherwise
    /// only the annotation file is produced.
    ///
    /// # Arguments
    /// * `format_name` - Annotation schema name (e.g. `"COCO 1.0"`)
    /// * `filename` - Local destination path, overwritten if present
    /// * `options` - Endpoint variant, progress, cancellation, poll interval
    ///
    /// # Returns
    /// * `Result<()>` - Ok once the file is fully written to disk
    pub async fn export_dataset(
        &self,
        format_name: &str,
        filename: &Path,
        options: &ExportOptions,
    ) -> Result<()> {
        let endpoint = if options.include_images {
            api::RETRIEVE_JOB_DATASET
        } else {
            api::RETRIEVE_JOB_ANNOTATIONS
        };

        let mut downloader = Downloader::new(&self.client);
        if let Some(progress) = &options.progress {
            downloader = downloader.with_progress(progress.clone());
        }
        if let Some(cancel) = &options.cancel {
            downloader = downloader.with_cancellation(cancel.clone());
        }
        if let Some(period) = options.status_check_period {
            downloader = downloader.with_status_check_period(period);
        }

        downloader
            .prepare_and_download(
                &endpoint,
                filename,
                &self.url_params(),
                &[("format", format_name.to_string())],
            )
            .await?;

        info!(
            "Dataset for job #{} has been downloaded to '{}'",
            self.id(),
            filename.display()
        );
        Ok(())
    }

    fn url_params(&self) -> Vec<(&'static str, String)> {
        vec![("id", self.id().to_string())]
    }

    fn spec(&self, field: &str) -> Result<&FieldSpec> {
        self.schema.field(field).ok_or_else(|| {
            SchemaError::UnknownField {
                kind: self.schema.kind().to_string(),
                field: field.to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::config::Config;
    use crate::error::AnnosyncError;
    use crate::transport::testing::MockTransport;

    fn client_with(mock: Arc<MockTransport>) -> Client {
        Client::with_transport(Config::default(), mock).unwrap()
    }

    fn job_value() -> Value {
        json!({
            "id": 42,
            "task_id": 7,
            "assignee": null,
            "stage": "annotation",
            "state": "new",
            "status": "annotation",
            "start_frame": 0,
            "stop_frame": 99
        })
    }

    fn proxy_with(mock: Arc<MockTransport>) -> RecordProxy {
        let client = client_with(mock);
        client.wrap(RemoteRecord::from_value(job_value()).unwrap())
    }

    #[test]
    fn test_record_from_value_requires_object() {
        let err = RemoteRecord::from_value(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(
            err,
            AnnosyncError::Schema(SchemaError::NotAnObject)
        ));
    }

    #[test]
    fn test_record_from_value_requires_id() {
        let err = RemoteRecord::from_value(json!({"stage": "annotation"})).unwrap_err();
        assert!(matches!(err, AnnosyncError::Schema(SchemaError::MissingId)));
    }

    #[test]
    fn test_get_unknown_field_rejected() {
        let proxy = proxy_with(Arc::new(MockTransport::new()));
        let err = proxy.get("frame_rate").unwrap_err();
        assert!(matches!(
            err,
            AnnosyncError::Schema(SchemaError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_set_read_only_field_rejected() {
        let mut proxy = proxy_with(Arc::new(MockTransport::new()));
        let err = proxy.set("task_id", json!(9)).unwrap_err();
        assert!(matches!(
            err,
            AnnosyncError::Schema(SchemaError::ReadOnlyField { .. })
        ));
    }

    #[test]
    fn test_set_writable_field() {
        let mut proxy = proxy_with(Arc::new(MockTransport::new()));
        proxy.set("state", json!("in progress")).unwrap();
        assert_eq!(
            proxy.get("state").unwrap(),
            Some(&json!("in progress"))
        );
    }

    #[tokio::test]
    async fn test_fetch_replaces_fields_wholesale() {
        let mock = Arc::new(MockTransport::new());
        // The refreshed record no longer carries stop_frame
        mock.push_json(
            200,
            json!({"id": 42, "task_id": 7, "state": "completed"}),
        );

        let mut proxy = proxy_with(mock.clone());
        assert!(proxy.get("stop_frame").unwrap().is_some());

        proxy.fetch(false).await.unwrap();

        assert_eq!(proxy.get("state").unwrap(), Some(&json!("completed")));
        assert_eq!(proxy.get("stop_frame").unwrap(), None);
        assert_eq!(proxy.id(), 42);

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Get);
        assert_eq!(requests[0].path, "/api/jobs/42");
    }

    #[tokio::test]
    async fn test_fetch_then_commit_round_trips_payload() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, job_value());
        mock.push_json(200, job_value());

        let mut proxy = proxy_with(mock.clone());
        proxy.fetch(false).await.unwrap();
        proxy.commit(false).await.unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, HttpMethod::Patch);
        assert_eq!(requests[1].path, "/api/jobs/42");
        match &requests[1].body {
            RequestBody::Json(payload) => assert_eq!(*payload, job_value()),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_unknown_id_is_not_found() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(404, br#"{"detail": "job does not exist"}"#);

        let mut proxy = proxy_with(mock);
        let err = proxy.fetch(false).await.unwrap_err();
        assert!(matches!(err, AnnosyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_export_with_images_uses_dataset_endpoint() {
        let mock = Arc::new(MockTransport::new());
        mock.push_stream(200, vec![b"zipbytes"]);

        let proxy = proxy_with(mock.clone());
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.zip");

        proxy
            .export_dataset("COCO 1.0", &dest, &ExportOptions::default())
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests[0].path, "/api/jobs/42/dataset");
        assert_eq!(requests[0].query_value("format"), Some("COCO 1.0"));
    }

    #[tokio::test]
    async fn test_export_without_images_uses_annotations_endpoint() {
        let mock = Arc::new(MockTransport::new());
        mock.push_stream(200, vec![b"zipbytes"]);

        let proxy = proxy_with(mock.clone());
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.zip");

        let options = ExportOptions {
            include_images: false,
            ..ExportOptions::default()
        };
        proxy
            .export_dataset("COCO 1.0", &dest, &options)
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests[0].path, "/api/jobs/42/annotations");
        assert_eq!(requests[0].query_value("format"), Some("COCO 1.0"));
    }

    #[tokio::test]
    async fn test_import_targets_record_annotations_endpoint() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(200, b"");

        let proxy = proxy_with(mock.clone());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotations.zip");
        std::fs::write(&path, b"data").unwrap();

        proxy
            .import_annotations("YOLO ZIP 1.0", &path, &ImportOptions::default())
            .await
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].path, "/api/jobs/42/annotations");
    }
}
