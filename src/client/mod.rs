//! Client handle for the annotation platform API
//!
//! A [`Client`] owns the configuration and the transport and hands out
//! [`RecordProxy`] instances for individual job records. Cloning a client is
//! cheap; clones share the same transport.

use std::sync::Arc;

use url::Url;

use crate::api::{self, HttpMethod};
use crate::config::Config;
use crate::error::{Result, TransportError};
use crate::record::{RecordId, RecordProxy, RecordSchema, RemoteRecord};
use crate::transport::{ApiRequest, HttpTransport, Transport};

/// Handle to one annotation platform instance
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: Config,
    base_url: Url,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client using the HTTP transport
    ///
    /// # Arguments
    /// * `config` - Client configuration
    ///
    /// # Returns
    /// * `Result<Self>` - New client, or a config/transport construction error
    pub fn new(config: Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config.api)?);
        Self::with_transport(config, transport)
    }

    /// Create a client over a caller-supplied transport
    ///
    /// Primarily a seam for exercising client components against a test
    /// transport.
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let mut base = config.api.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", config.api.base_url)))?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                base_url,
                transport,
            }),
        })
    }

    /// Client configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Resolved API base URL (with trailing slash)
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The request execution seam
    pub(crate) fn transport(&self) -> Arc<dyn Transport> {
        self.inner.transport.clone()
    }

    /// Retrieve a job record and wrap it in a proxy
    ///
    /// # Arguments
    /// * `id` - Record identifier
    ///
    /// # Returns
    /// * `Result<RecordProxy>` - Proxy over the fetched record, `NotFound` if
    ///   the id is unknown server-side
    pub async fn record(&self, id: RecordId) -> Result<RecordProxy> {
        let url = api::RETRIEVE_JOB.url(self.base_url(), &[("id", id.to_string())])?;
        let response = self
            .transport()
            .execute(ApiRequest::new(HttpMethod::Get, url))
            .await?;
        response.error_for_status()?;

        let record = RemoteRecord::from_value(response.json()?)?;
        Ok(self.wrap(record))
    }

    /// Wrap an already-retrieved record in a proxy
    pub fn wrap(&self, record: RemoteRecord) -> RecordProxy {
        RecordProxy::new(self.clone(), RecordSchema::job(), record)
    }
}
