//! Polling protocol for asynchronous server-side operations
//!
//! Imports and exports that the server processes asynchronously hand back an
//! operation id. This module polls the status endpoint for that id at a fixed
//! interval until the operation reaches a terminal state, modelled as an
//! explicit state machine:
//!
//! ```text
//! Pending -> Polling -> { Finished, Failed, Cancelled }
//! ```
//!
//! The state machine itself ([`PollLoop`]) performs exactly one status query
//! per step and never sleeps; the fixed-interval pacing and cancellation race
//! live in [`wait_for_operation`]. This keeps the protocol testable with a
//! mock transport and a paused clock.

use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::api::{self, HttpMethod};
use crate::error::{AnnosyncError, Result, TransferError};
use crate::transfer::progress::ProgressReporter;
use crate::transport::{ApiRequest, Transport};

/// Status of an asynchronous server-side operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Queued,
    Started,
    Finished,
    Failed,
}

impl OperationStatus {
    /// Whether this status ends the operation's lifecycle
    pub fn is_terminal(self) -> bool {
        matches!(self, OperationStatus::Finished | OperationStatus::Failed)
    }
}

/// Body of a status endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct StatusReply {
    /// Current operation status
    pub status: OperationStatus,

    /// Failure message, present when the operation failed
    #[serde(default)]
    pub message: Option<String>,

    /// Completion fraction in `[0, 1]`, when the server reports one
    #[serde(default)]
    pub progress: Option<f64>,
}

/// Handle to an asynchronous server-side operation
///
/// Created from the response that initiated the operation and discarded once
/// a terminal status has been observed; the id is never queried again after
/// that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOperation {
    /// Server-assigned operation id
    pub rq_id: String,
}

impl TransferOperation {
    /// Extract an operation handle from an initiating response body
    ///
    /// # Arguments
    /// * `body` - Response body of the upload or prepare-export request
    ///
    /// # Returns
    /// * `Option<Self>` - The operation, or None if the body carries no
    ///   `rq_id` (the server completed the request immediately)
    pub fn from_body(body: &[u8]) -> Option<Self> {
        #[derive(Deserialize)]
        struct OperationReply {
            rq_id: String,
        }

        serde_json::from_slice::<OperationReply>(body)
            .ok()
            .map(|reply| Self { rq_id: reply.rq_id })
    }
}

/// Poll loop state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// No status query issued yet
    Pending,

    /// At least one non-terminal status observed
    Polling,

    /// The operation completed successfully
    Finished,

    /// The server reported failure with the given message
    Failed(String),

    /// The caller aborted the loop
    Cancelled,
}

impl PollState {
    /// Whether the loop is done
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Finished | PollState::Failed(_) | PollState::Cancelled
        )
    }
}

/// Steppable polling state machine for one operation
pub struct PollLoop<'a> {
    transport: &'a dyn Transport,
    base_url: &'a Url,
    operation: TransferOperation,
    progress: &'a dyn ProgressReporter,
    state: PollState,
}

impl<'a> PollLoop<'a> {
    /// Create a poll loop in the `Pending` state
    pub fn new(
        transport: &'a dyn Transport,
        base_url: &'a Url,
        operation: TransferOperation,
        progress: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            transport,
            base_url,
            operation,
            progress,
            state: PollState::Pending,
        }
    }

    /// Current state
    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// Issue one status query and advance the state machine
    ///
    /// Calling `step` on a terminal state is a no-op. A non-terminal reply
    /// forwards any progress hint to the reporter.
    ///
    /// # Returns
    /// * `Result<&PollState>` - The state after the query
    pub async fn step(&mut self) -> Result<&PollState> {
        if self.state.is_terminal() {
            return Ok(&self.state);
        }

        let url = api::RETRIEVE_REQUEST_STATUS.url(
            self.base_url,
            &[("rq_id", self.operation.rq_id.clone())],
        )?;

        let response = self
            .transport
            .execute(ApiRequest::new(HttpMethod::Get, url))
            .await?;
        response.error_for_status()?;

        let reply: StatusReply = response.json()?;
        debug!(
            "operation {} status: {:?} (progress {:?})",
            self.operation.rq_id, reply.status, reply.progress
        );

        self.state = match reply.status {
            OperationStatus::Finished => PollState::Finished,
            OperationStatus::Failed => PollState::Failed(
                reply
                    .message
                    .unwrap_or_else(|| "operation failed without a message".to_string()),
            ),
            OperationStatus::Queued | OperationStatus::Started => {
                if let Some(fraction) = reply.progress {
                    let pct = (fraction.clamp(0.0, 1.0) * 100.0) as u64;
                    self.progress.update(pct, Some(100));
                }
                PollState::Polling
            }
        };

        Ok(&self.state)
    }

    /// Mark the loop cancelled
    pub fn cancel(&mut self) {
        self.state = PollState::Cancelled;
    }
}

/// Poll an operation to completion at a fixed interval
///
/// Issues a status query every `period` until a terminal status is observed.
/// The cancellation token is checked at each iteration boundary and raced
/// against the inter-poll sleep: cancelling mid-sleep aborts without issuing
/// a further status query. No retry limit is enforced; callers wanting an
/// overall bound can wrap this in `tokio::time::timeout`.
///
/// # Arguments
/// * `transport` - Request execution seam
/// * `base_url` - API base URL
/// * `operation` - Operation to poll, consumed by the loop
/// * `period` - Interval between status queries
/// * `progress` - Progress observer fed at each poll tick
/// * `cancel` - Caller-driven abort signal
///
/// # Returns
/// * `Result<()>` - Ok on `finished`; `TransferError::Failed` on `failed`;
///   `AnnosyncError::Cancelled` if aborted
pub(crate) async fn wait_for_operation(
    transport: &dyn Transport,
    base_url: &Url,
    operation: TransferOperation,
    period: Duration,
    progress: &dyn ProgressReporter,
    cancel: &CancellationToken,
) -> Result<()> {
    let rq_id = operation.rq_id.clone();
    let mut poll = PollLoop::new(transport, base_url, operation, progress);

    loop {
        if cancel.is_cancelled() {
            poll.cancel();
            return Err(cancelled(&rq_id));
        }

        match poll.step().await? {
            PollState::Finished => {
                debug!("operation {} finished", rq_id);
                return Ok(());
            }
            PollState::Failed(message) => {
                return Err(TransferError::Failed(message.clone()).into());
            }
            PollState::Cancelled => return Err(cancelled(&rq_id)),
            PollState::Pending | PollState::Polling => {}
        }

        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = cancel.cancelled() => {
                poll.cancel();
                return Err(cancelled(&rq_id));
            }
        }
    }
}

fn cancelled(rq_id: &str) -> AnnosyncError {
    AnnosyncError::Cancelled(format!("operation {rq_id} polling aborted by caller"))
}
