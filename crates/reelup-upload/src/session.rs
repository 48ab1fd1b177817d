use std::fmt;

use bytes::Bytes;
use reelup_types::api::{CancelResponse, InitiateRequest, StatusResponse};
use reelup_types::{SessionStatus, VideoStatus};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::UploadError;
use crate::chunk::{ByteSource, ChunkLayout, UploadFile};
use crate::chunk_set::ChunkSet;
use crate::config::{ClientConfig, RetryPolicy};
use crate::error::{RequestFailure, SessionInvalidReason};
use crate::progress::{ProgressReporter, UploadProgress, compute_progress};
use crate::transport::{ChunkOutcome, Transport};
use crate::validation::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Resuming,
    Initiating,
    Transferring,
    Completing,
    Completed,
    Cancelling,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Resuming => "resuming",
            Self::Initiating => "initiating",
            Self::Transferring => "transferring",
            Self::Completing => "completing",
            Self::Completed => "completed",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Server-side result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub session_id: String,
    pub video_id: String,
    pub status: VideoStatus,
    pub duration_seconds: u32,
    pub file_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Completed(CompletionResult),
    /// Stopped by the caller. `session_id` is `None` when cancellation was
    /// observed before a session existed.
    Cancelled { session_id: Option<String> },
}

/// One transfer of one file, exclusively owned by the loop driving it.
///
/// Chunk geometry is fixed on creation; `confirmed` only grows, and only
/// on an explicit server acknowledgement.
pub struct UploadSession<S> {
    session_id: String,
    file: UploadFile<S>,
    layout: ChunkLayout,
    confirmed: ChunkSet,
    started_at: Instant,
    state: SessionState,
}

impl<S: ByteSource> UploadSession<S> {
    fn new(session_id: String, file: UploadFile<S>, layout: ChunkLayout, confirmed: ChunkSet) -> Self {
        Self {
            session_id,
            file,
            layout,
            confirmed,
            started_at: Instant::now(),
            state: SessionState::Idle,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    pub fn confirmed(&self) -> &ChunkSet {
        &self.confirmed
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn progress(&self) -> UploadProgress {
        compute_progress(&self.layout, &self.confirmed, self.started_at.elapsed())
    }

    fn transition(&mut self, next: SessionState) {
        debug!(session_id = %self.session_id, from = %self.state, to = %next, "session state");
        self.state = next;
    }

    fn fail(&mut self, err: UploadError) -> UploadError {
        warn!(session_id = %self.session_id, code = err.code(), error = %err, "upload failed");
        self.state = SessionState::Failed;
        err
    }

    /// Records a server acknowledgement. Returns false for a duplicate.
    fn confirm(&mut self, outcome: &ChunkOutcome) -> bool {
        let index = outcome.index();
        let fresh = self.confirmed.insert(index);
        match outcome {
            ChunkOutcome::Stored { bytes_received, .. } => {
                debug!(session_id = %self.session_id, chunk = index, bytes = bytes_received, "chunk stored");
            }
            ChunkOutcome::AlreadyPresent { .. } => {
                debug!(session_id = %self.session_id, chunk = index, "chunk already on server");
            }
        }
        fresh
    }
}

/// Drives upload sessions over a `Transport`.
pub struct Uploader<T> {
    transport: T,
    retry: RetryPolicy,
    default_chunk_size: u64,
}

impl<T: Transport> Uploader<T> {
    pub fn new(transport: T) -> Self {
        Self::from_config(transport, &ClientConfig::default())
    }

    pub fn from_config(transport: T, config: &ClientConfig) -> Self {
        Self {
            transport,
            retry: config.retry,
            default_chunk_size: config.default_chunk_size,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_default_chunk_size(mut self, chunk_size: u64) -> Self {
        self.default_chunk_size = chunk_size;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Validate, then start a new session or resume `existing_session_id`,
    /// upload every unconfirmed chunk, and complete.
    ///
    /// Cancellation is observed before the session is opened and before
    /// every chunk index; an in-flight request is allowed to settle.
    pub async fn upload<S, R>(
        &self,
        file: UploadFile<S>,
        duration_seconds: u32,
        reporter: &R,
        cancel: &CancellationToken,
        existing_session_id: Option<&str>,
    ) -> Result<UploadOutcome, UploadError>
    where
        S: ByteSource,
        R: ProgressReporter + ?Sized,
    {
        validate(file.size(), &file.content_type, duration_seconds)?;

        if cancel.is_cancelled() {
            info!("upload cancelled before start");
            return Ok(UploadOutcome::Cancelled {
                session_id: existing_session_id.map(str::to_string),
            });
        }

        let session = match existing_session_id {
            Some(id) => self.resume(file, id).await?,
            None => self.initiate(file, duration_seconds).await?,
        };
        self.run(session, reporter, cancel).await
    }

    /// Open a fresh session on the server.
    pub async fn initiate<S: ByteSource>(
        &self,
        file: UploadFile<S>,
        duration_seconds: u32,
    ) -> Result<UploadSession<S>, UploadError> {
        let file_size = file.size();
        let request = InitiateRequest {
            filename: file.name.clone(),
            file_size,
            content_type: file.content_type.clone(),
            duration_seconds,
        };
        debug!(filename = %request.filename, file_size, "initiating upload");
        let resp = self.transport.initiate(&request).await?;

        let layout = ChunkLayout::new(file_size, resp.chunk_size).ok_or_else(|| {
            UploadError::InitiateFailed(RequestFailure::new(
                format!("server assigned an invalid chunk size of {}", resp.chunk_size),
                None,
            ))
        })?;
        if layout.total_chunks() != resp.total_chunks {
            return Err(UploadError::InitiateFailed(RequestFailure::new(
                format!(
                    "server expects {} chunks but the file splits into {} at {} bytes",
                    resp.total_chunks,
                    layout.total_chunks(),
                    resp.chunk_size
                ),
                None,
            )));
        }

        info!(
            session_id = %resp.upload_id,
            chunk_size = resp.chunk_size,
            total_chunks = resp.total_chunks,
            expires_at = %resp.expires_at,
            "upload initiated"
        );
        let confirmed = ChunkSet::new(layout.total_chunks());
        let mut session = UploadSession::new(resp.upload_id, file, layout, confirmed);
        session.transition(SessionState::Initiating);
        Ok(session)
    }

    /// Re-open an existing session, seeding the confirmed set from the server.
    ///
    /// The server's chunk size wins when it reports one; otherwise the
    /// default is assumed and must reproduce the server's chunk count.
    pub async fn resume<S: ByteSource>(
        &self,
        file: UploadFile<S>,
        session_id: &str,
    ) -> Result<UploadSession<S>, UploadError> {
        debug!(session_id, "resuming upload");
        let status = self.transport.get_status(session_id).await?;
        let invalid = |reason| UploadError::SessionInvalid {
            session_id: session_id.to_string(),
            reason,
        };

        if status.status != SessionStatus::Active {
            return Err(invalid(SessionInvalidReason::NotActive(status.status)));
        }

        let chunk_size = status.chunk_size.unwrap_or(self.default_chunk_size);
        let layout = ChunkLayout::new(file.size(), chunk_size)
            .ok_or_else(|| invalid(SessionInvalidReason::InvalidChunkSize(chunk_size)))?;
        if layout.total_chunks() != status.total_chunks {
            return Err(invalid(SessionInvalidReason::ChunkCountMismatch {
                reported: status.total_chunks,
                expected: layout.total_chunks(),
                chunk_size,
            }));
        }

        let received = self.transport.list_received_chunks(session_id).await?;
        let mut confirmed = ChunkSet::new(layout.total_chunks());
        for index in received {
            if index >= layout.total_chunks() {
                warn!(session_id, chunk = index, "ignoring out-of-range chunk index from server");
                continue;
            }
            confirmed.insert(index);
        }

        info!(
            session_id,
            confirmed = confirmed.len(),
            total_chunks = layout.total_chunks(),
            "upload resumed"
        );
        let mut session = UploadSession::new(session_id.to_string(), file, layout, confirmed);
        session.transition(SessionState::Resuming);
        Ok(session)
    }

    /// Upload every unconfirmed chunk in ascending order, then complete.
    pub async fn run<S, R>(
        &self,
        mut session: UploadSession<S>,
        reporter: &R,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, UploadError>
    where
        S: ByteSource,
        R: ProgressReporter + ?Sized,
    {
        session.transition(SessionState::Transferring);

        for index in 0..session.layout.total_chunks() {
            if cancel.is_cancelled() {
                return Ok(self.cancel_session(&mut session).await);
            }
            if session.confirmed.contains(index) {
                continue;
            }

            let data = match session.layout.read_chunk(&mut session.file.source, index).await {
                Ok(data) => data,
                Err(e) => return Err(session.fail(e)),
            };
            let outcome = match self.upload_with_retry(&session.session_id, index, data).await {
                Ok(outcome) => outcome,
                Err(e) => return Err(session.fail(e)),
            };

            session.confirm(&outcome);
            reporter.report(&session.progress());
        }

        session.transition(SessionState::Completing);
        let resp = match self.transport.complete(&session.session_id).await {
            Ok(resp) => resp,
            Err(e) => return Err(session.fail(e)),
        };
        session.transition(SessionState::Completed);
        info!(
            session_id = %session.session_id,
            video_id = %resp.video_id,
            status = %resp.status,
            "upload complete"
        );

        Ok(UploadOutcome::Completed(CompletionResult {
            session_id: session.session_id,
            video_id: resp.video_id,
            status: resp.status,
            duration_seconds: resp.duration_seconds,
            file_size: resp.file_size,
        }))
    }

    /// Ask the server to drop a session.
    pub async fn cancel(&self, session_id: &str) -> Result<CancelResponse, UploadError> {
        self.transport.cancel(session_id).await
    }

    pub async fn status(&self, session_id: &str) -> Result<StatusResponse, UploadError> {
        self.transport.get_status(session_id).await
    }

    async fn upload_with_retry(&self, session_id: &str, index: u32, data: Bytes) -> Result<ChunkOutcome, UploadError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.transport.upload_chunk(session_id, index, data.clone()).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if !e.is_retryable() || attempt >= max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        session_id,
                        chunk = index,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "chunk upload failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Best-effort remote cancel. A failure is logged and never blocks
    /// local cancellation.
    async fn cancel_session<S: ByteSource>(&self, session: &mut UploadSession<S>) -> UploadOutcome {
        session.transition(SessionState::Cancelling);
        match self.transport.cancel(&session.session_id).await {
            Ok(_) => info!(session_id = %session.session_id, "upload cancelled"),
            Err(e) => warn!(
                session_id = %session.session_id,
                error = %e,
                "remote cancel failed, cancelled locally"
            ),
        }
        session.transition(SessionState::Cancelled);
        UploadOutcome::Cancelled {
            session_id: Some(session.session_id.clone()),
        }
    }
}
