//! Resumable chunked upload of short training videos.
//!
//! A file is validated locally, split into server-sized chunks and sent one
//! chunk at a time. Any chunk the server has acknowledged is never sent
//! again, so an interrupted session can be resumed by id.

pub mod chunk;
pub mod chunk_set;
pub mod config;
pub mod error;
pub mod http;
pub mod progress;
pub mod session;
pub mod transport;
pub mod validation;

pub use chunk::{ByteSource, ChunkLayout, FileSource, MemorySource, UploadFile};
pub use chunk_set::ChunkSet;
pub use config::{ClientConfig, ConfigError, RetryPolicy};
pub use error::{RequestFailure, SessionInvalidReason, UploadError};
pub use http::HttpTransport;
pub use progress::{ChannelReporter, NullReporter, ProgressReporter, TracingReporter, UploadProgress};
pub use session::{CompletionResult, SessionState, UploadOutcome, UploadSession, Uploader};
pub use tokio_util::sync::CancellationToken;
pub use transport::{ChunkOutcome, Credential, Transport};
pub use validation::{ValidationError, validate};

/// Upload `file` over HTTP with `config`, resuming `existing_session_id`
/// when given.
pub async fn upload<S, R>(
    config: &ClientConfig,
    credential: Credential,
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
    let transport = HttpTransport::new(config, credential).map_err(|e| {
        UploadError::InitiateFailed(RequestFailure::new(format!("cannot build HTTP client: {e}"), None))
    })?;
    let uploader = Uploader::from_config(transport, config);
    uploader
        .upload(file, duration_seconds, reporter, cancel, existing_session_id)
        .await
}
