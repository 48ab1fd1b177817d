use reelup_types::SessionStatus;

use crate::validation::ValidationError;

/// Failure of a single transport round-trip.
///
/// `status` is `None` when no HTTP response arrived (connect error, timeout).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}{}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
pub struct RequestFailure {
    pub message: String,
    pub status: Option<u16>,
}

impl RequestFailure {
    pub fn new(message: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }
}

/// Why a resumption target cannot be continued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionInvalidReason {
    #[error("upload session is {0}")]
    NotActive(SessionStatus),

    #[error("server reports {reported} chunks but the file needs {expected} at {chunk_size} bytes each")]
    ChunkCountMismatch {
        reported: u32,
        expected: u32,
        chunk_size: u64,
    },

    #[error("server reported an invalid chunk size of {0}")]
    InvalidChunkSize(u64),
}

/// Errors surfaced by the upload client.
///
/// Chunk-level transient failures are absorbed by retry inside the session
/// loop; anything that reaches the caller is terminal for that session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("initiate failed: {0}")]
    InitiateFailed(RequestFailure),

    #[error("chunk {index} failed: {failure}")]
    ChunkFailed { index: u32, failure: RequestFailure },

    #[error("status lookup failed: {0}")]
    StatusFailed(RequestFailure),

    #[error("received-chunk lookup failed: {0}")]
    ChunksFailed(RequestFailure),

    #[error("session {session_id} cannot be resumed: {reason}")]
    SessionInvalid {
        session_id: String,
        reason: SessionInvalidReason,
    },

    #[error("complete failed: {0}")]
    CompleteFailed(RequestFailure),

    #[error("cancel failed: {0}")]
    CancelFailed(RequestFailure),

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("unauthorized: {0}")]
    Unauthorized(RequestFailure),
}

impl UploadError {
    /// Stable taxonomy code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::InitiateFailed(_) => "INITIATE_FAILED",
            Self::ChunkFailed { .. } => "CHUNK_FAILED",
            Self::StatusFailed(_) => "STATUS_FAILED",
            Self::ChunksFailed(_) => "CHUNKS_FAILED",
            Self::SessionInvalid { .. } => "SESSION_INVALID",
            Self::CompleteFailed(_) => "COMPLETE_FAILED",
            Self::CancelFailed(_) => "CANCEL_FAILED",
            Self::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
            Self::Unauthorized(_) => "UNAUTHORIZED",
        }
    }

    /// Only chunk uploads are retried, and only for non-auth failures.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ChunkFailed { .. })
    }

    /// HTTP status of the failing response, when there was one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::InitiateFailed(f)
            | Self::StatusFailed(f)
            | Self::ChunksFailed(f)
            | Self::CompleteFailed(f)
            | Self::CancelFailed(f)
            | Self::Unauthorized(f) => f.status,
            Self::ChunkFailed { failure, .. } => failure.status,
            Self::Validation(_) | Self::SessionInvalid { .. } | Self::SourceUnavailable(_) => None,
        }
    }
}
