use std::fmt;
use std::future::Future;

use bytes::Bytes;
use reelup_types::api::{CancelResponse, CompleteResponse, InitiateRequest, InitiateResponse, StatusResponse};

use crate::UploadError;

/// Bearer token attached to every request. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Server's answer to one chunk upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Newly stored.
    Stored {
        index: u32,
        bytes_received: u64,
        total_bytes_received: u64,
        percent: u8,
    },
    /// The server already held this index. Counts as a confirmation.
    AlreadyPresent { index: u32, bytes_received: Option<u64> },
}

impl ChunkOutcome {
    pub fn index(&self) -> u32 {
        match self {
            Self::Stored { index, .. } | Self::AlreadyPresent { index, .. } => *index,
        }
    }
}

/// Remote upload operations. Each call is exactly one round-trip; retry
/// lives in the session loop, never here.
///
/// Errors: `401` is always `Unauthorized`; anything else that fails maps to
/// the operation's own `*Failed` variant.
pub trait Transport: Send + Sync {
    fn initiate(
        &self,
        request: &InitiateRequest,
    ) -> impl Future<Output = Result<InitiateResponse, UploadError>> + Send;

    fn upload_chunk(
        &self,
        session_id: &str,
        index: u32,
        data: Bytes,
    ) -> impl Future<Output = Result<ChunkOutcome, UploadError>> + Send;

    fn get_status(&self, session_id: &str) -> impl Future<Output = Result<StatusResponse, UploadError>> + Send;

    fn list_received_chunks(&self, session_id: &str) -> impl Future<Output = Result<Vec<u32>, UploadError>> + Send;

    fn complete(&self, session_id: &str) -> impl Future<Output = Result<CompleteResponse, UploadError>> + Send;

    fn cancel(&self, session_id: &str) -> impl Future<Output = Result<CancelResponse, UploadError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_debug_is_redacted() {
        let c = Credential::new("secret-token");
        assert_eq!(format!("{c:?}"), "Credential(***)");
        assert_eq!(c.token(), "secret-token");
    }

    #[test]
    fn outcome_index() {
        let stored = ChunkOutcome::Stored {
            index: 4,
            bytes_received: 10,
            total_bytes_received: 50,
            percent: 100,
        };
        assert_eq!(stored.index(), 4);
        let present = ChunkOutcome::AlreadyPresent { index: 2, bytes_received: None };
        assert_eq!(present.index(), 2);
    }
}
