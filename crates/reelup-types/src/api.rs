use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{SessionStatus, VideoStatus};

// -- Initiate --

/// Body of `POST /upload/initiate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateRequest {
    pub filename: String,
    pub file_size: u64,
    pub content_type: String,
    pub duration_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateResponse {
    pub upload_id: String,
    pub chunk_size: u64,
    pub total_chunks: u32,
    pub expires_at: DateTime<Utc>,
}

// -- Chunks --

/// Success body of `PUT /upload/chunk/{upload_id}/{chunk_number}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkResponse {
    pub chunk_number: u32,
    pub received_bytes: u64,
    pub total_received: u64,
    pub progress_percent: u8,
}

/// Structured error detail. A `409` on chunk upload carries
/// `error = "chunk_exists"` plus the original receipt when the server has it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDescription {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_bytes: Option<u64>,
}

/// `detail` is either a plain message or a structured description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Described(ErrorDescription),
}

/// Envelope of every non-success response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: ErrorDetail,
}

impl ErrorBody {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            detail: ErrorDetail::Message(message.into()),
        }
    }

    /// Human-readable text, if the server sent any.
    pub fn text(&self) -> Option<&str> {
        let text = match &self.detail {
            ErrorDetail::Message(m) => m.as_str(),
            ErrorDetail::Described(d) => d.error_description.as_str(),
        };
        (!text.is_empty()).then_some(text)
    }

    pub fn description(&self) -> Option<&ErrorDescription> {
        match &self.detail {
            ErrorDetail::Described(d) => Some(d),
            ErrorDetail::Message(_) => None,
        }
    }
}

// -- Status --

/// Body of `GET /upload/status/{upload_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub upload_id: String,
    pub status: SessionStatus,
    pub chunks_received: u32,
    pub total_chunks: u32,
    #[serde(default)]
    pub progress_percent: u8,
    /// Not every deployment reports it; absent means the default chunk size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

// -- Complete / cancel --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteResponse {
    pub video_id: String,
    pub status: VideoStatus,
    pub duration_seconds: u32,
    pub file_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub message: String,
    pub upload_id: String,
}
