use bytes::Bytes;
use reelup_types::api::{
    CancelResponse, ChunkResponse, CompleteResponse, ErrorBody, InitiateRequest, InitiateResponse, StatusResponse,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::UploadError;
use crate::config::ClientConfig;
use crate::error::RequestFailure;
use crate::transport::{ChunkOutcome, Credential, Transport};

/// Which remote operation a response belongs to. Decides the fallback
/// message and the error variant of a failure.
#[derive(Debug, Clone, Copy)]
enum Op {
    Initiate,
    Chunk(u32),
    Status,
    Chunks,
    Complete,
    Cancel,
}

impl Op {
    fn fallback(self) -> &'static str {
        match self {
            Op::Initiate => "Failed to initiate upload",
            Op::Chunk(_) => "Failed to upload chunk",
            Op::Status => "Failed to get upload status",
            Op::Chunks => "Failed to get received chunks",
            Op::Complete => "Failed to complete upload",
            Op::Cancel => "Failed to cancel upload",
        }
    }

    fn fail(self, failure: RequestFailure) -> UploadError {
        if failure.status == Some(StatusCode::UNAUTHORIZED.as_u16()) {
            return UploadError::Unauthorized(failure);
        }
        match self {
            Op::Initiate => UploadError::InitiateFailed(failure),
            Op::Chunk(index) => UploadError::ChunkFailed { index, failure },
            Op::Status => UploadError::StatusFailed(failure),
            Op::Chunks => UploadError::ChunksFailed(failure),
            Op::Complete => UploadError::CompleteFailed(failure),
            Op::Cancel => UploadError::CancelFailed(failure),
        }
    }
}

/// `Transport` over the upload HTTP API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    credential: Credential,
}

impl HttpTransport {
    /// Builds a client bounded by the configured request and connect timeouts.
    pub fn new(config: &ClientConfig, credential: Credential) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self::with_client(client, config, credential))
    }

    pub fn with_client(client: Client, config: &ClientConfig, credential: Credential) -> Self {
        Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            credential,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, op: Op) -> Result<Response, UploadError> {
        request
            .bearer_auth(self.credential.token())
            .send()
            .await
            .map_err(|e| op.fail(RequestFailure::new(describe_send_error(op, &e), None)))
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder, op: Op) -> Result<T, UploadError> {
        let resp = self.send(request, op).await?;
        if !resp.status().is_success() {
            return Err(failure_from(resp, op).await);
        }
        decode(resp, op).await
    }
}

impl Transport for HttpTransport {
    async fn initiate(&self, request: &InitiateRequest) -> Result<InitiateResponse, UploadError> {
        let req = self.client.post(self.url("/upload/initiate")).json(request);
        self.call(req, Op::Initiate).await
    }

    async fn upload_chunk(&self, session_id: &str, index: u32, data: Bytes) -> Result<ChunkOutcome, UploadError> {
        let op = Op::Chunk(index);
        let req = self
            .client
            .put(self.url(&format!("/upload/chunk/{session_id}/{index}")))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data);
        let resp = self.send(req, op).await?;

        if resp.status() == StatusCode::CONFLICT {
            // Already stored: the body may carry the original byte count.
            let body = resp.bytes().await.unwrap_or_default();
            let bytes_received = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.description().and_then(|d| d.received_bytes));
            return Ok(ChunkOutcome::AlreadyPresent { index, bytes_received });
        }
        if !resp.status().is_success() {
            return Err(failure_from(resp, op).await);
        }

        let body: ChunkResponse = decode(resp, op).await?;
        if body.chunk_number != index {
            tracing::warn!(
                session_id,
                chunk = index,
                reported = body.chunk_number,
                "server acknowledged a different chunk number"
            );
        }
        Ok(ChunkOutcome::Stored {
            index,
            bytes_received: body.received_bytes,
            total_bytes_received: body.total_received,
            percent: body.progress_percent,
        })
    }

    async fn get_status(&self, session_id: &str) -> Result<StatusResponse, UploadError> {
        let req = self.client.get(self.url(&format!("/upload/status/{session_id}")));
        self.call(req, Op::Status).await
    }

    async fn list_received_chunks(&self, session_id: &str) -> Result<Vec<u32>, UploadError> {
        let req = self.client.get(self.url(&format!("/upload/chunks/{session_id}")));
        self.call(req, Op::Chunks).await
    }

    async fn complete(&self, session_id: &str) -> Result<CompleteResponse, UploadError> {
        let req = self.client.post(self.url(&format!("/upload/complete/{session_id}")));
        self.call(req, Op::Complete).await
    }

    async fn cancel(&self, session_id: &str) -> Result<CancelResponse, UploadError> {
        let req = self.client.delete(self.url(&format!("/upload/{session_id}")));
        self.call(req, Op::Cancel).await
    }
}

/// Text of an error body, if it has the `{"detail": ...}` shape.
pub fn error_message(body: &[u8]) -> Option<String> {
    let body: ErrorBody = serde_json::from_slice(body).ok()?;
    body.text().map(str::to_string)
}

async fn failure_from(resp: Response, op: Op) -> UploadError {
    let status = resp.status().as_u16();
    let body = resp.bytes().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| op.fallback().to_string());
    op.fail(RequestFailure::new(message, Some(status)))
}

async fn decode<T: DeserializeOwned>(resp: Response, op: Op) -> Result<T, UploadError> {
    let status = resp.status().as_u16();
    resp.json::<T>().await.map_err(|e| {
        op.fail(RequestFailure::new(
            format!("{}: unexpected response body: {e}", op.fallback()),
            Some(status),
        ))
    })
}

fn describe_send_error(op: Op, e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("{}: request timed out", op.fallback())
    } else if e.is_connect() {
        format!("{}: connection failed: {e}", op.fallback())
    } else {
        format!("{}: {e}", op.fallback())
    }
}
