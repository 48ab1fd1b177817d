//! `HttpTransport` against an in-process axum server that speaks the
//! upload API.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;

use reelup_types::api::{
    CancelResponse, ChunkResponse, CompleteResponse, InitiateRequest, InitiateResponse, StatusResponse,
};
use reelup_types::{SessionStatus, VideoStatus};
use reelup_upload::{
    CancellationToken, ChunkOutcome, ClientConfig, Credential, HttpTransport, MemorySource, NullReporter,
    RetryPolicy, SessionInvalidReason, Transport, UploadError, UploadFile, UploadOutcome, Uploader,
};

const TOKEN: &str = "good-token";
const CHUNK_SIZE: u64 = 5;

// ── Mock server ─────────────────────────────────────────────────────────

struct Session {
    file_size: u64,
    total_chunks: u32,
    duration_seconds: u32,
    status: SessionStatus,
    chunks: BTreeMap<u32, Vec<u8>>,
    /// Every PUT that reached the handler, in order.
    puts: Vec<u32>,
    assembled: Option<Vec<u8>>,
}

#[derive(Default)]
struct Server {
    sessions: HashMap<String, Session>,
    /// Number of upcoming chunk PUTs that fail with 500.
    fail_chunks: u32,
}

type Shared = Arc<Mutex<Server>>;

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn authorized(headers: &HeaderMap) -> Result<(), Response> {
    let expected = format!("Bearer {TOKEN}");
    match headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(v) if v == expected => Ok(()),
        _ => Err(detail(StatusCode::UNAUTHORIZED, "Invalid authentication credentials")),
    }
}

async fn initiate(State(state): State<Shared>, headers: HeaderMap, Json(req): Json<InitiateRequest>) -> Response {
    if let Err(resp) = authorized(&headers) {
        return resp;
    }
    let upload_id = uuid::Uuid::new_v4().to_string();
    let total_chunks = req.file_size.div_ceil(CHUNK_SIZE) as u32;
    state.lock().unwrap().sessions.insert(
        upload_id.clone(),
        Session {
            file_size: req.file_size,
            total_chunks,
            duration_seconds: req.duration_seconds,
            status: SessionStatus::Active,
            chunks: BTreeMap::new(),
            puts: Vec::new(),
            assembled: None,
        },
    );
    Json(InitiateResponse {
        upload_id,
        chunk_size: CHUNK_SIZE,
        total_chunks,
        expires_at: Utc::now(),
    })
    .into_response()
}

async fn upload_chunk(
    State(state): State<Shared>,
    Path((id, index)): Path<(String, u32)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(resp) = authorized(&headers) {
        return resp;
    }
    let mut server = state.lock().unwrap();
    if server.fail_chunks > 0 {
        server.fail_chunks -= 1;
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "disk full");
    }
    let Some(session) = server.sessions.get_mut(&id) else {
        return detail(StatusCode::NOT_FOUND, "Upload session not found");
    };
    session.puts.push(index);
    if let Some(existing) = session.chunks.get(&index) {
        return (
            StatusCode::CONFLICT,
            Json(json!({
                "detail": {
                    "error": "chunk_exists",
                    "error_description": format!("Chunk {index} already uploaded"),
                    "chunk_number": index,
                    "received_bytes": existing.len(),
                }
            })),
        )
            .into_response();
    }
    let received_bytes = body.len() as u64;
    session.chunks.insert(index, body.to_vec());
    let total_received: u64 = session.chunks.values().map(|c| c.len() as u64).sum();
    let progress_percent = (session.chunks.len() as u32 * 100 / session.total_chunks) as u8;
    Json(ChunkResponse {
        chunk_number: index,
        received_bytes,
        total_received,
        progress_percent,
    })
    .into_response()
}

async fn status(State(state): State<Shared>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    if let Err(resp) = authorized(&headers) {
        return resp;
    }
    let server = state.lock().unwrap();
    let Some(session) = server.sessions.get(&id) else {
        return detail(StatusCode::NOT_FOUND, "Upload session not found");
    };
    Json(StatusResponse {
        upload_id: id.clone(),
        status: session.status,
        chunks_received: session.chunks.len() as u32,
        total_chunks: session.total_chunks,
        progress_percent: 0,
        chunk_size: Some(CHUNK_SIZE),
        expires_at: Some(Utc::now()),
    })
    .into_response()
}

async fn received_chunks(State(state): State<Shared>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    if let Err(resp) = authorized(&headers) {
        return resp;
    }
    let server = state.lock().unwrap();
    let Some(session) = server.sessions.get(&id) else {
        return detail(StatusCode::NOT_FOUND, "Upload session not found");
    };
    Json(session.chunks.keys().copied().collect::<Vec<u32>>()).into_response()
}

async fn complete(State(state): State<Shared>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    if let Err(resp) = authorized(&headers) {
        return resp;
    }
    let mut server = state.lock().unwrap();
    let Some(session) = server.sessions.get_mut(&id) else {
        return detail(StatusCode::NOT_FOUND, "Upload session not found");
    };
    let missing: Vec<u32> = (0..session.total_chunks).filter(|i| !session.chunks.contains_key(i)).collect();
    if !missing.is_empty() {
        return detail(StatusCode::BAD_REQUEST, &format!("Missing chunks: {missing:?}"));
    }
    session.assembled = Some(session.chunks.values().flatten().copied().collect());
    session.status = SessionStatus::Completed;
    Json(CompleteResponse {
        video_id: format!("video-{id}"),
        status: VideoStatus::ProcessingThumbnails,
        duration_seconds: session.duration_seconds,
        file_size: session.file_size,
    })
    .into_response()
}

async fn cancel(State(state): State<Shared>, Path(id): Path<String>, headers: HeaderMap) -> Response {
    if let Err(resp) = authorized(&headers) {
        return resp;
    }
    let mut server = state.lock().unwrap();
    let Some(session) = server.sessions.get_mut(&id) else {
        return detail(StatusCode::NOT_FOUND, "Upload session not found");
    };
    session.status = SessionStatus::Cancelled;
    Json(CancelResponse {
        message: "Upload cancelled successfully".into(),
        upload_id: id,
    })
    .into_response()
}

async fn spawn_server() -> (SocketAddr, Shared) {
    let state: Shared = Arc::default();
    let app = Router::new()
        .route("/api/v1/upload/initiate", post(initiate))
        .route("/api/v1/upload/chunk/{id}/{index}", put(upload_chunk))
        .route("/api/v1/upload/status/{id}", get(status))
        .route("/api/v1/upload/chunks/{id}", get(received_chunks))
        .route("/api/v1/upload/complete/{id}", post(complete))
        .route("/api/v1/upload/{id}", delete(cancel))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn config(addr: SocketAddr) -> ClientConfig {
    let mut config = ClientConfig::new(format!("http://{addr}/api/v1"));
    config.request_timeout = Duration::from_secs(5);
    config.retry = RetryPolicy {
        max_attempts: 3,
        backoff_step: Duration::from_millis(1),
    };
    config
}

fn transport(addr: SocketAddr, token: &str) -> HttpTransport {
    HttpTransport::new(&config(addr), Credential::new(token)).unwrap()
}

fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}

fn video(data: &[u8]) -> UploadFile<MemorySource> {
    UploadFile::new("deadlift.mp4", "video/mp4", MemorySource::new(data.to_vec()))
}

fn initiate_request(size: u64) -> InitiateRequest {
    InitiateRequest {
        filename: "deadlift.mp4".into(),
        file_size: size,
        content_type: "video/mp4".into(),
        duration_seconds: 95,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn uploads_and_assembles_file() {
    let (addr, state) = spawn_server().await;
    let data = sample(12);

    let outcome = reelup_upload::upload(
        &config(addr),
        Credential::new(TOKEN),
        video(&data),
        95,
        &NullReporter,
        &CancellationToken::new(),
        None,
    )
    .await
    .unwrap();

    let UploadOutcome::Completed(done) = outcome else {
        panic!("upload did not complete");
    };
    assert_eq!(done.status, VideoStatus::ProcessingThumbnails);
    assert_eq!(done.file_size, 12);
    assert_eq!(done.duration_seconds, 95);

    let server = state.lock().unwrap();
    let session = &server.sessions[&done.session_id];
    assert_eq!(session.puts, vec![0, 1, 2]);
    assert_eq!(session.assembled.as_deref(), Some(&data[..]));
}

#[tokio::test]
async fn resume_sends_only_missing_chunks() {
    let (addr, state) = spawn_server().await;
    let data = sample(23);
    let transport = transport(addr, TOKEN);

    let init = transport.initiate(&initiate_request(23)).await.unwrap();
    assert_eq!(init.total_chunks, 5);
    for index in [0u32, 2] {
        let start = index as usize * CHUNK_SIZE as usize;
        let chunk = Bytes::copy_from_slice(&data[start..start + CHUNK_SIZE as usize]);
        transport.upload_chunk(&init.upload_id, index, chunk).await.unwrap();
    }

    let uploader = Uploader::from_config(transport, &config(addr));
    let outcome = uploader
        .upload(video(&data), 95, &NullReporter, &CancellationToken::new(), Some(&init.upload_id))
        .await
        .unwrap();
    assert!(matches!(outcome, UploadOutcome::Completed(_)));

    let server = state.lock().unwrap();
    let session = &server.sessions[&init.upload_id];
    assert_eq!(session.puts, vec![0, 2, 1, 3, 4]);
    assert_eq!(session.assembled.as_deref(), Some(&data[..]));
}

#[tokio::test]
async fn conflict_is_already_present() {
    let (addr, _state) = spawn_server().await;
    let transport = transport(addr, TOKEN);
    let init = transport.initiate(&initiate_request(10)).await.unwrap();

    let first = transport
        .upload_chunk(&init.upload_id, 0, Bytes::from_static(b"01234"))
        .await
        .unwrap();
    assert_eq!(
        first,
        ChunkOutcome::Stored {
            index: 0,
            bytes_received: 5,
            total_bytes_received: 5,
            percent: 50,
        }
    );

    let again = transport
        .upload_chunk(&init.upload_id, 0, Bytes::from_static(b"01234"))
        .await
        .unwrap();
    assert_eq!(again, ChunkOutcome::AlreadyPresent { index: 0, bytes_received: Some(5) });
}

#[tokio::test]
async fn bad_token_is_unauthorized() {
    let (addr, _state) = spawn_server().await;
    let transport = transport(addr, "stale-token");

    let err = transport.initiate(&initiate_request(10)).await.unwrap_err();
    assert_eq!(err.code(), "UNAUTHORIZED");
    assert_eq!(err.http_status(), Some(401));
    assert!(err.to_string().contains("Invalid authentication credentials"));

    let err = transport
        .upload_chunk("any", 0, Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::Unauthorized(_)));
}

#[tokio::test]
async fn transient_server_errors_are_retried() {
    let (addr, state) = spawn_server().await;
    state.lock().unwrap().fail_chunks = 2;
    let data = sample(10);

    let outcome = reelup_upload::upload(
        &config(addr),
        Credential::new(TOKEN),
        video(&data),
        95,
        &NullReporter,
        &CancellationToken::new(),
        None,
    )
    .await
    .unwrap();
    let UploadOutcome::Completed(done) = outcome else {
        panic!("upload did not complete");
    };
    assert_eq!(state.lock().unwrap().sessions[&done.session_id].puts, vec![0, 1]);
}

#[tokio::test]
async fn persistent_server_errors_fail_the_chunk() {
    let (addr, state) = spawn_server().await;
    state.lock().unwrap().fail_chunks = 3;

    let err = reelup_upload::upload(
        &config(addr),
        Credential::new(TOKEN),
        video(&sample(10)),
        95,
        &NullReporter,
        &CancellationToken::new(),
        None,
    )
    .await
    .unwrap_err();

    match err {
        UploadError::ChunkFailed { index, failure } => {
            assert_eq!(index, 0);
            assert_eq!(failure.message, "disk full");
            assert_eq!(failure.status, Some(500));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unknown_session_status_fails() {
    let (addr, _state) = spawn_server().await;
    let err = transport(addr, TOKEN).get_status("missing").await.unwrap_err();
    assert_eq!(err.code(), "STATUS_FAILED");
    assert_eq!(err.http_status(), Some(404));
    assert!(err.to_string().contains("Upload session not found"));
}

#[tokio::test]
async fn complete_with_missing_chunks_fails() {
    let (addr, _state) = spawn_server().await;
    let transport = transport(addr, TOKEN);
    let init = transport.initiate(&initiate_request(10)).await.unwrap();

    let err = transport.complete(&init.upload_id).await.unwrap_err();
    assert_eq!(err.code(), "COMPLETE_FAILED");
    assert!(err.to_string().contains("Missing chunks: [0, 1]"));
}

#[tokio::test]
async fn cancelled_session_cannot_resume() {
    let (addr, _state) = spawn_server().await;
    let transport = transport(addr, TOKEN);
    let init = transport.initiate(&initiate_request(10)).await.unwrap();

    let ack = transport.cancel(&init.upload_id).await.unwrap();
    assert_eq!(ack.upload_id, init.upload_id);

    let uploader = Uploader::from_config(transport, &config(addr));
    let err = uploader
        .upload(video(&sample(10)), 95, &NullReporter, &CancellationToken::new(), Some(&init.upload_id))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        UploadError::SessionInvalid {
            reason: SessionInvalidReason::NotActive(SessionStatus::Cancelled),
            ..
        }
    ));
}

#[tokio::test]
async fn unreachable_server_fails_without_status() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let err = transport(addr, TOKEN).initiate(&initiate_request(10)).await.unwrap_err();
    assert_eq!(err.code(), "INITIATE_FAILED");
    assert_eq!(err.http_status(), None);
}
