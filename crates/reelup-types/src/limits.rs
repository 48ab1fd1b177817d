/// Upload limits shared with the server.
///
/// The server enforces the same values on `POST /upload/initiate`; the
/// client checks them first so a doomed upload never touches the network.

/// Bytes per MiB.
pub const MIB: u64 = 1024 * 1024;

/// Maximum accepted file size: 500 MiB (inclusive).
pub const MAX_FILE_SIZE: u64 = 500 * MIB;

/// Minimum accepted video duration in seconds (inclusive).
pub const MIN_DURATION_SECONDS: u32 = 60;

/// Maximum accepted video duration in seconds (inclusive).
pub const MAX_DURATION_SECONDS: u32 = 180;

/// Chunk size used by the reference deployment: 5 MiB.
///
/// The server assigns the real value at initiation; this is only the
/// fallback when a resumed session does not report one.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * MIB;

/// MIME types accepted for upload.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["video/mp4", "video/quicktime", "video/webm"];
