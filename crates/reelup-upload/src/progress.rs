use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::chunk::ChunkLayout;
use crate::chunk_set::ChunkSet;

/// Snapshot delivered after every confirmed chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    pub percent: u8,
    pub bytes_uploaded: u64,
    pub total_bytes: u64,
    pub chunks_uploaded: u32,
    pub total_chunks: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining_seconds: Option<u64>,
}

impl fmt::Display for UploadProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}% chunks={}/{} bytes={}/{}",
            self.percent, self.chunks_uploaded, self.total_chunks, self.bytes_uploaded, self.total_bytes
        )?;
        if let Some(eta) = self.estimated_time_remaining_seconds {
            write!(f, " eta={}s", eta)?;
        }
        Ok(())
    }
}

/// Progress for `confirmed` chunks of `layout`, `elapsed` after the
/// session started.
///
/// Throughput is `bytes_uploaded / elapsed`; the estimate is omitted until
/// both are non-zero.
pub fn compute_progress(layout: &ChunkLayout, confirmed: &ChunkSet, elapsed: Duration) -> UploadProgress {
    let total = layout.total_chunks();
    let done = confirmed.len();
    let percent = if total == 0 {
        100
    } else {
        // round(100 * done / total) in integers
        ((200 * done as u64 + total as u64) / (2 * total as u64)).min(100) as u8
    };

    let bytes = layout.bytes_for(confirmed);
    let remaining = layout.file_size().saturating_sub(bytes);
    let secs = elapsed.as_secs_f64();
    let eta = (secs > 0.0 && bytes > 0).then(|| {
        let throughput = bytes as f64 / secs;
        (remaining as f64 / throughput).round() as u64
    });

    UploadProgress {
        percent,
        bytes_uploaded: bytes,
        total_bytes: layout.file_size(),
        chunks_uploaded: done,
        total_chunks: total,
        estimated_time_remaining_seconds: eta,
    }
}

/// Receives progress updates from an upload loop.
///
/// Called on the loop's task between chunks, so implementations should
/// return quickly.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: &UploadProgress);
}

impl<F> ProgressReporter for F
where
    F: Fn(&UploadProgress) + Send + Sync,
{
    fn report(&self, progress: &UploadProgress) {
        self(progress)
    }
}

/// Reporter that emits a `tracing` event per update.
pub struct TracingReporter;

impl ProgressReporter for TracingReporter {
    fn report(&self, progress: &UploadProgress) {
        tracing::info!(
            percent = progress.percent,
            chunks = progress.chunks_uploaded,
            total_chunks = progress.total_chunks,
            "upload progress {}",
            progress,
        );
    }
}

/// Discards all updates.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn report(&self, _progress: &UploadProgress) {}
}

/// Forwards updates into a channel. A closed receiver is ignored.
#[derive(Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<UploadProgress>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UploadProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, progress: &UploadProgress) {
        let _ = self.tx.send(progress.clone());
    }
}
