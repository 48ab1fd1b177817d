use std::future::Future;
use std::io;
use std::ops::Range;
use std::path::Path;

use bytes::Bytes;
use reelup_types::VideoContainer;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::UploadError;
use crate::chunk_set::ChunkSet;

/// Declared type for files whose extension is not a known video container.
pub const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

// ── Layout ──────────────────────────────────────────────────────────────

/// Fixed chunk geometry of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    file_size: u64,
    chunk_size: u64,
    total_chunks: u32,
}

impl ChunkLayout {
    /// `None` if `chunk_size` is zero or the file would need more than
    /// `u32::MAX` chunks.
    pub fn new(file_size: u64, chunk_size: u64) -> Option<Self> {
        if chunk_size == 0 {
            return None;
        }
        let total_chunks = u32::try_from(file_size.div_ceil(chunk_size)).ok()?;
        Some(Self {
            file_size,
            chunk_size,
            total_chunks,
        })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    /// Byte range `[i*chunk_size, min((i+1)*chunk_size, file_size))`.
    /// Empty for indices past the end.
    pub fn range(&self, index: u32) -> Range<u64> {
        let start = (index as u64 * self.chunk_size).min(self.file_size);
        let end = (start + self.chunk_size).min(self.file_size);
        start..end
    }

    /// Length of chunk `index`; only the final chunk may be short.
    pub fn chunk_len(&self, index: u32) -> u64 {
        let r = self.range(index);
        r.end - r.start
    }

    /// Bytes covered by the confirmed chunks, counting the final chunk at
    /// its real length.
    pub fn bytes_for(&self, confirmed: &ChunkSet) -> u64 {
        let full = confirmed.len() as u64 * self.chunk_size;
        let last = self.total_chunks.checked_sub(1);
        match last {
            Some(last) if confirmed.contains(last) => {
                full - (self.chunk_size - self.chunk_len(last))
            }
            _ => full,
        }
        .min(self.file_size)
    }

    /// Reads exactly the bytes of chunk `index` from `source`.
    ///
    /// Any read failure, including a short read from a file that shrank,
    /// is `SourceUnavailable`: the session cannot continue on that source.
    pub async fn read_chunk<S: ByteSource>(
        &self,
        source: &mut S,
        index: u32,
    ) -> Result<Bytes, UploadError> {
        let range = self.range(index);
        let len = (range.end - range.start) as usize;
        let data = source.read_range(range.start, len).await.map_err(|e| {
            UploadError::SourceUnavailable(format!(
                "cannot read chunk {index} at offset {}: {e}",
                range.start
            ))
        })?;
        if data.len() != len {
            return Err(UploadError::SourceUnavailable(format!(
                "chunk {index}: expected {len} bytes, read {}",
                data.len()
            )));
        }
        Ok(data)
    }
}

// ── Sources ─────────────────────────────────────────────────────────────

/// Byte-addressable, read-only file content.
///
/// Reads take `&mut self`: one session reads its source sequentially and
/// never slices it concurrently.
pub trait ByteSource: Send {
    /// Total size in bytes, fixed for the lifetime of the source.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read exactly `len` bytes starting at `offset`.
    fn read_range(
        &mut self,
        offset: u64,
        len: usize,
    ) -> impl Future<Output = io::Result<Bytes>> + Send;
}

/// A file on disk, read through one tokio handle.
pub struct FileSource {
    file: tokio::fs::File,
    len: u64,
}

impl FileSource {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = tokio::fs::File::open(path.as_ref()).await?;
        let len = file.metadata().await?.len();
        Ok(Self { file, len })
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    async fn read_range(&mut self, offset: u64, len: usize) -> io::Result<Bytes> {
        self.file.seek(io::SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

/// In-memory content.
#[derive(Debug, Clone)]
pub struct MemorySource(Bytes);

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.0.len() as u64
    }

    async fn read_range(&mut self, offset: u64, len: usize) -> io::Result<Bytes> {
        let start = usize::try_from(offset).map_err(|_| io::ErrorKind::InvalidInput)?;
        let end = start.checked_add(len).ok_or(io::ErrorKind::InvalidInput)?;
        if end > self.0.len() {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(self.0.slice(start..end))
    }
}

// ── Upload file ─────────────────────────────────────────────────────────

/// A source plus the metadata sent on initiation.
pub struct UploadFile<S> {
    pub name: String,
    pub content_type: String,
    pub source: S,
}

impl<S: ByteSource> UploadFile<S> {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, source: S) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            source,
        }
    }

    pub fn size(&self) -> u64 {
        self.source.len()
    }
}

impl UploadFile<FileSource> {
    /// Open a file on disk, deriving the declared content type from the
    /// extension.
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let source = FileSource::open(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".into());
        Ok(Self::new(name, content_type_for(path), source))
    }
}

/// MIME type implied by a path's extension.
pub fn content_type_for(path: &Path) -> &'static str {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(VideoContainer::from_extension)
        .map(VideoContainer::mime)
        .unwrap_or(UNKNOWN_CONTENT_TYPE)
}
