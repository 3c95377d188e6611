//! C1 FileStore: filesystem operations on target files (§4.2).

use std::io::SeekFrom;
use std::path::Path;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::error::{TusError, TusResult};

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

const CHUNK_FLUSH_EVERY: usize = 1;

/// Filesystem operations needed by the append engine. Split out as its own component per
/// the component table, rather than bundled with metadata persistence the way the teacher's
/// combined `DataStore` trait does it.
#[async_trait::async_trait]
pub trait FileStore: Send + Sync {
    /// Creates an empty file. Fails if the file already exists.
    async fn create(&self, path: &str) -> TusResult<()>;

    /// Always issues a fresh stat; never memoized.
    async fn exists(&self, path: &str) -> bool;

    /// Always issues a fresh stat; returns 0 for nonexistent or unreadable files.
    async fn size(&self, path: &str) -> u64;

    /// Idempotent: not an error if the file is already absent.
    async fn delete(&self, path: &str) -> TusResult<()>;

    /// Opens `path` for read+write, seeks to `offset`, and copies `stream` into it in
    /// chunks, flushing after each chunk. If `limit` is `Some`, raises
    /// [`TusError::WriteLimitExceeded`] as soon as bytes transferred so far would exceed it,
    /// without writing the offending chunk. Returns total bytes transferred.
    async fn copy_from_stream(
        &self,
        path: &str,
        offset: u64,
        stream: ByteStream,
        limit: Option<u64>,
    ) -> TusResult<u64>;
}

/// Default [`FileStore`], grounded on the streaming-copy loop in `salvo-tus`'s
/// `DiskStore::write` (open, seek, chunked `stream.next()` / `write_all` / flush).
#[derive(Clone, Default)]
pub struct DiskFileStore;

impl DiskFileStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl FileStore for DiskFileStore {
    async fn create(&self, path: &str) -> TusResult<()> {
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| TusError::Runtime(e.to_string()))?;
        }
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| TusError::Runtime(e.to_string()))?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        fs::metadata(path).await.is_ok()
    }

    async fn size(&self, path: &str) -> u64 {
        fs::metadata(path).await.map(|m| m.len()).unwrap_or(0)
    }

    async fn delete(&self, path: &str) -> TusResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::warn!("delete failed: path={path}, error={e}");
                Err(TusError::Runtime(e.to_string()))
            }
        }
    }

    async fn copy_from_stream(
        &self,
        path: &str,
        offset: u64,
        mut stream: ByteStream,
        limit: Option<u64>,
    ) -> TusResult<u64> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .open(path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => TusError::NotFound,
                _ => TusError::Runtime(e.to_string()),
            })?;

        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| TusError::Runtime(e.to_string()))?;

        let mut written: u64 = 0;
        let mut since_flush = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TusError::Runtime(e.to_string()))?;
            if let Some(limit) = limit
                && written + chunk.len() as u64 > limit
            {
                return Err(TusError::WriteLimitExceeded);
            }
            file.write_all(&chunk).await.map_err(|e| TusError::Runtime(e.to_string()))?;
            written += chunk.len() as u64;
            since_flush += 1;
            if since_flush >= CHUNK_FLUSH_EVERY {
                file.flush().await.map_err(|e| TusError::Runtime(e.to_string()))?;
                since_flush = 0;
            }
        }
        file.flush().await.map_err(|e| TusError::Runtime(e.to_string()))?;

        Ok(written)
    }
}
