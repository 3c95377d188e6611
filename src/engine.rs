//! Framework-agnostic core of C7 ProtocolHandler: the append engine and upload lifecycle.
//!
//! Everything here takes and returns plain Rust values (parsed header values, a byte
//! stream, an [`UploadRecord`]) rather than `salvo_core` HTTP types, so the protocol
//! invariants in this module can be unit-tested directly. The `#[handler]` functions in
//! `handlers/` are thin translation shims between this engine and `salvo_core::Request`
//! / `Response`.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::error::{TusError, TusResult};
use crate::events::{EventBus, TusEvent};
use crate::file_store::{ByteStream, FileStore};
use crate::location::LocationProvider;
use crate::locker::Locker;
use crate::record::{MetadataStore, Ttl, UploadRecord};
use crate::target_path::TargetPathFactory;

/// Result of creating a new upload resource (§4.1.3).
pub struct CreateOutcome {
    pub id: String,
    pub record: UploadRecord,
}

/// Result of a successful append (§4.1.4).
pub struct AppendOutcome {
    pub new_offset: u64,
    pub deferred: bool,
    pub completed: bool,
    pub record: UploadRecord,
}

/// Result of a HEAD/status query (§4.1.2).
pub struct StatusOutcome {
    pub offset: u64,
    pub record: UploadRecord,
}

pub struct TusEngine {
    pub max_size: u64,
    pub use_intermediate_chunk: bool,
    pub chunk_directory: std::path::PathBuf,
    pub storage_ttl_after_upload_complete: Ttl,
    pub file_store: Arc<dyn FileStore>,
    pub metadata_store: Arc<dyn MetadataStore>,
    pub target_path_factory: Arc<dyn TargetPathFactory>,
    pub locker: Arc<dyn Locker>,
    pub event_bus: Arc<dyn EventBus>,
}

impl TusEngine {
    /// §4.1.3. `id` lets creation-with-upload reuse the identifier minted here for the
    /// immediate PATCH delegation.
    pub async fn create(&self, length: u64, defer: bool, metadata: HashMap<String, String>) -> TusResult<CreateOutcome> {
        if !defer && length > self.max_size {
            return Err(TusError::MaxSizeExceeded);
        }

        let id = Uuid::new_v4().simple().to_string();
        let file = self.target_path_factory.target_path(&id, &metadata);
        let record =
            if defer { UploadRecord::new_deferred(file, metadata) } else { UploadRecord::new_fixed(file, length, metadata) };

        self.metadata_store.set(&id, record.clone(), Ttl::Default).await;

        if let Err(e) = self.file_store.create(&record.file).await {
            self.metadata_store.delete(&id).await;
            return Err(e);
        }

        Ok(CreateOutcome { id, record })
    }

    /// §4.1.2. Re-instantiates the file; if it no longer exists the record is deleted.
    pub async fn status(&self, id: &str) -> TusResult<StatusOutcome> {
        let _guard = self.locker.read_lock(id).await;
        let record = self.metadata_store.get(id).await.ok_or(TusError::NotFound)?;
        if !self.file_store.exists(&record.file).await {
            self.metadata_store.delete(id).await;
            return Err(TusError::NotFound);
        }
        let offset = self.file_store.size(&record.file).await;
        Ok(StatusOutcome { offset, record })
    }

    /// §4.1.5. Resolves and validates the record a GET should serve; the handler reads the
    /// file's bytes itself since raw reads sit outside the [`FileStore`] contract.
    pub async fn prepare_download(&self, id: &str) -> TusResult<UploadRecord> {
        let _guard = self.locker.read_lock(id).await;
        let record = self.metadata_store.get(id).await.ok_or(TusError::NotFound)?;
        if !self.file_store.exists(&record.file).await {
            self.metadata_store.delete(id).await;
            return Err(TusError::NotFound);
        }
        Ok(record)
    }

    /// §4.1.4, the append engine. `upload_length` is the `Upload-Length` header on this
    /// PATCH, used only for the one-shot deferred fix-up.
    pub async fn append(
        &self,
        id: &str,
        offset: u64,
        upload_length: Option<u64>,
        stream: ByteStream,
    ) -> TusResult<AppendOutcome> {
        let _guard = self.locker.write_lock(id).await;

        let mut record = self.metadata_store.get(id).await.ok_or(TusError::NotFound)?;
        if !self.file_store.exists(&record.file).await {
            self.metadata_store.delete(id).await;
            return Err(TusError::NotFound);
        }

        // Completion is terminal (§8.3): checked explicitly, rather than relying on the
        // offset gate below, since a client that happens to resend the final offset would
        // otherwise slip past it and re-trigger the write-limit/completion bookkeeping.
        if record.complete {
            return Err(TusError::AlreadyComplete);
        }

        if record.defer
            && let Some(length) = upload_length
            && length > 0
        {
            if length > self.max_size {
                return Err(TusError::MaxSizeExceeded);
            }
            record.defer = false;
            record.length = length;
            self.metadata_store.set(id, record.clone(), Ttl::Default).await;
        }

        let current_size = self.file_store.size(&record.file).await;
        if offset != current_size {
            tracing::info!("offset mismatch for {id}: client sent {offset}, file is at {current_size}");
            return Err(TusError::OffsetMismatch { expected: current_size, got: offset });
        }

        let write_limit = if record.defer { self.max_size - offset } else { record.length - offset };

        let written = if self.use_intermediate_chunk {
            self.append_via_intermediate_chunk(&record.file, offset, stream, write_limit).await
        } else {
            self.file_store.copy_from_stream(&record.file, offset, stream, Some(write_limit)).await
        };

        let written = match written {
            Ok(w) => w,
            Err(e @ TusError::WriteLimitExceeded) => {
                tracing::warn!("write for {id} would exceed the configured size limit, discarding upload");
                self.file_store.delete(&record.file).await.ok();
                self.metadata_store.delete(id).await;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let new_size = self.file_store.size(&record.file).await;

        if record.defer {
            if offset + written > self.max_size {
                self.file_store.delete(&record.file).await.ok();
                self.metadata_store.delete(id).await;
                return Err(TusError::WriteLimitExceeded);
            }
        } else if offset + written != new_size {
            self.file_store.delete(&record.file).await.ok();
            self.metadata_store.delete(id).await;
            return Err(TusError::OffsetMismatch { expected: offset + written, got: new_size });
        }

        let mut completed = false;
        if !record.defer && new_size == record.length {
            record.complete = true;
            completed = true;
            self.metadata_store.set(id, record.clone(), self.storage_ttl_after_upload_complete).await;
            self.event_bus.publish(TusEvent::UploadComplete {
                id: id.to_string(),
                file: record.file.clone(),
                metadata: record.metadata.clone(),
            });
        } else {
            self.metadata_store.set(id, record.clone(), Ttl::Default).await;
        }

        Ok(AppendOutcome { new_offset: new_size, deferred: record.defer, completed, record })
    }

    /// Two-phase staging (§4.1.4, optional): copy into a unique temp file first, then copy
    /// that file into the target at `offset`. Kept as genuine staging rather than a
    /// no-op passthrough per the design note in §9 -- it reuses the same `copy_from_stream`
    /// machinery for both the stage and the commit.
    async fn append_via_intermediate_chunk(
        &self,
        target_file: &str,
        offset: u64,
        stream: ByteStream,
        limit: u64,
    ) -> TusResult<u64> {
        let chunk_path =
            self.chunk_directory.join(format!("tus-chunk-{}.tmp", Uuid::new_v4().simple())).to_string_lossy().into_owned();

        self.file_store.create(&chunk_path).await?;
        let staged = self.file_store.copy_from_stream(&chunk_path, 0, stream, Some(limit)).await;

        let staged = match staged {
            Ok(n) => n,
            Err(e) => {
                self.file_store.delete(&chunk_path).await.ok();
                return Err(e);
            }
        };

        let chunk_stream = open_as_byte_stream(&chunk_path).await?;
        let commit_result = self.file_store.copy_from_stream(target_file, offset, chunk_stream, Some(staged)).await;
        self.file_store.delete(&chunk_path).await.ok();

        match commit_result {
            Ok(committed) if committed == staged => Ok(committed),
            Ok(committed) => Err(TusError::Runtime(format!(
                "intermediate chunk commit mismatch: staged {staged} bytes, committed {committed}"
            ))),
            Err(e) => Err(e),
        }
    }

    /// §4.1.3 event: dispatched once at the end of a pure-create POST.
    pub fn notify_upload_started(&self, id: &str, record: &UploadRecord) {
        self.event_bus.publish(TusEvent::UploadStarted {
            id: id.to_string(),
            file: record.file.clone(),
            metadata: record.metadata.clone(),
        });
    }
}

/// Opens `path` as a streamed byte source. Shared by the intermediate-chunk commit step
/// and by the GET handler, which streams the served file rather than buffering it.
pub(crate) async fn open_as_byte_stream(path: &str) -> TusResult<ByteStream> {
    let file = tokio::fs::File::open(path).await.map_err(|e| TusError::Runtime(e.to_string()))?;
    let stream = ReaderStream::new(file).map(|r| r.map(Bytes::from));
    Ok(Box::pin(stream))
}
