//! Configuration surface (§6.3), mirroring `salvo-tus`'s builder-style `TusOptions`.

use std::path::PathBuf;
use std::sync::Arc;

use crate::events::{BroadcastEventBus, EventBus};
use crate::file_store::{DiskFileStore, FileStore};
use crate::location::{LocationProvider, PathSegmentLocationProvider};
use crate::locker::{Locker, MemoryLocker};
use crate::record::{MemoryMetadataStore, MetadataStore, Ttl};
use crate::target_path::{DirectoryTargetPathFactory, TargetPathFactory};

pub const DEFAULT_MAX_SIZE: u64 = 1024 * 1024 * 1024;

/// Every option in §6.3, plus the injectable component trait objects.
#[derive(Clone)]
pub struct TusOptions {
    /// The route to accept requests on.
    pub path: String,

    /// Advertised ceiling and enforcement limit on `Upload-Length`.
    pub max_size: u64,

    /// Return a relative URL as the `Location` header.
    pub relative_location: bool,

    /// Enables the non-protocol `GET` download facility.
    pub allow_get_calls: bool,

    /// When GET is enabled, also serve incomplete uploads.
    pub allow_get_calls_for_partial_uploads: bool,

    /// TTL applied to the record on completion.
    pub storage_ttl_after_upload_complete: Ttl,

    /// Enables two-phase staging through an intermediate chunk file.
    pub use_intermediate_chunk: bool,

    /// Where chunk files are created when intermediate-chunk mode is enabled.
    pub chunk_directory: PathBuf,

    pub file_store: Arc<dyn FileStore>,
    pub metadata_store: Arc<dyn MetadataStore>,
    pub location_provider: Arc<dyn LocationProvider>,
    pub target_path_factory: Arc<dyn TargetPathFactory>,
    pub locker: Arc<dyn Locker>,
    pub event_bus: Arc<dyn EventBus>,
}

impl TusOptions {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            location_provider: Arc::new(PathSegmentLocationProvider::new(path.clone(), true)),
            target_path_factory: Arc::new(DirectoryTargetPathFactory::new("./tus-uploads")),
            path,
            ..Self::default()
        }
    }

    pub fn max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn relative_location(mut self, yes: bool) -> Self {
        self.relative_location = yes;
        self
    }

    pub fn allow_get_calls(mut self, yes: bool) -> Self {
        self.allow_get_calls = yes;
        self
    }

    pub fn allow_get_calls_for_partial_uploads(mut self, yes: bool) -> Self {
        self.allow_get_calls_for_partial_uploads = yes;
        self
    }

    pub fn storage_ttl_after_upload_complete(mut self, ttl: Ttl) -> Self {
        self.storage_ttl_after_upload_complete = ttl;
        self
    }

    pub fn use_intermediate_chunk(mut self, yes: bool) -> Self {
        self.use_intermediate_chunk = yes;
        self
    }

    pub fn chunk_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.chunk_directory = dir.into();
        self
    }

    pub fn with_file_store(mut self, store: impl FileStore + 'static) -> Self {
        self.file_store = Arc::new(store);
        self
    }

    pub fn with_metadata_store(mut self, store: impl MetadataStore + 'static) -> Self {
        self.metadata_store = Arc::new(store);
        self
    }

    pub fn with_location_provider(mut self, provider: impl LocationProvider + 'static) -> Self {
        self.location_provider = Arc::new(provider);
        self
    }

    pub fn with_target_path_factory(mut self, factory: impl TargetPathFactory + 'static) -> Self {
        self.target_path_factory = Arc::new(factory);
        self
    }

    pub fn with_locker(mut self, locker: impl Locker + 'static) -> Self {
        self.locker = Arc::new(locker);
        self
    }

    pub fn with_event_bus(mut self, bus: impl EventBus + 'static) -> Self {
        self.event_bus = Arc::new(bus);
        self
    }
}

impl Default for TusOptions {
    fn default() -> Self {
        Self {
            path: "/files".to_string(),
            max_size: DEFAULT_MAX_SIZE,
            relative_location: true,
            allow_get_calls: false,
            allow_get_calls_for_partial_uploads: false,
            storage_ttl_after_upload_complete: Ttl::Default,
            use_intermediate_chunk: false,
            chunk_directory: std::env::temp_dir(),
            file_store: Arc::new(DiskFileStore::new()),
            metadata_store: Arc::new(MemoryMetadataStore::new()),
            location_provider: Arc::new(PathSegmentLocationProvider::new("/files", true)),
            target_path_factory: Arc::new(DirectoryTargetPathFactory::new("./tus-uploads")),
            locker: Arc::new(MemoryLocker::new()),
            event_bus: Arc::new(BroadcastEventBus::default()),
        }
    }
}
