//! A tus 1.0.0 resumable-upload server for the Salvo web framework.
//!
//! Implements the core protocol plus the `creation`, `creation-defer-length`, and
//! `creation-with-upload` extensions, and an optional non-protocol `GET` download
//! facility. See <https://tus.io/> for the protocol itself.
//!
//! # Example
//!
//! ```ignore
//! use tus_upload_server::Tus;
//! use salvo_core::prelude::*;
//!
//! let tus = Tus::new().path("/files").max_size(100 * 1024 * 1024);
//! let router = Router::new().push(tus.into_router());
//!
//! let acceptor = TcpListener::new("0.0.0.0:8080").bind().await;
//! Server::new(acceptor).serve(router).await;
//! ```

use std::sync::Arc;

use salvo_core::{Depot, Router, handler};

mod dispatch;
mod engine;
mod error;
mod events;
mod file_store;
mod handlers;
mod location;
mod locker;
mod metadata;
mod record;
mod target_path;
mod utils;

pub mod options;

pub use engine::TusEngine;
pub use error::{ProtocolError, TusError, TusResult};
pub use events::{BroadcastEventBus, EventBus, TusEvent};
pub use file_store::{ByteStream, DiskFileStore, FileStore};
pub use location::{LocationProvider, PathSegmentLocationProvider};
pub use locker::{Locker, LockGuard, MemoryLocker};
pub use options::TusOptions;
pub use record::{MemoryMetadataStore, MetadataStore, Ttl, UploadRecord};
pub use target_path::{DirectoryTargetPathFactory, TargetPathFactory};

use crate::utils::normalize_path;

pub const TUS_VERSION: &str = "1.0.0";
pub const H_TUS_RESUMABLE: &str = "tus-resumable";
pub const H_TUS_VERSION: &str = "tus-version";
pub const H_TUS_EXTENSION: &str = "tus-extension";
pub const H_TUS_MAX_SIZE: &str = "tus-max-size";

pub const H_X_HTTP_METHOD_OVERRIDE: &str = "x-http-method-override";

pub const H_UPLOAD_LENGTH: &str = "upload-length";
pub const H_UPLOAD_OFFSET: &str = "upload-offset";
pub const H_UPLOAD_METADATA: &str = "upload-metadata";
pub const H_UPLOAD_DEFER_LENGTH: &str = "upload-defer-length";

pub const H_CONTENT_TYPE: &str = "content-type";
pub const H_CONTENT_DISPOSITION: &str = "content-disposition";
pub const H_CONTENT_TRANSFER_ENCODING: &str = "content-transfer-encoding";
pub const CT_OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

pub const TUS_EXTENSIONS: &str = "creation, creation-defer-length, creation-with-upload";

/// State injected into the `Depot` for every request the router dispatches.
#[derive(Clone)]
pub(crate) struct TusState {
    pub engine: Arc<TusEngine>,
    pub options: Arc<TusOptions>,
}

#[derive(Clone)]
struct TusStateHoop {
    state: TusState,
}

#[handler]
impl TusStateHoop {
    async fn handle(&self, depot: &mut Depot) {
        depot.inject(self.state.engine.clone());
        depot.inject(self.state.options.clone());
    }
}

/// Builder for the tus upload service.
#[derive(Clone)]
pub struct Tus {
    options: TusOptions,
}

impl Default for Tus {
    fn default() -> Self {
        Self::new()
    }
}

impl Tus {
    pub fn new() -> Self {
        Self { options: TusOptions::default() }
    }

    /// Sets the route path and, unless a custom [`LocationProvider`] has already been
    /// installed, re-anchors the default provider's base path to match. Call
    /// [`Tus::with_location_provider`] after this if a custom provider is needed.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.options.location_provider =
            Arc::new(PathSegmentLocationProvider::new(path.clone(), self.options.relative_location));
        self.options.path = path;
        self
    }

    pub fn max_size(mut self, max_size: u64) -> Self {
        self.options.max_size = max_size;
        self
    }

    pub fn relative_location(mut self, yes: bool) -> Self {
        self.options.relative_location = yes;
        self.options.location_provider = Arc::new(PathSegmentLocationProvider::new(self.options.path.clone(), yes));
        self
    }

    pub fn allow_get_calls(mut self, yes: bool) -> Self {
        self.options.allow_get_calls = yes;
        self
    }

    pub fn allow_get_calls_for_partial_uploads(mut self, yes: bool) -> Self {
        self.options.allow_get_calls_for_partial_uploads = yes;
        self
    }

    pub fn storage_ttl_after_upload_complete(mut self, ttl: Ttl) -> Self {
        self.options.storage_ttl_after_upload_complete = ttl;
        self
    }

    pub fn use_intermediate_chunk(mut self, yes: bool) -> Self {
        self.options.use_intermediate_chunk = yes;
        self
    }

    pub fn chunk_directory(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.options.chunk_directory = dir.into();
        self
    }

    pub fn with_file_store(mut self, store: impl FileStore + 'static) -> Self {
        self.options = self.options.with_file_store(store);
        self
    }

    pub fn with_metadata_store(mut self, store: impl MetadataStore + 'static) -> Self {
        self.options = self.options.with_metadata_store(store);
        self
    }

    pub fn with_location_provider(mut self, provider: impl LocationProvider + 'static) -> Self {
        self.options = self.options.with_location_provider(provider);
        self
    }

    pub fn with_target_path_factory(mut self, factory: impl TargetPathFactory + 'static) -> Self {
        self.options = self.options.with_target_path_factory(factory);
        self
    }

    pub fn with_locker(mut self, locker: impl Locker + 'static) -> Self {
        self.options = self.options.with_locker(locker);
        self
    }

    pub fn with_event_bus(mut self, bus: impl EventBus + 'static) -> Self {
        self.options = self.options.with_event_bus(bus);
        self
    }

    fn build_engine(&self) -> TusEngine {
        TusEngine {
            max_size: self.options.max_size,
            use_intermediate_chunk: self.options.use_intermediate_chunk,
            chunk_directory: self.options.chunk_directory.clone(),
            storage_ttl_after_upload_complete: self.options.storage_ttl_after_upload_complete,
            file_store: self.options.file_store.clone(),
            metadata_store: self.options.metadata_store.clone(),
            target_path_factory: self.options.target_path_factory.clone(),
            locker: self.options.locker.clone(),
            event_bus: self.options.event_bus.clone(),
        }
    }

    /// Builds the router. Two sibling routes share one dispatch handler: the bare base
    /// path (only ever hit by `OPTIONS`/`POST`) and `{base}/{**rest}` (everything that
    /// addresses an existing upload). A single handler, rather than per-method routes, is
    /// required because `X-HTTP-Method-Override` must be resolved before method dispatch,
    /// and `Router`'s method filters match before any `hoop` on that route runs.
    pub fn into_router(self) -> Router {
        let base_path = normalize_path(&self.options.path);
        let engine = Arc::new(self.build_engine());
        let options = Arc::new(self.options);
        let hoop = TusStateHoop { state: TusState { engine, options } };

        Router::new()
            .push(Router::with_path(base_path.clone()).hoop(hoop.clone()).goal(dispatch::dispatch))
            .push(Router::with_path(format!("{base_path}/{{**rest}}")).hoop(hoop).goal(dispatch::dispatch))
    }
}
