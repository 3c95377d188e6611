//! §4.1.5 GET: the optional, non-protocol download facility.

use std::path::Path;

use salvo_core::http::{HeaderValue, StatusCode};
use salvo_core::{Request, Response};

use crate::engine::{TusEngine, open_as_byte_stream};
use crate::error::TusError;
use crate::options::TusOptions;
use crate::{H_CONTENT_DISPOSITION, H_CONTENT_TRANSFER_ENCODING, H_CONTENT_TYPE};

pub async fn handle(req: &Request, options: &TusOptions, engine: &TusEngine, res: &mut Response) {
    if !options.allow_get_calls {
        res.status_code(TusError::GetDisabled.status());
        return;
    }

    let id = match options.location_provider.provide_id(req) {
        Ok(id) => id,
        // §4.4: the same LocationProvider failure maps to 404 on HEAD/PATCH but 400 here.
        Err(TusError::InvalidIdentifier) => {
            res.status_code(StatusCode::BAD_REQUEST);
            return;
        }
        Err(e) => {
            res.status_code(e.status());
            return;
        }
    };

    let record = match engine.prepare_download(&id).await {
        Ok(record) => record,
        Err(e) => {
            res.status_code(e.status());
            return;
        }
    };

    if !record.complete && !options.allow_get_calls_for_partial_uploads {
        res.status_code(TusError::Incomplete.status());
        return;
    }

    let size = engine.file_store.size(&record.file).await;
    let stream = match open_as_byte_stream(&record.file).await {
        Ok(s) => s,
        Err(e) => {
            res.status_code(e.status());
            return;
        }
    };

    res.status_code(StatusCode::OK);
    res.headers_mut()
        .insert(salvo_core::http::header::CONTENT_LENGTH, HeaderValue::from_str(&size.to_string()).expect("digits"));

    // Filename is intentionally not RFC 5987 encoded here (see design notes).
    let filename = Path::new(&record.file).file_name().and_then(|n| n.to_str()).unwrap_or("upload.bin");
    if let Ok(v) = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\"")) {
        res.headers_mut().insert(H_CONTENT_DISPOSITION, v);
    }
    res.headers_mut().insert(H_CONTENT_TRANSFER_ENCODING, HeaderValue::from_static("binary"));

    if let Some(content_type) = record.metadata.get("type")
        && let Ok(v) = HeaderValue::from_str(content_type)
    {
        res.headers_mut().insert(H_CONTENT_TYPE, v);
    }

    res.stream(stream);
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::events::BroadcastEventBus;
    use crate::file_store::DiskFileStore;
    use crate::locker::MemoryLocker;
    use crate::record::{MemoryMetadataStore, Ttl};
    use crate::target_path::DirectoryTargetPathFactory;

    fn make(dir: &TempDir) -> (TusOptions, TusEngine) {
        let mut options = TusOptions::new("/files");
        options.allow_get_calls = true;
        let engine = TusEngine {
            max_size: options.max_size,
            use_intermediate_chunk: false,
            chunk_directory: dir.path().to_path_buf(),
            storage_ttl_after_upload_complete: Ttl::Default,
            file_store: Arc::new(DiskFileStore::new()),
            metadata_store: Arc::new(MemoryMetadataStore::new()),
            target_path_factory: Arc::new(DirectoryTargetPathFactory::new(dir.path())),
            locker: Arc::new(MemoryLocker::new()),
            event_bus: Arc::new(BroadcastEventBus::default()),
        };
        (options, engine)
    }

    fn request_for(id: &str) -> Request {
        let mut req = Request::default();
        *req.uri_mut() = format!("/files/{id}").parse().unwrap();
        req
    }

    #[tokio::test]
    async fn disabled_by_default_is_method_not_allowed() {
        let dir = TempDir::new().unwrap();
        let (mut options, engine) = make(&dir);
        options.allow_get_calls = false;

        let mut res = Response::new();
        handle(&request_for("anything"), &options, &engine, &mut res).await;
        assert_eq!(res.status_code, Some(StatusCode::METHOD_NOT_ALLOWED));
    }

    #[tokio::test]
    async fn serves_completed_upload() {
        let dir = TempDir::new().unwrap();
        let (options, engine) = make(&dir);
        let created = engine.create(11, false, HashMap::new()).await.unwrap();
        engine.append(&created.id, 0, None, body_stream("hello world")).await.unwrap();

        let mut res = Response::new();
        handle(&request_for(&created.id), &options, &engine, &mut res).await;
        assert_eq!(res.status_code, Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn incomplete_upload_is_forbidden_when_partial_not_allowed() {
        let dir = TempDir::new().unwrap();
        let (options, engine) = make(&dir);
        let created = engine.create(11, false, HashMap::new()).await.unwrap();
        engine.append(&created.id, 0, None, body_stream("hello")).await.unwrap();

        let mut res = Response::new();
        handle(&request_for(&created.id), &options, &engine, &mut res).await;
        assert_eq!(res.status_code, Some(TusError::Incomplete.status()));
    }

    #[tokio::test]
    async fn incomplete_upload_is_served_when_partial_allowed() {
        let dir = TempDir::new().unwrap();
        let (mut options, engine) = make(&dir);
        options.allow_get_calls_for_partial_uploads = true;
        let created = engine.create(11, false, HashMap::new()).await.unwrap();
        engine.append(&created.id, 0, None, body_stream("hello")).await.unwrap();

        let mut res = Response::new();
        handle(&request_for(&created.id), &options, &engine, &mut res).await;
        assert_eq!(res.status_code, Some(StatusCode::OK));
    }

    #[tokio::test]
    async fn unknown_identifier_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (options, engine) = make(&dir);

        let mut res = Response::new();
        handle(&request_for("nope"), &options, &engine, &mut res).await;
        assert_eq!(res.status_code, Some(TusError::NotFound.status()));
    }

    fn body_stream(s: &'static str) -> crate::file_store::ByteStream {
        use bytes::Bytes;
        use futures_util::stream;
        Box::pin(stream::once(async move { Ok::<_, std::io::Error>(Bytes::from(s)) }))
    }
}
