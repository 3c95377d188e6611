//! §4.1.4 PATCH: the append engine's HTTP surface.

use futures_util::StreamExt;
use salvo_core::http::{HeaderValue, StatusCode};
use salvo_core::{Request, Response};

use crate::engine::TusEngine;
use crate::error::{ProtocolError, TusError};
use crate::file_store::ByteStream;
use crate::options::TusOptions;
use crate::utils::validate_header;
use crate::{CT_OFFSET_OCTET_STREAM, H_CONTENT_TYPE, H_UPLOAD_DEFER_LENGTH, H_UPLOAD_LENGTH, H_UPLOAD_OFFSET};

/// `forced_id` lets creation-with-upload (§4.1.3) delegate here with the identifier it
/// just minted, skipping `LocationProvider` derivation.
pub async fn handle(
    req: &mut Request,
    options: &TusOptions,
    engine: &TusEngine,
    res: &mut Response,
    forced_id: Option<String>,
) {
    if !validate_header(CT_OFFSET_OCTET_STREAM, req.headers().get(H_CONTENT_TYPE)) {
        res.status_code(TusError::from(ProtocolError::InvalidContentType).status());
        return;
    }

    let forced = forced_id.is_some();
    let id = match forced_id {
        Some(id) => id,
        None => match options.location_provider.provide_id(req) {
            Ok(id) => id,
            Err(e) => {
                res.status_code(e.status());
                return;
            }
        },
    };

    // creation-with-upload (§4.1.3) folds the first PATCH into the POST response and has
    // no `Upload-Offset` header of its own to read; the offset for that first write is 0.
    let offset_header = req.headers().get(H_UPLOAD_OFFSET).and_then(|v| v.to_str().ok());
    let offset = match (offset_header.map(str::parse::<u64>), forced) {
        (Some(Ok(n)), _) => n,
        (None, true) => 0,
        _ => {
            res.status_code(TusError::from(ProtocolError::InvalidInt(H_UPLOAD_OFFSET)).status());
            return;
        }
    };

    let upload_length = match req.headers().get(H_UPLOAD_LENGTH).and_then(|v| v.to_str().ok()) {
        None => None,
        Some(s) => match s.parse::<u64>() {
            Ok(n) => Some(n),
            Err(_) => {
                res.status_code(TusError::from(ProtocolError::InvalidInt(H_UPLOAD_LENGTH)).status());
                return;
            }
        },
    };

    let stream: ByteStream = Box::pin(req.take_body().map(|r| r.map_err(std::io::Error::other)));

    match engine.append(&id, offset, upload_length, stream).await {
        Ok(outcome) => {
            res.status_code(StatusCode::NO_CONTENT);
            res.headers_mut()
                .insert(H_UPLOAD_OFFSET, HeaderValue::from_str(&outcome.new_offset.to_string()).expect("digits"));
            if outcome.deferred {
                res.headers_mut().insert(H_UPLOAD_DEFER_LENGTH, HeaderValue::from_static("1"));
            }
        }
        Err(e) => res.status_code(e.status()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use bytes::Bytes;
    use tempfile::TempDir;

    use super::*;
    use crate::error::TusError;
    use crate::events::BroadcastEventBus;
    use crate::file_store::DiskFileStore;
    use crate::locker::MemoryLocker;
    use crate::record::{MemoryMetadataStore, Ttl};
    use crate::target_path::DirectoryTargetPathFactory;

    fn make(dir: &TempDir) -> (TusOptions, TusEngine) {
        let options = TusOptions::new("/files");
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

    fn patch_request(id: &str, offset: u64, body: &'static str) -> Request {
        let mut req = Request::default();
        *req.uri_mut() = format!("/files/{id}").parse().unwrap();
        req.headers_mut().insert(H_CONTENT_TYPE, HeaderValue::from_static(CT_OFFSET_OCTET_STREAM));
        req.headers_mut().insert(H_UPLOAD_OFFSET, HeaderValue::from_str(&offset.to_string()).unwrap());
        *req.body_mut() = Bytes::from(body).into();
        req
    }

    #[tokio::test]
    async fn appends_from_zero_and_completes() {
        let dir = TempDir::new().unwrap();
        let (options, engine) = make(&dir);
        let created = engine.create(11, false, HashMap::new()).await.unwrap();

        let mut req = patch_request(&created.id, 0, "hello world");
        let mut res = Response::new();
        handle(&mut req, &options, &engine, &mut res, None).await;

        assert_eq!(res.status_code, Some(StatusCode::NO_CONTENT));
        assert_eq!(res.headers().get(H_UPLOAD_OFFSET).unwrap(), "11");
    }

    #[tokio::test]
    async fn rejects_wrong_content_type() {
        let dir = TempDir::new().unwrap();
        let (options, engine) = make(&dir);
        let created = engine.create(11, false, HashMap::new()).await.unwrap();

        let mut req = Request::default();
        *req.uri_mut() = format!("/files/{}", created.id).parse().unwrap();
        req.headers_mut().insert(H_CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        req.headers_mut().insert(H_UPLOAD_OFFSET, HeaderValue::from_static("0"));

        let mut res = Response::new();
        handle(&mut req, &options, &engine, &mut res, None).await;
        assert_eq!(res.status_code, Some(StatusCode::UNSUPPORTED_MEDIA_TYPE));
    }

    #[tokio::test]
    async fn offset_conflict_returns_409() {
        let dir = TempDir::new().unwrap();
        let (options, engine) = make(&dir);
        let created = engine.create(11, false, HashMap::new()).await.unwrap();

        let mut req = patch_request(&created.id, 5, "xxxxx");
        let mut res = Response::new();
        handle(&mut req, &options, &engine, &mut res, None).await;
        assert_eq!(res.status_code, Some(TusError::OffsetMismatch { expected: 0, got: 5 }.status()));
    }

    #[tokio::test]
    async fn forced_id_bypasses_location_derivation() {
        let dir = TempDir::new().unwrap();
        let (options, engine) = make(&dir);
        let created = engine.create(5, false, HashMap::new()).await.unwrap();

        let mut req = Request::default();
        *req.uri_mut() = "/files".parse().unwrap();
        req.headers_mut().insert(H_CONTENT_TYPE, HeaderValue::from_static(CT_OFFSET_OCTET_STREAM));
        req.headers_mut().insert(H_UPLOAD_OFFSET, HeaderValue::from_static("0"));
        *req.body_mut() = Bytes::from("abcde").into();

        let mut res = Response::new();
        handle(&mut req, &options, &engine, &mut res, Some(created.id)).await;
        assert_eq!(res.status_code, Some(StatusCode::NO_CONTENT));
    }

    #[tokio::test]
    async fn forced_id_defaults_missing_offset_to_zero() {
        let dir = TempDir::new().unwrap();
        let (options, engine) = make(&dir);
        let created = engine.create(5, false, HashMap::new()).await.unwrap();

        let mut req = Request::default();
        *req.uri_mut() = "/files".parse().unwrap();
        req.headers_mut().insert(H_CONTENT_TYPE, HeaderValue::from_static(CT_OFFSET_OCTET_STREAM));
        *req.body_mut() = Bytes::from("abcde").into();

        let mut res = Response::new();
        handle(&mut req, &options, &engine, &mut res, Some(created.id)).await;
        assert_eq!(res.status_code, Some(StatusCode::NO_CONTENT));
        assert_eq!(res.headers().get(H_UPLOAD_OFFSET).unwrap(), "5");
    }

    #[tokio::test]
    async fn missing_offset_without_forced_id_is_bad_request() {
        let dir = TempDir::new().unwrap();
        let (options, engine) = make(&dir);
        let created = engine.create(11, false, HashMap::new()).await.unwrap();

        let mut req = Request::default();
        *req.uri_mut() = format!("/files/{}", created.id).parse().unwrap();
        req.headers_mut().insert(H_CONTENT_TYPE, HeaderValue::from_static(CT_OFFSET_OCTET_STREAM));

        let mut res = Response::new();
        handle(&mut req, &options, &engine, &mut res, None).await;
        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));
    }
}
