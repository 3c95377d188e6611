//! §4.1.3 POST: creates a new upload, optionally folding in the first PATCH
//! (creation-with-upload).

use salvo_core::http::{HeaderValue, StatusCode};
use salvo_core::{Request, Response};

use crate::engine::TusEngine;
use crate::error::{ProtocolError, TusError};
use crate::handlers::patch;
use crate::metadata;
use crate::options::TusOptions;
use crate::utils::{parse_u64_or_zero, validate_header};
use crate::{CT_OFFSET_OCTET_STREAM, H_CONTENT_TYPE, H_UPLOAD_DEFER_LENGTH, H_UPLOAD_LENGTH, H_UPLOAD_METADATA, H_UPLOAD_OFFSET};

pub async fn handle(req: &mut Request, options: &TusOptions, engine: &TusEngine, res: &mut Response) {
    let length_header = req.headers().get(H_UPLOAD_LENGTH).and_then(|v| v.to_str().ok());
    let length = match parse_u64_or_zero(length_header, H_UPLOAD_LENGTH) {
        Ok(n) => n,
        Err(e) => {
            res.status_code(TusError::from(e).status());
            return;
        }
    };

    let defer = if length == 0 {
        let deferred = req.headers().get(H_UPLOAD_DEFER_LENGTH).and_then(|v| v.to_str().ok()) == Some("1");
        if !deferred {
            res.status_code(TusError::from(ProtocolError::InvalidLength).status());
            return;
        }
        true
    } else {
        false
    };

    let metadata = req
        .headers()
        .get(H_UPLOAD_METADATA)
        .and_then(|v| v.to_str().ok())
        .map(metadata::parse)
        .unwrap_or_default();

    let created = match engine.create(length, defer, metadata).await {
        Ok(c) => c,
        Err(e) => {
            res.status_code(e.status());
            return;
        }
    };

    res.status_code(StatusCode::CREATED);
    let location = options.location_provider.provide_location(&created.id, req);
    tracing::info!("created upload {}: location {}", created.id, location);
    if let Ok(v) = HeaderValue::from_str(&location) {
        res.headers_mut().insert(salvo_core::http::header::LOCATION, v);
    }
    if created.record.defer {
        res.headers_mut().insert(H_UPLOAD_DEFER_LENGTH, HeaderValue::from_static("1"));
    }

    let is_creation_with_upload = validate_header(CT_OFFSET_OCTET_STREAM, req.headers().get(H_CONTENT_TYPE));

    if is_creation_with_upload {
        // Delegates to PATCH reusing this response; per §4.1.3 this folds create+first-append
        // into one request and MUST NOT emit `UploadStarted` separately.
        patch::handle(req, options, engine, res, Some(created.id)).await;
    } else {
        res.headers_mut().insert(H_UPLOAD_OFFSET, HeaderValue::from_static("0"));
        engine.notify_upload_started(&created.id, &created.record);
    }
}
