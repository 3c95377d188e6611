//! §4.1.2 HEAD: reports upload progress without mutating state.

use salvo_core::http::{HeaderValue, StatusCode};
use salvo_core::{Request, Response};

use crate::engine::TusEngine;
use crate::error::TusError;
use crate::metadata;
use crate::options::TusOptions;
use crate::{H_UPLOAD_DEFER_LENGTH, H_UPLOAD_LENGTH, H_UPLOAD_METADATA, H_UPLOAD_OFFSET};

pub async fn handle(req: &Request, options: &TusOptions, engine: &TusEngine, res: &mut Response) {
    let id = match options.location_provider.provide_id(req) {
        Ok(id) => id,
        Err(e) => {
            res.status_code(e.status());
            return;
        }
    };

    let status = match engine.status(&id).await {
        Ok(status) => status,
        Err(e) => {
            res.status_code(e.status());
            return;
        }
    };

    res.status_code(StatusCode::OK);
    res.headers_mut().insert(H_UPLOAD_OFFSET, HeaderValue::from_str(&status.offset.to_string()).expect("digits"));

    if status.record.defer {
        res.headers_mut().insert(H_UPLOAD_DEFER_LENGTH, HeaderValue::from_static("1"));
    } else {
        res.headers_mut()
            .insert(H_UPLOAD_LENGTH, HeaderValue::from_str(&status.record.length.to_string()).expect("digits"));
    }

    if !status.record.metadata.is_empty()
        && let Ok(v) = HeaderValue::from_str(&metadata::stringify(&status.record.metadata))
    {
        res.headers_mut().insert(H_UPLOAD_METADATA, v);
    }
}
