//! §4.1.1 OPTIONS: advertises protocol capabilities. Never mutates state.

use salvo_core::Response;
use salvo_core::http::{HeaderValue, StatusCode};

use crate::options::TusOptions;
use crate::{H_TUS_EXTENSION, H_TUS_MAX_SIZE, H_TUS_VERSION, TUS_EXTENSIONS, TUS_VERSION};

pub fn handle(options: &TusOptions, res: &mut Response) {
    res.status_code(StatusCode::OK);
    res.headers_mut().insert(H_TUS_VERSION, HeaderValue::from_static(TUS_VERSION));
    res.headers_mut().insert(H_TUS_EXTENSION, HeaderValue::from_static(TUS_EXTENSIONS));
    if let Ok(v) = HeaderValue::from_str(&options.max_size.to_string()) {
        res.headers_mut().insert(H_TUS_MAX_SIZE, v);
    }
}
