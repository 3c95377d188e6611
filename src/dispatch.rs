//! C7 ProtocolHandler's HTTP surface: one dispatch function shared by both routes.
//!
//! `Router`'s method filters are evaluated before any `hoop` on that route runs, which
//! means `X-HTTP-Method-Override` cannot be resolved by a hoop ahead of method-based
//! routing. Both routes therefore match on path only (`.goal`, no method filter) and
//! resolve the effective method here, first.

use std::sync::Arc;

use salvo_core::http::{HeaderValue, Method, header};
use salvo_core::{Depot, Request, Response, handler};

use crate::error::{ProtocolError, TusError};
use crate::options::TusOptions;
use crate::utils::check_tus_version;
use crate::{H_TUS_RESUMABLE, H_TUS_VERSION, H_X_HTTP_METHOD_OVERRIDE, TUS_VERSION, TusEngine, handlers};

fn effective_method(req: &Request) -> Method {
    req.headers()
        .get(H_X_HTTP_METHOD_OVERRIDE)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Method::from_bytes(s.trim().as_bytes()).ok())
        .unwrap_or_else(|| req.method().clone())
}

#[handler]
pub async fn dispatch(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    route(req, depot, res).await;
    res.headers_mut().insert(H_TUS_RESUMABLE, HeaderValue::from_static(TUS_VERSION));
    res.headers_mut().insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
}

async fn route(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let engine = depot.obtain::<Arc<TusEngine>>().expect("missing tus engine state").clone();
    let options = depot.obtain::<Arc<TusOptions>>().expect("missing tus options state").clone();

    let method = effective_method(req);

    if method != Method::GET {
        let header_value = req.headers().get(H_TUS_RESUMABLE).and_then(|v| v.to_str().ok());
        if let Err(e) = check_tus_version(header_value) {
            if matches!(e, ProtocolError::UnsupportedTusVersion(_)) {
                res.headers_mut().insert(H_TUS_VERSION, HeaderValue::from_static(TUS_VERSION));
            }
            res.status_code(TusError::Protocol(e).status());
            return;
        }
    }

    match method {
        Method::OPTIONS => handlers::options::handle(&options, res),
        Method::HEAD => handlers::head::handle(req, &options, &engine, res).await,
        Method::POST => handlers::post::handle(req, &options, &engine, res).await,
        Method::PATCH => handlers::patch::handle(req, &options, &engine, res, None).await,
        Method::GET => handlers::get::handle(req, &options, &engine, res).await,
        _ => res.status_code(TusError::Protocol(ProtocolError::UnknownMethod).status()),
    }
}
