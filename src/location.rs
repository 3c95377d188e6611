//! C3 LocationProvider: bidirectional map between requests and upload identifiers (§4.4).

use std::sync::OnceLock;

use regex::Regex;
use salvo_core::Request;
use salvo_core::http::header;

use crate::error::{TusError, TusResult};

static RE_UPLOAD_ID: OnceLock<Regex> = OnceLock::new();

fn upload_id_regex() -> &'static Regex {
    RE_UPLOAD_ID.get_or_init(|| Regex::new(r"([^/]+)/?$").expect("valid regex"))
}

/// Extracts the last non-empty path segment, the identifier-derivation rule the default
/// provider uses. Factored out as a pure function over a path string so it can be unit
/// tested without constructing a full request.
fn extract_last_segment(path: &str) -> Option<&str> {
    upload_id_regex().captures(path).and_then(|caps| caps.get(1)).map(|m| m.as_str())
}

/// Builds the `Location` value for an identifier given the already-resolved proto/host.
/// Pure function underlying [`PathSegmentLocationProvider::provide_location`].
fn build_location(base_path: &str, id: &str, relative: bool, proto: &str, host: &str) -> String {
    let base = if base_path == "/" { "" } else { base_path };
    if relative {
        format!("{base}/{id}")
    } else {
        format!("{proto}://{host}{base}/{id}")
    }
}

/// Derives upload identifiers from requests and builds the `Location` URL a client should
/// PATCH/HEAD/GET against. Pluggable because URL-path parsing depends on the host's routing.
pub trait LocationProvider: Send + Sync {
    fn provide_id(&self, req: &Request) -> TusResult<String>;
    fn provide_location(&self, id: &str, req: &Request) -> String;
}

/// Default [`LocationProvider`]: extracts the last non-empty path segment via a compiled
/// regex, the same technique `salvo-tus`'s `TusOptions::get_file_id_from_request` uses, and
/// builds either a path-relative or absolute `Location` depending on configuration.
pub struct PathSegmentLocationProvider {
    pub base_path: String,
    pub relative_location: bool,
}

impl PathSegmentLocationProvider {
    pub fn new(base_path: impl Into<String>, relative_location: bool) -> Self {
        Self { base_path: base_path.into(), relative_location }
    }

    fn host_and_proto<'a>(req: &'a Request) -> (&'a str, &'a str) {
        let mut proto = "http";
        let mut host = "localhost";
        if let Some(v) = req.headers().get(header::HOST).and_then(|v| v.to_str().ok()) {
            host = v.trim();
        }
        if let Some(v) = req.headers().get("x-forwarded-proto").and_then(|v| v.to_str().ok()) {
            proto = v.split(',').next().unwrap_or(v).trim();
        }
        (proto, host)
    }
}

impl LocationProvider for PathSegmentLocationProvider {
    fn provide_id(&self, req: &Request) -> TusResult<String> {
        extract_last_segment(req.uri().path()).map(str::to_string).ok_or(TusError::InvalidIdentifier)
    }

    fn provide_location(&self, id: &str, req: &Request) -> String {
        let (proto, host) = Self::host_and_proto(req);
        build_location(&self.base_path, id, self.relative_location, proto, host)
    }
}
