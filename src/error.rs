//! Error kinds (§7) and their HTTP status mapping.

use salvo_core::http::StatusCode;

pub type TusResult<T> = Result<T, TusError>;

/// Protocol-level violations: malformed or missing headers, wrong content type,
/// version mismatch. These never indicate a storage inconsistency.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("missing tus-resumable")]
    MissingTusResumable,
    #[error("unsupported tus version: {0}")]
    UnsupportedTusVersion(String),
    #[error("missing header: {0}")]
    MissingHeader(&'static str),
    #[error("invalid integer header: {0}")]
    InvalidInt(&'static str),
    #[error("invalid content-type")]
    InvalidContentType,
    #[error("Upload-Length or Upload-Defer-Length header required, and not both")]
    InvalidLength,
    #[error(
        "Upload-Metadata is invalid. It MUST consist of one or more comma-separated key-value \
         pairs. The key and value MUST be separated by a space. The key MUST NOT contain spaces \
         and commas and MUST NOT be empty. The value MUST be Base64 encoded. All keys MUST be \
         unique"
    )]
    InvalidMetadata,
    #[error("unrecognized HTTP method")]
    UnknownMethod,
}

/// Top level error type produced by the engine and handlers.
///
/// `Conflict` and `Runtime` are kept as distinct variants per §7: a `Conflict` means the
/// append-only invariant was (or would have been) violated and is mapped to `409`; a
/// `Runtime` failure is a filesystem/storage malfunction and is propagated as a `5xx`.
#[derive(Debug, thiserror::Error)]
pub enum TusError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("upload not found")]
    NotFound,

    /// A `LocationProvider` could not derive an identifier from the request. Defaults to
    /// `404` (the HEAD/PATCH reading); the GET handler maps this variant to `400` itself
    /// per §4.4, since the same failure means something different depending on method.
    #[error("could not derive an upload identifier from the request")]
    InvalidIdentifier,

    #[error("upload already complete")]
    AlreadyComplete,

    #[error("offset conflict: expected {expected}, got {got}")]
    OffsetMismatch { expected: u64, got: u64 },

    /// A known-oversized request, rejected before any bytes are written: `Upload-Length` on
    /// POST, or a deferred record's one-shot `Upload-Length` fix-up, exceeds `maxSize`.
    #[error("maximum size exceeded")]
    MaxSizeExceeded,

    /// Bytes actually transferred during a PATCH would exceed (or did exceed) the write
    /// limit. Per §7 this is grouped with the other append-only violations and mapped to
    /// `409`, distinct from [`TusError::MaxSizeExceeded`]'s `413`.
    #[error("write would exceed maximum size")]
    WriteLimitExceeded,

    #[error("GET is disabled")]
    GetDisabled,

    #[error("upload is not yet complete")]
    Incomplete,

    #[error("runtime failure: {0}")]
    Runtime(String),
}

impl TusError {
    pub fn status(&self) -> StatusCode {
        match self {
            TusError::Protocol(ProtocolError::MissingTusResumable) => StatusCode::PRECONDITION_FAILED,
            TusError::Protocol(ProtocolError::UnsupportedTusVersion(_)) => StatusCode::PRECONDITION_FAILED,
            TusError::Protocol(ProtocolError::InvalidContentType) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            TusError::Protocol(_) => StatusCode::BAD_REQUEST,

            TusError::NotFound => StatusCode::NOT_FOUND,
            TusError::InvalidIdentifier => StatusCode::NOT_FOUND,
            TusError::AlreadyComplete => StatusCode::CONFLICT,
            TusError::OffsetMismatch { .. } => StatusCode::CONFLICT,
            TusError::WriteLimitExceeded => StatusCode::CONFLICT,
            TusError::MaxSizeExceeded => StatusCode::PAYLOAD_TOO_LARGE,
            TusError::GetDisabled => StatusCode::METHOD_NOT_ALLOWED,
            TusError::Incomplete => StatusCode::FORBIDDEN,
            TusError::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_map_to_expected_statuses() {
        assert_eq!(
            TusError::Protocol(ProtocolError::MissingTusResumable).status(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            TusError::Protocol(ProtocolError::UnsupportedTusVersion("2.0.0".into())).status(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            TusError::Protocol(ProtocolError::InvalidContentType).status(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            TusError::Protocol(ProtocolError::InvalidLength).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            TusError::Protocol(ProtocolError::InvalidMetadata).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn core_errors_map_to_expected_statuses() {
        assert_eq!(TusError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(TusError::AlreadyComplete.status(), StatusCode::CONFLICT);
        assert_eq!(
            TusError::OffsetMismatch { expected: 10, got: 0 }.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(TusError::MaxSizeExceeded.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(TusError::WriteLimitExceeded.status(), StatusCode::CONFLICT);
        assert_eq!(TusError::GetDisabled.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(TusError::Incomplete.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            TusError::Runtime("disk full".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn protocol_error_from_conversion() {
        let err: TusError = ProtocolError::MissingTusResumable.into();
        assert!(matches!(err, TusError::Protocol(ProtocolError::MissingTusResumable)));
    }
}
