use thiserror::Error;

/// Capture-time failures, raised before any artifact exists.
///
/// Permission denial and user cancellation are expected outcomes of the
/// capture flow, modeled as values rather than panics; the pipeline is
/// never invoked when capture fails.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Camera or location permission is missing. The user must grant it
    /// and re-trigger capture; no retry is offered by this layer.
    #[error("capture permission denied: {0}")]
    PermissionDenied(String),

    /// The user backed out of the capture flow.
    #[error("capture cancelled by user")]
    Cancelled,

    /// The capture hardware or platform API failed.
    #[error("capture device error: {0}")]
    Device(String),
}

/// Byte-acquisition failures inside the resource fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    /// One strategy failed; recorded per-strategy, not surfaced alone.
    #[error("fetch strategy '{strategy}' failed: {reason}")]
    Strategy { strategy: &'static str, reason: String },

    /// A strategy exceeded its time bound.
    #[error("fetch strategy '{strategy}' timed out after {seconds}s")]
    Timeout { strategy: &'static str, seconds: u64 },

    /// Every strategy was attempted and none produced non-empty bytes.
    #[error("all fetch strategies exhausted: {reasons}")]
    Exhausted { reasons: String },
}

/// Blob-store failures, classified for user guidance.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Request never reached the service or the connection dropped.
    #[error("storage network error: {0}")]
    Network(String),

    /// The service rejected the credentials or the operation.
    #[error("storage permission denied: {0}")]
    PermissionDenied(String),

    /// The service accepted the request but reported a failure.
    #[error("storage service error: {0}")]
    Service(String),
}

/// Metadata document store failures. Never escapes the upload
/// coordinator; exhausted retries are logged and counted only.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata store connection failed: {0}")]
    Connection(String),

    #[error("metadata write failed: {0}")]
    Write(String),
}

/// The caller-facing upload failure taxonomy. Every variant leaves the
/// artifact in `Local` status and is retryable at the batch level.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Both byte-acquisition strategies were exhausted.
    #[error("could not read captured photo: {0}")]
    FetchFailed(#[from] FetchError),

    /// The acquired payload had zero length.
    #[error("captured photo produced an empty payload")]
    EmptyPayload,

    /// The blob put did not settle within the configured bound.
    #[error("storage upload timed out after {seconds}s")]
    StoreTimeout { seconds: u64 },

    /// Network or service failure from the blob store.
    #[error(transparent)]
    Store(StoreError),

    /// Authorization failure from the blob store, surfaced separately
    /// because the user guidance differs from a transient network fault.
    #[error("storage rejected the upload: {0}")]
    PermissionDenied(String),
}

impl From<StoreError> for UploadError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PermissionDenied(msg) => UploadError::PermissionDenied(msg),
            other => UploadError::Store(other),
        }
    }
}

impl UploadError {
    /// Short, stable failure kind for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::FetchFailed(_) => "fetch_failed",
            UploadError::EmptyPayload => "empty_payload",
            UploadError::StoreTimeout { .. } => "store_timeout",
            UploadError::Store(_) => "store_error",
            UploadError::PermissionDenied(_) => "permission_denied",
        }
    }

    /// Map the failure onto the message shown to the person holding the
    /// phone. The taxonomy is part of the contract; the wording is not.
    pub fn user_guidance(&self) -> &'static str {
        match self {
            UploadError::FetchFailed(_) | UploadError::EmptyPayload => {
                "Could not read the captured photo. Please recapture it."
            }
            UploadError::StoreTimeout { .. } => {
                "Upload timed out. Retry with a smaller photo or a better connection."
            }
            UploadError::Store(_) => "Upload failed. Check connectivity and retry.",
            UploadError::PermissionDenied(_) => {
                "Storage configuration issue. Contact support if this persists."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_permission_lifts_to_upload_variant() {
        let err: UploadError = StoreError::PermissionDenied("403".into()).into();
        assert!(matches!(err, UploadError::PermissionDenied(_)));

        let err: UploadError = StoreError::Network("reset".into()).into();
        assert!(matches!(err, UploadError::Store(StoreError::Network(_))));
    }

    #[test]
    fn test_user_guidance_mapping() {
        assert!(UploadError::EmptyPayload.user_guidance().contains("recapture"));
        assert!(UploadError::StoreTimeout { seconds: 30 }
            .user_guidance()
            .contains("smaller"));
        assert!(UploadError::Store(StoreError::Network("x".into()))
            .user_guidance()
            .contains("connectivity"));
        assert!(UploadError::PermissionDenied("x".into())
            .user_guidance()
            .contains("configuration"));
    }

    #[test]
    fn test_error_kinds_are_distinct() {
        let kinds = [
            UploadError::EmptyPayload.kind(),
            UploadError::StoreTimeout { seconds: 1 }.kind(),
            UploadError::Store(StoreError::Service("x".into())).kind(),
            UploadError::PermissionDenied("x".into()).kind(),
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in kinds.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
