use crate::artifact::EvidenceArtifact;
use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::fetch::ResourceFetcher;
use crate::metadata::{EvidenceDocument, MetadataStore};
use crate::retry::retry_with_delay;
use crate::store::{attempt_key, content_type_for_handle, ArtifactStore};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Orchestrates one artifact's journey from local handle to durable
/// remote object: fetch → size check → timed store put → locator →
/// best-effort metadata write.
///
/// The blob put is a hard requirement; the metadata write is not.
/// Losing searchability is recoverable out-of-band, losing the
/// evidence photo is not.
pub struct UploadCoordinator {
    fetcher: ResourceFetcher,
    store: Arc<dyn ArtifactStore>,
    metadata: Arc<dyn MetadataStore>,
    config: UploadConfig,
    key_prefix: String,
}

impl UploadCoordinator {
    pub fn new(
        fetcher: ResourceFetcher,
        store: Arc<dyn ArtifactStore>,
        metadata: Arc<dyn MetadataStore>,
        config: UploadConfig,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            store,
            metadata,
            config,
            key_prefix: key_prefix.into(),
        }
    }

    /// Upload one artifact and return its remote locator.
    ///
    /// Steps run strictly in order. The store put is raced against the
    /// configured timeout; a late-arriving result after the timeout is
    /// dropped, never awaited. Metadata-write exhaustion is logged and
    /// counted but never fails the upload.
    #[instrument(skip(self, artifact), fields(artifact_id = %artifact.id))]
    pub async fn upload(&self, artifact: &EvidenceArtifact) -> Result<String, UploadError> {
        let bytes = match self.fetcher.fetch(&artifact.local_handle).await {
            Ok(bytes) => bytes,
            Err(err) => {
                metrics::counter!("evidence.uploads.failed", "kind" => "fetch_failed")
                    .increment(1);
                return Err(UploadError::FetchFailed(err));
            }
        };

        // Cheap precondition before any network call.
        if bytes.is_empty() {
            metrics::counter!("evidence.uploads.failed", "kind" => "empty_payload").increment(1);
            return Err(UploadError::EmptyPayload);
        }

        let size_bytes = bytes.len();
        let attempted_at = Utc::now();
        let (content_type, extension) = content_type_for_handle(&artifact.local_handle);

        // Key is unique per attempt, not per artifact: retries never
        // collide with a partially succeeded prior attempt.
        let key = attempt_key(&self.key_prefix, &artifact.id, attempted_at, extension);

        let mut tags = BTreeMap::new();
        tags.insert("artifact-id".to_string(), artifact.id.clone());
        tags.insert("location-code".to_string(), artifact.location_code.clone());
        tags.insert(
            "captured-at".to_string(),
            artifact.captured_at.to_rfc3339(),
        );
        tags.insert("attempted-at".to_string(), attempted_at.to_rfc3339());

        debug!(key = %key, size_bytes, "Submitting evidence payload to store");

        let put = self.store.put(&key, bytes, content_type, &tags);
        let locator = match tokio::time::timeout(self.config.store_timeout(), put).await {
            Ok(Ok(locator)) => locator,
            Ok(Err(store_err)) => {
                let err = UploadError::from(store_err);
                metrics::counter!("evidence.uploads.failed", "kind" => err.kind()).increment(1);
                return Err(err);
            }
            Err(_) => {
                metrics::counter!("evidence.uploads.failed", "kind" => "store_timeout")
                    .increment(1);
                return Err(UploadError::StoreTimeout {
                    seconds: self.config.store_timeout_secs,
                });
            }
        };

        let document = EvidenceDocument {
            artifact_id: artifact.id.clone(),
            uri: locator.clone(),
            latitude: artifact.latitude,
            longitude: artifact.longitude,
            accuracy_m: artifact.accuracy_m,
            captured_at: artifact.captured_at,
            captured_local_display: artifact.captured_local_display.clone(),
            location_code: artifact.location_code.clone(),
            size_bytes: size_bytes as i64,
            content_type: content_type.to_string(),
        };

        // Best-effort: the blob is already durable, so exhausting the
        // metadata retries must not fail the upload.
        let metadata_result = retry_with_delay(
            self.config.metadata_attempts,
            self.config.metadata_retry_delay(),
            "metadata_write",
            || self.metadata.put(&key, &document),
        )
        .await;

        if let Err(err) = metadata_result {
            warn!(
                artifact_id = %artifact.id,
                doc_id = %key,
                error = %err,
                "Metadata write exhausted retries; evidence object is stored, document is not"
            );
            metrics::counter!("evidence.metadata.write_failed").increment(1);
        }

        metrics::counter!("evidence.uploads.succeeded").increment(1);
        metrics::counter!("evidence.bytes.uploaded").increment(size_bytes as u64);

        info!(
            artifact_id = %artifact.id,
            locator = %locator,
            size_bytes,
            "Evidence uploaded"
        );

        Ok(locator)
    }
}
