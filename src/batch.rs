use crate::artifact::{EvidenceArtifact, UploadStatus};
use crate::coordinator::UploadCoordinator;
use crate::error::UploadError;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Outcome of asking the batch whether it is ready to submit.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Every artifact is uploaded; these are their locators, in
    /// insertion order.
    Ready { locators: Vec<String> },
    /// Some artifacts are still local. The caller must choose: retry
    /// them, submit only the uploaded subset, or cancel.
    Unresolved {
        uploaded_locators: Vec<String>,
        pending_ids: Vec<String>,
    },
}

/// One row of the display projection.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceRow {
    pub id: String,
    /// Remote locator once uploaded, local handle until then.
    pub thumbnail_source: String,
    pub status: UploadStatus,
    pub location_code: String,
    pub readable_timestamp: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f64,
}

/// In-memory ordered collection of captured artifacts for one claim,
/// keyed by id with insertion order preserved for display.
///
/// Insertions and removals are serialized through the write lock;
/// concurrent reads for display are safe. Uploads happen outside the
/// lock, against a snapshot, and status mutations re-check that the id
/// is still present so a removal racing an in-flight upload discards
/// the result instead of crashing.
pub struct EvidenceBatch {
    coordinator: Arc<UploadCoordinator>,
    items: RwLock<Vec<EvidenceArtifact>>,
    retry_concurrency: usize,
}

impl EvidenceBatch {
    pub fn new(coordinator: Arc<UploadCoordinator>, retry_concurrency: usize) -> Self {
        Self {
            coordinator,
            items: RwLock::new(Vec::new()),
            retry_concurrency: retry_concurrency.max(1),
        }
    }

    /// Insert an artifact and attempt its upload immediately.
    ///
    /// On failure the artifact stays in the batch at `Local` status;
    /// evidence is never discarded just because upload failed. The
    /// upload outcome is returned so the UI can surface guidance.
    #[instrument(skip(self, artifact), fields(artifact_id = %artifact.id))]
    pub async fn add(&self, artifact: EvidenceArtifact) -> Result<String, UploadError> {
        let id = artifact.id.clone();
        let snapshot = artifact.clone();

        {
            let mut items = self.items.write().await;
            items.push(artifact);
        }

        let result = self.coordinator.upload(&snapshot).await;

        match &result {
            Ok(locator) => {
                self.apply_locator(&id, locator).await;
            }
            Err(err) => {
                warn!(
                    artifact_id = %id,
                    kind = err.kind(),
                    "Upload failed; artifact retained as local"
                );
            }
        }

        result
    }

    /// Unconditional removal, regardless of status. Removing an id
    /// that is not present is a no-op.
    pub async fn remove(&self, id: &str) {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|a| a.id != id);
        if items.len() < before {
            debug!(artifact_id = %id, "Artifact removed from batch");
        }
    }

    /// Partition the batch by status and report whether it is
    /// submit-ready. Does not upload anything.
    pub async fn submit(&self) -> SubmitOutcome {
        let items = self.items.read().await;

        let uploaded_locators: Vec<String> = items
            .iter()
            .filter_map(|a| a.remote_locator.clone())
            .collect();
        let pending_ids: Vec<String> = items
            .iter()
            .filter(|a| a.status() == UploadStatus::Local)
            .map(|a| a.id.clone())
            .collect();

        if pending_ids.is_empty() {
            SubmitOutcome::Ready {
                locators: uploaded_locators,
            }
        } else {
            SubmitOutcome::Unresolved {
                uploaded_locators,
                pending_ids,
            }
        }
    }

    /// Explicit partial submission: locators of the uploaded subset
    /// only. The caller has acknowledged leaving local items behind.
    pub async fn submit_uploaded(&self) -> Vec<String> {
        let items = self.items.read().await;
        items
            .iter()
            .filter_map(|a| a.remote_locator.clone())
            .collect()
    }

    /// Re-upload every local artifact, independently: one item's
    /// failure never blocks the others. Completion order across items
    /// is unspecified.
    #[instrument(skip(self))]
    pub async fn retry_failed(&self) -> Vec<(String, Result<String, UploadError>)> {
        let pending: Vec<EvidenceArtifact> = {
            let items = self.items.read().await;
            items
                .iter()
                .filter(|a| a.status() == UploadStatus::Local)
                .cloned()
                .collect()
        };

        if pending.is_empty() {
            return Vec::new();
        }

        info!(count = pending.len(), "Retrying local artifacts");

        let coordinator = self.coordinator.clone();
        let results: Vec<(String, Result<String, UploadError>)> = stream::iter(pending)
            .map(|artifact| {
                let coordinator = coordinator.clone();
                async move {
                    let result = coordinator.upload(&artifact).await;
                    (artifact.id, result)
                }
            })
            .buffer_unordered(self.retry_concurrency)
            .collect()
            .await;

        for (id, result) in &results {
            if let Ok(locator) = result {
                self.apply_locator(id, locator).await;
            }
        }

        results
    }

    /// Ordered projection for the display layer.
    pub async fn rows(&self) -> Vec<EvidenceRow> {
        let items = self.items.read().await;
        items
            .iter()
            .map(|a| EvidenceRow {
                id: a.id.clone(),
                thumbnail_source: a
                    .remote_locator
                    .clone()
                    .unwrap_or_else(|| a.local_handle.as_str().to_string()),
                status: a.status(),
                location_code: a.location_code.clone(),
                readable_timestamp: a.captured_local_display.clone(),
                latitude: a.latitude,
                longitude: a.longitude,
                accuracy_m: a.accuracy_m,
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Record a successful upload iff the artifact is still present.
    /// An upload completing after its artifact was removed is silently
    /// discarded.
    async fn apply_locator(&self, id: &str, locator: &str) {
        let mut items = self.items.write().await;
        match items.iter_mut().find(|a| a.id == id) {
            Some(artifact) => {
                artifact.remote_locator = Some(locator.to_string());
            }
            None => {
                debug!(
                    artifact_id = %id,
                    "Upload completed for an artifact no longer in the batch; discarding"
                );
            }
        }
    }

    /// Restore a previously captured artifact (e.g. app restart with
    /// items still local) without triggering an upload.
    pub async fn restore(&self, artifact: EvidenceArtifact) {
        let mut items = self.items.write().await;
        items.push(artifact);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{new_artifact_id, ResourceHandle};
    use crate::config::UploadConfig;
    use crate::error::{FetchError, MetadataError, StoreError};
    use crate::fetch::{FetchStrategy, ResourceFetcher};
    use crate::metadata::{EvidenceDocument, MetadataStore};
    use crate::store::ArtifactStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_test::assert_ok;

    /// Echoes the handle path back as bytes so each artifact fetches
    /// successfully without touching a filesystem.
    struct EchoFetch;

    #[async_trait]
    impl FetchStrategy for EchoFetch {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn fetch(&self, handle: &ResourceHandle) -> Result<Vec<u8>, FetchError> {
            Ok(handle.as_str().as_bytes().to_vec())
        }
    }

    /// Fails puts whose tags carry a rejected artifact id; rejection
    /// can be cleared to emulate the store recovering. Optional
    /// latency for mid-flight tests.
    struct SelectiveStore {
        reject_artifact: Mutex<Option<String>>,
        delay: Option<Duration>,
        puts: Mutex<Vec<String>>,
    }

    impl SelectiveStore {
        fn accepting() -> Self {
            Self {
                reject_artifact: Mutex::new(None),
                delay: None,
                puts: Mutex::new(Vec::new()),
            }
        }

        fn rejecting(artifact_id: &str) -> Self {
            Self {
                reject_artifact: Mutex::new(Some(artifact_id.to_string())),
                ..Self::accepting()
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::accepting()
            }
        }

        fn recover(&self) {
            self.reject_artifact.lock().unwrap().take();
        }
    }

    #[async_trait]
    impl ArtifactStore for SelectiveStore {
        async fn put(
            &self,
            key: &str,
            _bytes: Vec<u8>,
            _content_type: &str,
            tags: &BTreeMap<String, String>,
        ) -> Result<String, StoreError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let rejected = self.reject_artifact.lock().unwrap().clone();
            if let (Some(rejected), Some(artifact_id)) = (rejected, tags.get("artifact-id")) {
                if &rejected == artifact_id {
                    return Err(StoreError::Network("unreachable".into()));
                }
            }
            self.puts.lock().unwrap().push(key.to_string());
            Ok(format!("https://fake.store/{key}"))
        }
    }

    struct NullMetadata;

    #[async_trait]
    impl MetadataStore for NullMetadata {
        async fn put(
            &self,
            _doc_id: &str,
            _document: &EvidenceDocument,
        ) -> Result<(), MetadataError> {
            Ok(())
        }
    }

    fn artifact(handle: &str) -> EvidenceArtifact {
        let now = Utc::now();
        EvidenceArtifact {
            id: new_artifact_id(now),
            local_handle: ResourceHandle::from(handle),
            remote_locator: None,
            latitude: 18.5204,
            longitude: 73.8567,
            accuracy_m: 4.5,
            captured_at: now,
            captured_local_display: "15 Jan 2024, 04:00 pm".to_string(),
            location_code: crate::geocode::encode(18.5204, 73.8567),
        }
    }

    fn batch_with(store: Arc<dyn ArtifactStore>) -> EvidenceBatch {
        let fetcher = ResourceFetcher::with_strategies(
            vec![Box::new(EchoFetch)],
            Duration::from_secs(15),
        );
        let coordinator = Arc::new(UploadCoordinator::new(
            fetcher,
            store,
            Arc::new(NullMetadata),
            UploadConfig::default(),
            "claims",
        ));
        EvidenceBatch::new(coordinator, 4)
    }

    #[tokio::test]
    async fn test_add_uploads_and_marks_status() {
        let batch = batch_with(Arc::new(SelectiveStore::accepting()));

        let locator = assert_ok!(batch.add(artifact("/cache/a.jpg")).await);
        assert!(locator.starts_with("https://fake.store/claims/"));

        let rows = batch.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, UploadStatus::Uploaded);
        assert_eq!(rows[0].thumbnail_source, locator);
    }

    #[tokio::test]
    async fn test_failed_add_keeps_artifact_local() {
        let a = artifact("/cache/a.jpg");
        let batch = batch_with(Arc::new(SelectiveStore::rejecting(&a.id)));

        let result = batch.add(a).await;
        assert!(result.is_err());

        let rows = batch.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, UploadStatus::Local);
        assert_eq!(rows[0].thumbnail_source, "/cache/a.jpg");
    }

    #[tokio::test]
    async fn test_partial_submission_flow() {
        let failing = artifact("/cache/c.jpg");
        let failing_id = failing.id.clone();
        let batch = batch_with(Arc::new(SelectiveStore::rejecting(&failing_id)));

        assert_ok!(batch.add(artifact("/cache/a.jpg")).await);
        assert_ok!(batch.add(artifact("/cache/b.jpg")).await);
        let _ = batch.add(failing).await;

        match batch.submit().await {
            SubmitOutcome::Unresolved {
                uploaded_locators,
                pending_ids,
            } => {
                assert_eq!(uploaded_locators.len(), 2);
                assert_eq!(pending_ids, vec![failing_id.clone()]);
            }
            other => panic!("expected Unresolved, got {other:?}"),
        }

        // "Submit anyway": exactly the two uploaded locators.
        let partial = batch.submit_uploaded().await;
        assert_eq!(partial.len(), 2);

        // "Retry": only the one unresolved item is re-attempted.
        let results = batch.retry_failed().await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, failing_id);
    }

    #[tokio::test]
    async fn test_retry_succeeds_once_store_recovers() {
        let failing = artifact("/cache/c.jpg");
        let failing_id = failing.id.clone();

        let store = Arc::new(SelectiveStore::rejecting(&failing_id));
        let batch = batch_with(store.clone());

        let _ = batch.add(failing).await;
        assert!(matches!(
            batch.submit().await,
            SubmitOutcome::Unresolved { .. }
        ));

        store.recover();

        let results = batch.retry_failed().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].1.is_ok());

        match batch.submit().await {
            SubmitOutcome::Ready { locators } => assert_eq!(locators.len(), 1),
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_retry_failure_does_not_block_other_items() {
        let bad = artifact("/cache/bad.jpg");
        let bad_id = bad.id.clone();
        let good = artifact("/cache/good.jpg");
        let good_id = good.id.clone();

        let batch = batch_with(Arc::new(SelectiveStore::rejecting(&bad_id)));
        batch.restore(bad).await;
        batch.restore(good).await;

        let results = batch.retry_failed().await;
        assert_eq!(results.len(), 2);

        let by_id: std::collections::HashMap<_, _> =
            results.iter().map(|(id, r)| (id.clone(), r.is_ok())).collect();
        assert!(!by_id[&bad_id]);
        assert!(by_id[&good_id]);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let batch = batch_with(Arc::new(SelectiveStore::accepting()));
        let a = artifact("/cache/a.jpg");
        let id = a.id.clone();

        assert_ok!(batch.add(a).await);
        assert_eq!(batch.len().await, 1);

        batch.remove(&id).await;
        assert!(batch.is_empty().await);

        // Absent id: no-op, no error.
        batch.remove(&id).await;
        batch.remove("never-existed").await;
        assert!(batch.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mid_upload_removal_discards_result() {
        let store = Arc::new(SelectiveStore::slow(Duration::from_secs(5)));
        let batch = Arc::new(batch_with(store));

        let slow = artifact("/cache/slow.jpg");
        let slow_id = slow.id.clone();
        let keeper = artifact("/cache/keep.jpg");
        let keeper_id = keeper.id.clone();
        batch.restore(keeper).await;

        let uploader = {
            let batch = batch.clone();
            tokio::spawn(async move { batch.add(slow).await })
        };

        // Let the upload get in flight, then remove the artifact.
        tokio::task::yield_now().await;
        batch.remove(&slow_id).await;

        // The in-flight upload completes; its result must be discarded
        // without touching any other artifact.
        let result = uploader.await.unwrap();
        assert!(result.is_ok());

        let rows = batch.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, keeper_id);
        assert_eq!(rows[0].status, UploadStatus::Local);
    }

    #[tokio::test]
    async fn test_empty_batch_is_submit_ready() {
        let batch = batch_with(Arc::new(SelectiveStore::accepting()));
        match batch.submit().await {
            SubmitOutcome::Ready { locators } => assert!(locators.is_empty()),
            other => panic!("expected Ready, got {other:?}"),
        }
    }
}
