//! Evidence Pipeline
//!
//! Geotagged claim-evidence capture-and-upload pipeline: turns a locally
//! captured photo plus a GPS fix into a durably stored, uniquely
//! identified evidence artifact with structured metadata, under
//! unreliable connectivity and partially failing storage backends.
//!
//! ## Features
//!
//! - **Deterministic geocoding**: short location codes computed once at
//!   capture, stable across retries
//! - **Two-strategy byte acquisition**: streaming read with a raw
//!   transfer fallback, each time-bounded
//! - **Timed blob upload**: the store put races a hard timeout; late
//!   results are dropped, never awaited
//! - **Best-effort metadata**: bounded retry with fixed delay; losing
//!   the document never fails the upload, losing the photo would
//! - **Partial-failure-aware batches**: per-artifact status tracking,
//!   independent retry, explicit partial submission
//!
//! ## Architecture
//!
//! ```text
//! Capture device             S3 Bucket                 PostgreSQL
//! ┌──────────────┐          ┌──────────────┐          ┌────────────────────┐
//! │ camera +     │          │ claims/      │          │ evidence_documents │
//! │ GPS fix      │          │   {id}_{ts}  │          └────────────────────┘
//! └──────────────┘          └──────────────┘                   ▲
//!        │                         ▲                           │
//!        ▼                         │ timed put            best-effort
//! ┌──────────────┐          ┌──────────────┐          ┌──────────────┐
//! │ Resource     │─────────▶│ Upload       │─────────▶│ Metadata     │
//! │ Fetcher      │  bytes   │ Coordinator  │  locator │ Store        │
//! └──────────────┘          └──────────────┘          └──────────────┘
//!                                  ▲
//!                                  │ add / retry
//!                           ┌──────────────┐
//!                           │ Evidence     │◀──── UI actions
//!                           │ Batch        │────▶ display rows
//!                           └──────────────┘
//! ```

pub mod artifact;
pub mod batch;
pub mod capture;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod geocode;
pub mod metadata;
pub mod retry;
pub mod store;
pub mod telemetry;

use std::sync::Arc;

pub use artifact::{EvidenceArtifact, ResourceHandle, UploadStatus, UNKNOWN_ACCURACY};
pub use batch::{EvidenceBatch, EvidenceRow, SubmitOutcome};
pub use capture::{capture_artifact, CaptureSource, GeoFix};
pub use config::Config;
pub use coordinator::UploadCoordinator;
pub use error::{CaptureError, FetchError, MetadataError, StoreError, UploadError};
pub use fetch::{FetchStrategy, ResourceFetcher};
pub use metadata::{EvidenceDocument, MetadataStore, PgMetadataStore};
pub use store::{ArtifactStore, S3ArtifactStore};

/// Wire the pipeline against the real S3 and PostgreSQL backends and
/// hand back a ready batch. The host application loads `Config`,
/// initializes telemetry, and calls this once per claim session.
pub async fn build_pipeline(config: &Config) -> anyhow::Result<EvidenceBatch> {
    let store = Arc::new(S3ArtifactStore::new(&config.store).await?);

    let metadata = Arc::new(PgMetadataStore::new(&config.metadata).await?);
    if config.metadata.run_migrations {
        metadata.run_migrations().await?;
    }

    let fetcher = ResourceFetcher::new(&config.upload);
    let coordinator = Arc::new(UploadCoordinator::new(
        fetcher,
        store,
        metadata,
        config.upload.clone(),
        config.store.key_prefix.clone(),
    ));

    Ok(EvidenceBatch::new(
        coordinator,
        config.upload.retry_concurrency,
    ))
}
