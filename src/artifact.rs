use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel for a location fix without an accuracy estimate.
pub const UNKNOWN_ACCURACY: f64 = -1.0;

/// Opaque reference to the raw image resource on the capture device.
///
/// The pipeline never interprets the contents; fetch strategies decide
/// how to turn it into bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle(pub String);

impl ResourceHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceHandle {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Upload status of one artifact, derived from the presence of a
/// remote locator rather than stored redundantly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// Captured and held locally; upload pending or failed. Always
    /// safe to retry.
    Local,
    /// Durably persisted in the blob store. Terminal for this
    /// subsystem.
    Uploaded,
}

/// One captured photo plus its geolocation and timing context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceArtifact {
    /// Assigned exactly once at capture; never reused or mutated.
    pub id: String,
    /// Raw image reference, valid until upload supersedes it.
    pub local_handle: ResourceHandle,
    /// Set exactly once by the upload coordinator on success.
    pub remote_locator: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters, or [`UNKNOWN_ACCURACY`] when the fix had no estimate.
    pub accuracy_m: f64,
    pub captured_at: DateTime<Utc>,
    /// Rendered once at capture in the fixed reporting timezone and
    /// stored alongside, so the display stays stable even if the
    /// device clock or timezone changes later.
    pub captured_local_display: String,
    /// Computed once at capture; never recomputed on retry.
    pub location_code: String,
}

impl EvidenceArtifact {
    /// An artifact is `Uploaded` iff it has a remote locator.
    pub fn status(&self) -> UploadStatus {
        if self.remote_locator.is_some() {
            UploadStatus::Uploaded
        } else {
            UploadStatus::Local
        }
    }
}

/// New artifact id: capture instant plus a random suffix, unique within
/// a session.
pub fn new_artifact_id(captured_at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}",
        captured_at.format("%Y%m%dT%H%M%S%3f"),
        &suffix[..8]
    )
}
