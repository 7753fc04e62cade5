use crate::artifact::{new_artifact_id, EvidenceArtifact, ResourceHandle, UNKNOWN_ACCURACY};
use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::geocode;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, instrument};

/// One GPS fix from the location collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters; `None` when the platform gave no estimate.
    pub accuracy_m: Option<f64>,
    pub fixed_at: DateTime<Utc>,
}

/// The camera + location collaborator boundary.
///
/// Camera and location run as two independent asynchronous operations;
/// the pipeline joins them before constructing an artifact. Permission
/// denial and cancellation are expected results, not panics, and when
/// either operation fails no artifact is created.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Take the photo; resolves to the platform resource handle.
    async fn capture_image(&self) -> Result<ResourceHandle, CaptureError>;

    /// Acquire the current GPS fix.
    async fn acquire_fix(&self) -> Result<GeoFix, CaptureError>;
}

/// Run one capture: join photo and fix, then build the artifact record
/// with its id, location code, and both timestamp renderings. All
/// capture-time enrichment happens here, exactly once; retries reuse
/// the stored values.
#[instrument(skip(source, config))]
pub async fn capture_artifact(
    source: &dyn CaptureSource,
    config: &CaptureConfig,
) -> Result<EvidenceArtifact, CaptureError> {
    let (handle, fix) = tokio::try_join!(source.capture_image(), source.acquire_fix())?;

    let captured_at = Utc::now();
    let artifact = EvidenceArtifact {
        id: new_artifact_id(captured_at),
        local_handle: handle,
        remote_locator: None,
        latitude: fix.latitude,
        longitude: fix.longitude,
        accuracy_m: fix.accuracy_m.unwrap_or(UNKNOWN_ACCURACY),
        captured_at,
        captured_local_display: render_reporting_display(
            captured_at,
            config.reporting_offset_minutes,
        ),
        location_code: geocode::encode_scaled(fix.latitude, fix.longitude, config.geocode_scale),
    };

    debug!(
        artifact_id = %artifact.id,
        location_code = %artifact.location_code,
        accuracy_m = artifact.accuracy_m,
        "Artifact captured"
    );

    Ok(artifact)
}

/// Render the capture instant in the fixed reporting timezone. Falls
/// back to UTC if the configured offset is out of range.
fn render_reporting_display(instant: DateTime<Utc>, offset_minutes: i32) -> String {
    let offset = FixedOffset::east_opt(offset_minutes * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
    instant
        .with_timezone(&offset)
        .format("%d %b %Y, %I:%M %P")
        .to_string()
}
