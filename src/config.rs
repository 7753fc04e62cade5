use serde::Deserialize;
use std::time::Duration;

/// Main configuration for the evidence pipeline.
///
/// Everything tunable is explicit here and injected at construction;
/// nothing is read from ambient global state, so tests can run with
/// fakes and fixed values.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Blob store configuration
    pub store: StoreConfig,
    /// Metadata document store configuration
    pub metadata: MetadataConfig,
    /// Upload orchestration configuration
    #[serde(default)]
    pub upload: UploadConfig,
    /// Capture enrichment configuration
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// S3-compatible blob store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Bucket name for evidence objects
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
    /// Key namespace prefix for evidence objects
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

/// Metadata document store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Run migrations on startup
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

/// Upload orchestration configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Hard bound on the blob put, in seconds
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,
    /// Per-strategy bound on byte acquisition, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Attempts for the best-effort metadata write
    #[serde(default = "default_metadata_attempts")]
    pub metadata_attempts: u32,
    /// Fixed delay between metadata write attempts, in seconds
    #[serde(default = "default_metadata_retry_delay_secs")]
    pub metadata_retry_delay_secs: u64,
    /// Concurrency limit for batch retry
    #[serde(default = "default_retry_concurrency")]
    pub retry_concurrency: usize,
}

/// Capture enrichment configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Fixed reporting timezone offset from UTC, in minutes. Display
    /// timestamps are rendered in this offset at capture time and never
    /// recomputed.
    #[serde(default = "default_reporting_offset_minutes")]
    pub reporting_offset_minutes: i32,
    /// Scale factor for location-code encoding
    #[serde(default = "default_geocode_scale")]
    pub geocode_scale: f64,
}

// Default value functions
fn default_region() -> String {
    "ap-south-1".to_string()
}

fn default_key_prefix() -> String {
    "claims".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_run_migrations() -> bool {
    true
}

fn default_store_timeout_secs() -> u64 {
    30
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

fn default_metadata_attempts() -> u32 {
    3
}

fn default_metadata_retry_delay_secs() -> u64 {
    1
}

fn default_retry_concurrency() -> usize {
    4
}

fn default_reporting_offset_minutes() -> i32 {
    330 // IST (+05:30), the claims reporting timezone
}

fn default_geocode_scale() -> f64 {
    crate::geocode::DEFAULT_SCALE
}

impl Config {
    /// Load configuration from config files and environment.
    /// `EVIDENCE__STORE__BUCKET` overrides `store.bucket`, etc.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/evidence").required(false))
            .add_source(config::File::with_name("/etc/claims/evidence").required(false))
            .add_source(
                config::Environment::with_prefix("EVIDENCE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }
}

impl UploadConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn metadata_retry_delay(&self) -> Duration {
        Duration::from_secs(self.metadata_retry_delay_secs)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            store_timeout_secs: default_store_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            metadata_attempts: default_metadata_attempts(),
            metadata_retry_delay_secs: default_metadata_retry_delay_secs(),
            retry_concurrency: default_retry_concurrency(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            reporting_offset_minutes: default_reporting_offset_minutes(),
            geocode_scale: default_geocode_scale(),
        }
    }
}
