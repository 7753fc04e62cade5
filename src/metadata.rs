use crate::config::MetadataConfig;
use crate::error::MetadataError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Structured metadata written alongside a stored evidence object.
///
/// The document id equals the storage key used for the blob, for
/// traceability between the two stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceDocument {
    /// Artifact id as assigned at capture
    pub artifact_id: String,
    /// Locator returned by the blob store
    pub uri: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Meters, −1.0 when unknown
    pub accuracy_m: f64,
    pub captured_at: DateTime<Utc>,
    /// Display rendering fixed at capture time
    pub captured_local_display: String,
    pub location_code: String,
    pub size_bytes: i64,
    pub content_type: String,
}

/// Document store keyed by the blob storage key.
///
/// Writes through this boundary are best-effort from the pipeline's
/// point of view: the coordinator retries a bounded number of times and
/// then accepts the loss, because the blob is already durable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn put(&self, doc_id: &str, document: &EvidenceDocument) -> Result<(), MetadataError>;
}

/// PostgreSQL-backed metadata store.
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    /// Create a new metadata store with connection pool.
    pub async fn new(config: &MetadataConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        info!("Connected to metadata database");

        Ok(Self { pool })
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Metadata store migrations completed");
        Ok(())
    }

    /// Get the connection pool (for host-owned health checks).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    #[instrument(skip(self, document), fields(doc_id = %doc_id, artifact_id = %document.artifact_id))]
    async fn put(&self, doc_id: &str, document: &EvidenceDocument) -> Result<(), MetadataError> {
        sqlx::query(
            r#"
            INSERT INTO evidence_documents (
                doc_id, artifact_id, uri, latitude, longitude,
                accuracy_m, captured_at, captured_local_display,
                location_code, size_bytes, content_type, created_at
            ) VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8,
                $9, $10, $11, NOW()
            )
            ON CONFLICT (doc_id) DO UPDATE SET
                uri = EXCLUDED.uri,
                size_bytes = EXCLUDED.size_bytes
            "#,
        )
        .bind(doc_id)
        .bind(&document.artifact_id)
        .bind(&document.uri)
        .bind(document.latitude)
        .bind(document.longitude)
        .bind(document.accuracy_m)
        .bind(document.captured_at)
        .bind(&document.captured_local_display)
        .bind(&document.location_code)
        .bind(document.size_bytes)
        .bind(&document.content_type)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                MetadataError::Connection(e.to_string())
            }
            other => MetadataError::Write(other.to_string()),
        })?;

        debug!(doc_id = %doc_id, "Evidence document written");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_document_serializes_with_uri_field() {
        let doc = EvidenceDocument {
            artifact_id: "20240115T103045123-a1b2c3d4".into(),
            uri: "https://bucket.s3.ap-south-1.amazonaws.com/claims/x.jpg".into(),
            latitude: 18.5204,
            longitude: 73.8567,
            accuracy_m: -1.0,
            captured_at: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap(),
            captured_local_display: "15 Jan 2024, 04:00 pm".into(),
            location_code: "K3F9T1+A2".into(),
            size_bytes: 2048,
            content_type: "image/jpeg".into(),
        };

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["uri"], doc.uri);
        assert_eq!(value["location_code"], "K3F9T1+A2");
        assert_eq!(value["accuracy_m"], -1.0);
    }
}
