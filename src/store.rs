use crate::artifact::ResourceHandle;
use crate::config::StoreConfig;
use crate::error::StoreError;
use anyhow::Result;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::put_object::PutObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Durable key→bytes object store for evidence payloads.
///
/// `put` persists the payload under `key` with a content type and
/// per-object tags, and returns the publicly addressable locator for
/// the stored object.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<String, StoreError>;
}

/// S3-backed artifact store.
pub struct S3ArtifactStore {
    client: S3Client,
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
}

impl S3ArtifactStore {
    /// Create a new S3 artifact store.
    pub async fn new(config: &StoreConfig) -> Result<Self> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Force path-style access for MinIO compatibility
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            "S3 artifact store initialized"
        );

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint_url: config.endpoint_url.clone(),
        })
    }

    /// Publicly addressable locator for a stored key: path-style URL
    /// when a custom endpoint is configured, virtual-hosted S3 URL
    /// otherwise.
    pub fn locator_for_key(&self, key: &str) -> String {
        match self.endpoint_url {
            Some(ref endpoint) => {
                format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key)
            }
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            ),
        }
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    #[instrument(skip(self, bytes, tags), fields(key = %key, size_bytes = bytes.len()))]
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<String, StoreError> {
        let size = bytes.len();
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type);

        for (tag_key, tag_value) in tags {
            request = request.metadata(tag_key, tag_value);
        }

        request.send().await.map_err(classify_put_error)?;

        debug!(key = %key, size_bytes = size, "Evidence object stored");

        Ok(self.locator_for_key(key))
    }
}

/// Fold SDK failure shapes into the three caller-relevant classes.
fn classify_put_error(err: SdkError<PutObjectError>) -> StoreError {
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            StoreError::Network(err.to_string())
        }
        SdkError::ServiceError(ctx) => {
            let status = ctx.raw().status().as_u16();
            if status == 401 || status == 403 {
                StoreError::PermissionDenied(err.to_string())
            } else {
                StoreError::Service(err.to_string())
            }
        }
        _ => StoreError::Service(err.to_string()),
    }
}

/// Storage key for one upload attempt.
///
/// The key combines the artifact id with the attempt instant, so
/// retries of the same artifact never collide even if a prior attempt
/// partially succeeded.
/// Format: `{prefix}/{artifact_id}_{attempt_ts}.{ext}`
pub fn attempt_key(
    prefix: &str,
    artifact_id: &str,
    attempted_at: DateTime<Utc>,
    extension: &str,
) -> String {
    format!(
        "{}/{}_{}.{}",
        prefix.trim_end_matches('/'),
        sanitize_path_component(artifact_id),
        attempted_at.format("%Y%m%dT%H%M%S%3fZ"),
        extension
    )
}

/// Sanitize a path component to prevent path traversal
pub fn sanitize_path_component(component: &str) -> String {
    component
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

/// Content type and key extension inferred from the resource handle.
/// Captured photos are JPEG unless the handle says otherwise.
pub fn content_type_for_handle(handle: &ResourceHandle) -> (&'static str, &'static str) {
    let lowered = handle.as_str().to_lowercase();
    match lowered.rsplit('.').next() {
        Some("png") => ("image/png", "png"),
        Some("webp") => ("image/webp", "webp"),
        Some("heic") => ("image/heic", "heic"),
        _ => ("image/jpeg", "jpg"),
    }
}
