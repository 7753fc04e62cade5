use crate::artifact::ResourceHandle;
use crate::config::UploadConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// One way of turning a platform resource handle into raw bytes.
///
/// Freshly captured media is not uniformly readable through every
/// access path; a handle that fails one extraction path may still be
/// readable through another, so the fetcher holds several strategies
/// and falls through them in order.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, handle: &ResourceHandle) -> Result<Vec<u8>, FetchError>;
}

/// High-level streaming read through the async file API.
pub struct StreamingFetch;

#[async_trait]
impl FetchStrategy for StreamingFetch {
    fn name(&self) -> &'static str {
        "streaming"
    }

    async fn fetch(&self, handle: &ResourceHandle) -> Result<Vec<u8>, FetchError> {
        use tokio::io::AsyncReadExt;

        let mut file = tokio::fs::File::open(handle.as_str())
            .await
            .map_err(|e| FetchError::Strategy {
                strategy: "streaming",
                reason: e.to_string(),
            })?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .await
            .map_err(|e| FetchError::Strategy {
                strategy: "streaming",
                reason: e.to_string(),
            })?;

        Ok(bytes)
    }
}

/// Low-level whole-file transfer on the blocking pool. Some handles
/// that refuse an incremental read still serve a single raw read.
pub struct RawTransferFetch;

#[async_trait]
impl FetchStrategy for RawTransferFetch {
    fn name(&self) -> &'static str {
        "raw_transfer"
    }

    async fn fetch(&self, handle: &ResourceHandle) -> Result<Vec<u8>, FetchError> {
        let path = handle.as_str().to_string();

        tokio::task::spawn_blocking(move || std::fs::read(&path))
            .await
            .map_err(|e| FetchError::Strategy {
                strategy: "raw_transfer",
                reason: format!("blocking task failed: {e}"),
            })?
            .map_err(|e| FetchError::Strategy {
                strategy: "raw_transfer",
                reason: e.to_string(),
            })
    }
}

/// Acquires raw bytes for a locally-referenced captured image, trying
/// each strategy in order under a hard time bound.
pub struct ResourceFetcher {
    strategies: Vec<Box<dyn FetchStrategy>>,
    strategy_timeout: Duration,
}

impl ResourceFetcher {
    /// Default strategy order: streaming first, raw transfer as
    /// fallback.
    pub fn new(config: &UploadConfig) -> Self {
        Self::with_strategies(
            vec![Box::new(StreamingFetch), Box::new(RawTransferFetch)],
            config.fetch_timeout(),
        )
    }

    pub fn with_strategies(
        strategies: Vec<Box<dyn FetchStrategy>>,
        strategy_timeout: Duration,
    ) -> Self {
        Self {
            strategies,
            strategy_timeout,
        }
    }

    /// Try each strategy in order. A zero-length result counts as a
    /// failure of that strategy, not a success. Fails with
    /// [`FetchError::Exhausted`] only after every strategy has been
    /// attempted.
    #[instrument(skip(self), fields(handle = %handle.as_str()))]
    pub async fn fetch(&self, handle: &ResourceHandle) -> Result<Vec<u8>, FetchError> {
        let mut reasons: Vec<String> = Vec::new();

        for strategy in &self.strategies {
            let outcome = tokio::time::timeout(self.strategy_timeout, strategy.fetch(handle)).await;

            match outcome {
                Ok(Ok(bytes)) if !bytes.is_empty() => {
                    debug!(
                        strategy = strategy.name(),
                        size_bytes = bytes.len(),
                        "Fetched resource bytes"
                    );
                    return Ok(bytes);
                }
                Ok(Ok(_)) => {
                    warn!(strategy = strategy.name(), "Strategy returned empty payload");
                    reasons.push(format!("{}: empty payload", strategy.name()));
                }
                Ok(Err(err)) => {
                    warn!(strategy = strategy.name(), error = %err, "Strategy failed");
                    reasons.push(format!("{}: {err}", strategy.name()));
                }
                Err(_) => {
                    let err = FetchError::Timeout {
                        strategy: strategy.name(),
                        seconds: self.strategy_timeout.as_secs(),
                    };
                    warn!(strategy = strategy.name(), error = %err, "Strategy timed out");
                    reasons.push(format!("{}: {err}", strategy.name()));
                }
            }
        }

        Err(FetchError::Exhausted {
            reasons: reasons.join("; "),
        })
    }
}
