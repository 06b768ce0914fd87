use std::{pin::Pin, sync::Arc, time::Duration};

use alloy::{network::Network, providers::RootProvider};

use crate::{
    error::LogIndexError,
    log_index::rpc::{IntoRootProvider, RpcLogIndex},
};

type BoxedProviderFuture<N> =
    Pin<Box<dyn Future<Output = Result<RootProvider<N>, LogIndexError>> + Send>>;

/// Default total timeout of one RPC call, retries included.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);
/// Default maximum number of retry attempts per provider.
pub const DEFAULT_MAX_RETRIES: usize = 3;
/// Default base delay between retries.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(1);

/// Builder for [`RpcLogIndex`].
pub struct RpcLogIndexBuilder<N: Network, P: IntoRootProvider<N>> {
    primary: P,
    fallbacks: Vec<BoxedProviderFuture<N>>,
    call_timeout: Duration,
    max_retries: usize,
    min_delay: Duration,
    lookback_blocks: Option<u64>,
}

impl<N: Network, P: IntoRootProvider<N>> RpcLogIndexBuilder<N, P> {
    /// Starts a builder around `provider` with the default timeout and retry settings.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            primary: provider,
            fallbacks: vec![],
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay: DEFAULT_MIN_DELAY,
            lookback_blocks: None,
        }
    }

    /// Like [`new`](Self::new) but without retries; only the call timeout applies.
    #[must_use]
    pub fn fragile(provider: P) -> Self {
        Self::new(provider).max_retries(0).min_delay(Duration::ZERO)
    }

    /// Adds a provider to try, in insertion order, after the primary fails.
    #[must_use]
    pub fn fallback<F: IntoRootProvider<N> + Send + 'static>(mut self, provider: F) -> Self {
        self.fallbacks.push(Box::pin(provider.into_root_provider()));
        self
    }

    /// Sets the total time one call may take on a provider, retries included.
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Sets how many times a failed call is retried on the same provider.
    #[must_use]
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the first backoff delay; later retries back off exponentially from it.
    #[must_use]
    pub fn min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }

    /// Limits lookups to the `blocks` blocks below the confirmed head.
    ///
    /// Without a lookback every lookup scans from genesis, which some nodes refuse.
    #[must_use]
    pub fn lookback_blocks(mut self, blocks: u64) -> Self {
        self.lookback_blocks = Some(blocks);
        self
    }

    /// Connects the providers and returns the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the primary or any fallback provider fails to connect.
    pub async fn build(self) -> Result<RpcLogIndex<N>, LogIndexError> {
        debug!(
            call_timeout_ms = self.call_timeout.as_millis(),
            max_retries = self.max_retries,
            fallback_count = self.fallbacks.len(),
            "Building RpcLogIndex"
        );

        let primary = self.primary.into_root_provider().await?;

        let mut fallbacks = Vec::with_capacity(self.fallbacks.len());
        for fallback in self.fallbacks {
            fallbacks.push(fallback.await?);
        }

        info!(fallback_count = fallbacks.len(), "RpcLogIndex connected");

        Ok(RpcLogIndex {
            primary,
            fallbacks,
            call_timeout: self.call_timeout,
            max_retries: self.max_retries,
            min_delay: self.min_delay,
            lookback_blocks: self.lookback_blocks,
            filters: Arc::default(),
        })
    }
}
