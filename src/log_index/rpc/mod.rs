//! A [`LogIndex`] answered directly from a JSON-RPC node.
//!
//! [`RpcLogIndex`] keeps registered filters in memory and serves each lookup with one
//! `eth_blockNumber` and one `eth_getLogs` call. The chain itself is the store, so nothing is
//! persisted and retention is not enforced beyond the optional lookback window.
//!
//! Every RPC call is wrapped in a total timeout and retried with exponential backoff up to
//! `max_retries`. If the primary provider keeps failing the call moves on to the fallback
//! providers in the order they were added, and the last error is returned when all of them fail.
//!
//! ```rust,no_run
//! use performed_work_scanner::{RpcLogIndex, RpcLogIndexBuilder};
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let index: RpcLogIndex = RpcLogIndexBuilder::new("http://localhost:8545")
//!     .fallback("http://localhost:8546")
//!     .call_timeout(Duration::from_secs(10))
//!     .lookback_blocks(100_000)
//!     .build()
//!     .await?;
//! # Ok(()) }
//! ```

use std::{collections::HashMap, sync::Arc, time::Duration};

use alloy::{
    network::{Ethereum, Network},
    primitives::Address,
    providers::{Provider, RootProvider},
    rpc::types::{Filter as RpcFilter, Log},
    transports::{RpcError, TransportErrorKind},
};
use backon::{ExponentialBuilder, Retryable};
use tokio::{sync::RwLock, time::timeout};

use crate::{
    error::LogIndexError,
    log_index::{Filter, LogIndex, check_topic_index},
    types::{LogRecord, Topic},
};

mod builder;
mod conversion;

pub use builder::*;
pub use conversion::IntoRootProvider;

/// A [`LogIndex`] backed by one primary and any number of fallback JSON-RPC providers.
///
/// Built with [`RpcLogIndexBuilder`].
#[derive(Clone, Debug)]
pub struct RpcLogIndex<N: Network = Ethereum> {
    pub(crate) primary: RootProvider<N>,
    pub(crate) fallbacks: Vec<RootProvider<N>>,
    pub(crate) call_timeout: Duration,
    pub(crate) max_retries: usize,
    pub(crate) min_delay: Duration,
    pub(crate) lookback_blocks: Option<u64>,
    pub(crate) filters: Arc<RwLock<HashMap<String, Filter>>>,
}

impl<N: Network> RpcLogIndex<N> {
    /// The provider every call tries first.
    #[must_use]
    pub fn primary(&self) -> &RootProvider<N> {
        &self.primary
    }

    /// Registered filters, sorted by name.
    pub async fn filters(&self) -> Vec<Filter> {
        let mut filters: Vec<_> = self.filters.read().await.values().cloned().collect();
        filters.sort_by(|a, b| a.name.cmp(&b.name));
        filters
    }

    /// Fetches the latest block number.
    ///
    /// # Errors
    ///
    /// See [failover errors](#failover-errors).
    pub async fn head(&self) -> Result<u64, LogIndexError> {
        let result = self
            .with_failover(move |provider| async move { provider.get_block_number().await })
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_blockNumber failed");
        }
        result
    }

    /// Fetches logs for `filter`.
    ///
    /// # Errors
    ///
    /// See [failover errors](#failover-errors).
    pub async fn logs(&self, filter: &RpcFilter) -> Result<Vec<Log>, LogIndexError> {
        let result = self
            .with_failover(move |provider| async move { provider.get_logs(filter).await })
            .await;
        if let Err(e) = &result {
            error!(error = %e, "eth_getLogs failed");
        }
        result
    }

    /// Runs `operation` on the primary provider, then on each fallback until one succeeds.
    ///
    /// # Errors
    /// <a name="failover-errors"></a>
    ///
    /// * [`LogIndexError::Timeout`] if the last provider tried did not answer within
    ///   `call_timeout`.
    /// * [`LogIndexError::RpcError`] with the last provider's error once retries are exhausted.
    async fn with_failover<T, F, Fut>(&self, operation: F) -> Result<T, LogIndexError>
    where
        F: Fn(RootProvider<N>) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let mut last_error = match self.try_provider(&self.primary, &operation).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let total = self.fallbacks.len();
        for (idx, provider) in self.fallbacks.iter().enumerate() {
            debug!(provider_num = idx + 1, total = total, "Trying fallback provider");
            match self.try_provider(provider, &operation).await {
                Ok(value) => {
                    info!(provider_num = idx + 1, "Fallback provider succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(provider_num = idx + 1, error = %e, "Fallback provider failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    async fn try_provider<T, F, Fut>(
        &self,
        provider: &RootProvider<N>,
        operation: F,
    ) -> Result<T, LogIndexError>
    where
        F: Fn(RootProvider<N>) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let backoff = ExponentialBuilder::default()
            .with_max_times(self.max_retries)
            .with_min_delay(self.min_delay);

        timeout(
            self.call_timeout,
            (|| operation(provider.clone()))
                .retry(backoff)
                .notify(|err: &RpcError<TransportErrorKind>, after: Duration| {
                    debug!(error = %err, retry_in_ms = after.as_millis(), "Retrying RPC call");
                })
                .sleep(tokio::time::sleep),
        )
        .await?
        .map_err(LogIndexError::from)
    }
}

impl<N: Network> LogIndex for RpcLogIndex<N> {
    async fn register_filter(&self, filter: Filter) -> Result<(), LogIndexError> {
        filter.validate()?;

        let mut filters = self.filters.write().await;
        if filters.get(&filter.name) == Some(&filter) {
            return Ok(());
        }
        info!(
            name = %filter.name,
            retention_secs = filter.retention.as_secs(),
            "Registered log filter"
        );
        filters.insert(filter.name.clone(), filter);
        Ok(())
    }

    async fn indexed_logs(
        &self,
        event: Topic,
        address: Address,
        topic_index: usize,
        topic_values: &[Topic],
        confirmations: u64,
    ) -> Result<Vec<LogRecord>, LogIndexError> {
        if !self.filters.read().await.values().any(|filter| filter.covers(event, address)) {
            return Err(LogIndexError::FilterNotRegistered { event, address });
        }
        // An empty topic set would act as a wildcard in eth_getLogs.
        if topic_values.is_empty() {
            return Ok(Vec::new());
        }

        let filter = with_topic(
            RpcFilter::new().address(address).event_signature(event),
            topic_index,
            topic_values.to_vec(),
        )?;

        let head = self.head().await?;
        let Some((from_block, to_block)) = block_range(head, confirmations, self.lookback_blocks)
        else {
            debug!(head = head, confirmations = confirmations, "No block is deep enough yet");
            return Ok(Vec::new());
        };
        let filter = filter.from_block(from_block).to_block(to_block);

        let logs = self.logs(&filter).await?;
        debug!(
            log_count = logs.len(),
            from_block = from_block,
            to_block = to_block,
            "Fetched indexed logs"
        );
        Ok(logs.into_iter().map(LogRecord::from).collect())
    }
}

/// Inclusive `(from, to)` block range holding every log with at least `confirmations`
/// confirmations at `head`, or `None` while the chain is shallower than that.
fn block_range(head: u64, confirmations: u64, lookback: Option<u64>) -> Option<(u64, u64)> {
    let to_block = head.checked_sub(confirmations)?;
    let from_block = lookback.map_or(0, |lookback| to_block.saturating_sub(lookback));
    Some((from_block, to_block))
}

fn with_topic(
    filter: RpcFilter,
    topic_index: usize,
    values: Vec<Topic>,
) -> Result<RpcFilter, LogIndexError> {
    check_topic_index(topic_index)?;
    Ok(match topic_index {
        1 => filter.topic1(values),
        2 => filter.topic2(values),
        _ => filter.topic3(values),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DedupKeyAdded;
    use alloy::{
        primitives::{B256, Bytes, LogData, U64, address},
        providers::mock::Asserter,
        rpc::client::RpcClient,
        sol_types::SolEvent,
    };

    const REGISTRY: Address = address!("0x00000000000000000000000000000000000000aa");

    fn mocked(asserter: &Asserter) -> RootProvider {
        RootProvider::new(RpcClient::mocked(asserter.clone()))
    }

    async fn index_over(asserter: &Asserter) -> RpcLogIndex {
        RpcLogIndexBuilder::fragile(mocked(asserter)).build().await.unwrap()
    }

    fn dedup_filter() -> Filter {
        Filter {
            name: "dedup".into(),
            event_signatures: vec![DedupKeyAdded::SIGNATURE_HASH],
            addresses: vec![REGISTRY],
            retention: Duration::from_secs(60),
        }
    }

    fn rpc_log(topics: Vec<B256>, block_number: u64) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: REGISTRY,
                data: LogData::new_unchecked(topics, Bytes::new()),
            },
            block_number: Some(block_number),
            log_index: Some(0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn rejects_invalid_filters() {
        let index = index_over(&Asserter::new()).await;
        let mut filter = dedup_filter();
        filter.addresses.clear();

        let result = index.register_filter(filter).await;
        assert!(matches!(result, Err(LogIndexError::InvalidFilter { .. })));
        assert!(index.filters().await.is_empty());
    }

    #[tokio::test]
    async fn registration_is_idempotent() {
        let index = index_over(&Asserter::new()).await;
        index.register_filter(dedup_filter()).await.unwrap();
        index.register_filter(dedup_filter()).await.unwrap();
        assert_eq!(index.filters().await, vec![dedup_filter()]);
    }

    #[tokio::test]
    async fn unregistered_lookups_fail_without_rpc() {
        let index = index_over(&Asserter::new()).await;
        let result = index
            .indexed_logs(DedupKeyAdded::SIGNATURE_HASH, REGISTRY, 1, &[B256::ZERO], 0)
            .await;
        assert!(matches!(result, Err(LogIndexError::FilterNotRegistered { .. })));
    }

    #[tokio::test]
    async fn empty_topic_values_skip_rpc() {
        let index = index_over(&Asserter::new()).await;
        index.register_filter(dedup_filter()).await.unwrap();
        let logs =
            index.indexed_logs(DedupKeyAdded::SIGNATURE_HASH, REGISTRY, 1, &[], 0).await.unwrap();
        assert!(logs.is_empty());
    }

    #[tokio::test]
    async fn shallow_chain_returns_nothing() {
        let asserter = Asserter::new();
        asserter.push_success(&U64::from(3));

        let index = index_over(&asserter).await;
        index.register_filter(dedup_filter()).await.unwrap();
        let logs = index
            .indexed_logs(DedupKeyAdded::SIGNATURE_HASH, REGISTRY, 1, &[B256::ZERO], 10)
            .await
            .unwrap();
        assert!(logs.is_empty());
    }

    #[tokio::test]
    async fn converts_fetched_logs() {
        let work_id = B256::repeat_byte(7);
        let asserter = Asserter::new();
        asserter.push_success(&U64::from(100));
        asserter.push_success(&vec![rpc_log(vec![DedupKeyAdded::SIGNATURE_HASH, work_id], 90)]);

        let index = index_over(&asserter).await;
        index.register_filter(dedup_filter()).await.unwrap();
        let logs = index
            .indexed_logs(DedupKeyAdded::SIGNATURE_HASH, REGISTRY, 1, &[work_id], 5)
            .await
            .unwrap();

        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].address, REGISTRY);
        assert_eq!(logs[0].block_number, 90);
        assert_eq!(logs[0].topics, vec![DedupKeyAdded::SIGNATURE_HASH, work_id]);
    }

    #[test]
    fn block_range_respects_confirmations() {
        assert_eq!(block_range(3, 10, None), None);
        assert_eq!(block_range(10, 10, None), Some((0, 0)));
        assert_eq!(block_range(10, 10, Some(5)), Some((0, 0)));
        assert_eq!(block_range(100, 5, None), Some((0, 95)));
        assert_eq!(block_range(100, 0, None), Some((0, 100)));
    }

    #[test]
    fn block_range_applies_lookback() {
        assert_eq!(block_range(100, 5, Some(20)), Some((75, 95)));
        assert_eq!(block_range(100, 5, Some(0)), Some((95, 95)));
        assert_eq!(block_range(30, 5, Some(1_000)), Some((0, 25)));
    }

    #[tokio::test]
    async fn head_equal_to_confirmations_still_queries_genesis() {
        let asserter = Asserter::new();
        asserter.push_success(&U64::from(4));
        asserter.push_success(&vec![rpc_log(vec![DedupKeyAdded::SIGNATURE_HASH, B256::ZERO], 0)]);

        let index: RpcLogIndex = RpcLogIndexBuilder::fragile(mocked(&asserter))
            .lookback_blocks(10)
            .build()
            .await
            .unwrap();
        index.register_filter(dedup_filter()).await.unwrap();
        let logs = index
            .indexed_logs(DedupKeyAdded::SIGNATURE_HASH, REGISTRY, 1, &[B256::ZERO], 4)
            .await
            .unwrap();

        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].block_number, 0);
    }

    #[tokio::test]
    async fn unresponsive_provider_times_out() {
        // Accepted by the kernel backlog but never answered.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let index: RpcLogIndex = RpcLogIndexBuilder::fragile(url.as_str())
            .call_timeout(Duration::from_millis(100))
            .build()
            .await
            .unwrap();

        assert!(matches!(index.head().await, Err(LogIndexError::Timeout)));
        drop(listener);
    }

    #[tokio::test]
    async fn rejects_unindexed_topic_positions() {
        let index = index_over(&Asserter::new()).await;
        index.register_filter(dedup_filter()).await.unwrap();
        let result = index
            .indexed_logs(DedupKeyAdded::SIGNATURE_HASH, REGISTRY, 4, &[B256::ZERO], 0)
            .await;
        assert!(matches!(result, Err(LogIndexError::UnsupportedTopicIndex(4))));

        let result = index
            .indexed_logs(DedupKeyAdded::SIGNATURE_HASH, REGISTRY, 0, &[B256::ZERO], 0)
            .await;
        assert!(matches!(result, Err(LogIndexError::UnsupportedTopicIndex(0))));
    }

    #[tokio::test]
    async fn rpc_failure_is_reported() {
        let asserter = Asserter::new();
        asserter.push_failure_msg("node unavailable");

        let index = index_over(&asserter).await;
        index.register_filter(dedup_filter()).await.unwrap();
        let result = index
            .indexed_logs(DedupKeyAdded::SIGNATURE_HASH, REGISTRY, 1, &[B256::ZERO], 0)
            .await;
        assert!(matches!(result, Err(LogIndexError::RpcError(_))));
    }

    #[tokio::test]
    async fn falls_back_when_primary_fails() {
        let primary = Asserter::new();
        primary.push_failure_msg("primary down");
        primary.push_failure_msg("primary down");

        let fallback = Asserter::new();
        fallback.push_success(&U64::from(50));
        fallback.push_success(&vec![rpc_log(vec![DedupKeyAdded::SIGNATURE_HASH, B256::ZERO], 40)]);

        let index: RpcLogIndex = RpcLogIndexBuilder::fragile(mocked(&primary))
            .fallback(mocked(&fallback))
            .build()
            .await
            .unwrap();
        index.register_filter(dedup_filter()).await.unwrap();

        let logs = index
            .indexed_logs(DedupKeyAdded::SIGNATURE_HASH, REGISTRY, 1, &[B256::ZERO], 1)
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
    }
}
