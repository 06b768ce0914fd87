use std::{collections::HashMap, time::Duration};

use alloy::{primitives::Address, sol_types::SolEvent};
use tokio::sync::RwLock;

use crate::{
    DedupKeyAdded, LogIndexError, WorkId,
    log_index::{Filter, LogIndex, check_topic_index},
    types::{LogRecord, Topic},
};

/// A [`LogIndex`] held entirely in memory.
///
/// Filters and logs are stored as given and queries are answered with the same rules a real
/// index applies: only logs covered by a registered filter are served, and a log in block `b`
/// is returned once `b + confirmations <= head`. Failures, latency and verbatim responses can
/// be scripted for tests.
#[derive(Debug, Default)]
pub struct InMemoryLogIndex {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    filters: HashMap<String, Filter>,
    logs: Vec<LogRecord>,
    head: u64,
    registration_failure: Option<String>,
    query_failure: Option<String>,
    query_delay: Option<Duration>,
    scripted: Option<Vec<LogRecord>>,
    queries: usize,
}

impl InMemoryLogIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chain head used for confirmation counting.
    pub async fn set_head(&self, head: u64) {
        self.state.write().await.head = head;
    }

    /// Stores `log` as is, without checking it against registered filters.
    pub async fn insert_log(&self, log: LogRecord) {
        self.state.write().await.logs.push(log);
    }

    /// Stores a `DedupKeyAdded` log for `work_id` emitted by `address` in `block_number`.
    pub async fn insert_dedup_key(&self, address: Address, work_id: WorkId, block_number: u64) {
        let mut state = self.state.write().await;
        let log_index = state.logs.len() as u64;
        state.logs.push(dedup_key_log(address, work_id, block_number, log_index));
    }

    /// Every query from now on returns exactly `logs`, bypassing matching.
    pub async fn script_response(&self, logs: Vec<LogRecord>) {
        self.state.write().await.scripted = Some(logs);
    }

    /// Makes every registration fail with [`LogIndexError::Unavailable`] until [`recover`].
    ///
    /// [`recover`]: Self::recover
    pub async fn fail_registrations(&self, reason: impl Into<String>) {
        self.state.write().await.registration_failure = Some(reason.into());
    }

    /// Makes every query fail with [`LogIndexError::Unavailable`] until [`recover`].
    ///
    /// [`recover`]: Self::recover
    pub async fn fail_queries(&self, reason: impl Into<String>) {
        self.state.write().await.query_failure = Some(reason.into());
    }

    /// Makes every query wait `delay` before answering.
    pub async fn delay_queries(&self, delay: Duration) {
        self.state.write().await.query_delay = Some(delay);
    }

    /// Clears scripted failures and delays.
    pub async fn recover(&self) {
        let mut state = self.state.write().await;
        state.registration_failure = None;
        state.query_failure = None;
        state.query_delay = None;
    }

    /// Registered filters, sorted by name.
    pub async fn filters(&self) -> Vec<Filter> {
        let mut filters: Vec<_> = self.state.read().await.filters.values().cloned().collect();
        filters.sort_by(|a, b| a.name.cmp(&b.name));
        filters
    }

    /// Number of `indexed_logs` calls that reached the index.
    pub async fn query_count(&self) -> usize {
        self.state.read().await.queries
    }
}

impl LogIndex for InMemoryLogIndex {
    async fn register_filter(&self, filter: Filter) -> Result<(), LogIndexError> {
        let mut state = self.state.write().await;
        if let Some(reason) = &state.registration_failure {
            return Err(LogIndexError::Unavailable(reason.clone()));
        }
        filter.validate()?;

        if state.filters.get(&filter.name) == Some(&filter) {
            debug!(name = %filter.name, "Filter already registered");
            return Ok(());
        }
        info!(name = %filter.name, "Registering filter");
        state.filters.insert(filter.name.clone(), filter);
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
        let delay = self.state.read().await.query_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;
        state.queries += 1;

        if let Some(reason) = &state.query_failure {
            return Err(LogIndexError::Unavailable(reason.clone()));
        }
        if !state.filters.values().any(|filter| filter.covers(event, address)) {
            return Err(LogIndexError::FilterNotRegistered { event, address });
        }
        check_topic_index(topic_index)?;
        if let Some(scripted) = &state.scripted {
            return Ok(scripted.clone());
        }

        let head = state.head;
        trace!(
            topic_index = topic_index,
            value_count = topic_values.len(),
            confirmations = confirmations,
            head = head,
            "Answering indexed lookup"
        );
        Ok(state
            .logs
            .iter()
            .filter(|log| {
                log.address == address &&
                    log.topics.first() == Some(&event) &&
                    log.topics.get(topic_index).is_some_and(|topic| topic_values.contains(topic)) &&
                    log.block_number.saturating_add(confirmations) <= head
            })
            .cloned()
            .collect())
    }
}

/// Builds the log a registry emits when it records `work_id`.
#[must_use]
pub fn dedup_key_log(
    address: Address,
    work_id: WorkId,
    block_number: u64,
    log_index: u64,
) -> LogRecord {
    LogRecord {
        address,
        topics: vec![DedupKeyAdded::SIGNATURE_HASH, work_id.topic()],
        block_number,
        log_index,
        transaction_hash: None,
    }
}
