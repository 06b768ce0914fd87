//! Detection of keeper work that has already been performed on-chain.
//!
//! Each time the registry performs an upkeep it emits `DedupKeyAdded(dedupKey)` with the work id
//! as the indexed topic. [`PerformedEventsScanner`] registers a filter for that event with a
//! [`LogIndex`] and answers "which of these work ids were performed?" with a single batched
//! lookup, counting only logs buried under at least the configured finality depth.
//!
//! The scanner holds no mutable state. It can be shared between tasks and called concurrently,
//! and any number of scanners may watch the same registry: they all register the same filter
//! name, which the index treats as one filter.
//!
//! ```rust
//! use alloy::primitives::address;
//! use performed_work_scanner::{InMemoryLogIndex, PerformedEventsScanner};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let registry = address!("0x00000000000000000000000000000000000000aa");
//! let scanner =
//!     PerformedEventsScanner::builder(registry).finality_depth(1).build(InMemoryLogIndex::new());
//!
//! scanner.start().await?;
//! let performed = scanner.scan_work_ids(&["0x01", "0x02"]).await?;
//! assert!(performed.is_empty());
//! # Ok(()) }
//! ```

use std::{collections::HashSet, time::Duration};

use alloy::{primitives::Address, sol_types::SolEvent};
use tokio_util::sync::CancellationToken;

use crate::{
    DedupKeyAdded,
    error::{LogIndexError, ScannerError},
    log_index::{Filter, LogIndex, filter_name},
    types::{LogRecord, Topic, WorkId},
};

mod builder;

pub use builder::PerformedEventsScannerBuilder;

/// Purpose string the dedup filter name is derived from.
pub const DEDUP_FILTER_PURPOSE: &str = "KeepersRegistry UpkeepStates Deduped";
/// How long the log index is asked to keep `DedupKeyAdded` logs.
pub const LOG_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);
/// Finality depth used when none is configured.
pub const DEFAULT_FINALITY_DEPTH: u64 = 0;
/// Position of the work id among a `DedupKeyAdded` log's topics.
pub const WORK_ID_TOPIC_INDEX: usize = 1;

/// Scans `DedupKeyAdded` logs of one registry to find performed work ids.
#[derive(Clone, Debug)]
pub struct PerformedEventsScanner<L> {
    log_index: L,
    registry_address: Address,
    finality_depth: u64,
    retention: Duration,
}

impl PerformedEventsScanner<()> {
    /// Starts configuring a scanner for the registry at `registry_address`.
    #[must_use]
    pub fn builder(registry_address: Address) -> PerformedEventsScannerBuilder {
        PerformedEventsScannerBuilder::new(registry_address)
    }
}

impl<L: LogIndex> PerformedEventsScanner<L> {
    /// Creates a scanner with the default retention.
    #[must_use]
    pub fn new(log_index: L, registry_address: Address, finality_depth: u64) -> Self {
        PerformedEventsScannerBuilder::new(registry_address)
            .finality_depth(finality_depth)
            .build(log_index)
    }

    /// The registry whose `DedupKeyAdded` logs are scanned.
    #[must_use]
    pub fn registry_address(&self) -> Address {
        self.registry_address
    }

    /// Confirmations a log needs before [`performed`](Self::performed) reports it.
    #[must_use]
    pub fn finality_depth(&self) -> u64 {
        self.finality_depth
    }

    /// The index lookups are sent to.
    #[must_use]
    pub fn log_index(&self) -> &L {
        &self.log_index
    }

    /// The filter [`start`](Self::start) registers.
    #[must_use]
    pub fn filter(&self) -> Filter {
        Filter {
            name: filter_name(DEDUP_FILTER_PURPOSE, self.registry_address),
            event_signatures: vec![DedupKeyAdded::SIGNATURE_HASH],
            addresses: vec![self.registry_address],
            retention: self.retention,
        }
    }

    /// Registers the dedup filter with the log index.
    ///
    /// Safe to call any number of times: the filter is the same on every call.
    ///
    /// # Errors
    ///
    /// Returns [`ScannerError::Registration`] if the index rejects the filter. The call is not
    /// retried.
    pub async fn start(&self) -> Result<(), ScannerError> {
        let filter = self.filter();
        let name = filter.name.clone();

        if let Err(source) = self.log_index.register_filter(filter).await {
            error!(name = %name, error = %source, "Failed to register dedup filter");
            return Err(ScannerError::Registration { name, address: self.registry_address, source });
        }

        info!(name = %name, registry = %self.registry_address, "Dedup filter registered");
        Ok(())
    }

    /// Returns the subset of `work_ids` with a `DedupKeyAdded` log at least
    /// [`finality_depth`](Self::finality_depth) blocks deep.
    ///
    /// # Errors
    ///
    /// Returns [`ScannerError::Query`] if the log index lookup fails.
    pub async fn performed(&self, work_ids: &[WorkId]) -> Result<Vec<WorkId>, ScannerError> {
        self.performed_at_depth(work_ids, self.finality_depth).await
    }

    /// Like [`performed`](Self::performed) with a finality depth for this call only.
    ///
    /// Duplicate inputs are looked up once. The result follows the order the index returned
    /// the logs in, without duplicates, and never contains an id that was not asked for. An
    /// empty input returns an empty result without touching the index.
    ///
    /// # Errors
    ///
    /// Returns [`ScannerError::Query`] if the log index lookup fails.
    pub async fn performed_at_depth(
        &self,
        work_ids: &[WorkId],
        finality_depth: u64,
    ) -> Result<Vec<WorkId>, ScannerError> {
        let mut requested = HashSet::with_capacity(work_ids.len());
        let topics: Vec<Topic> =
            work_ids.iter().map(WorkId::topic).filter(|topic| requested.insert(*topic)).collect();
        if topics.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            registry = %self.registry_address,
            work_ids = topics.len(),
            finality_depth = finality_depth,
            "Looking up performed work"
        );

        let logs = self
            .log_index
            .indexed_logs(
                DedupKeyAdded::SIGNATURE_HASH,
                self.registry_address,
                WORK_ID_TOPIC_INDEX,
                &topics,
                finality_depth,
            )
            .await
            .map_err(|source| {
                warn!(registry = %self.registry_address, error = %source, "Error fetching logs");
                ScannerError::Query { address: self.registry_address, source }
            })?;

        Ok(logs_to_work_ids(&logs, &requested))
    }

    /// String form of [`performed`](Self::performed).
    ///
    /// Inputs are hex with or without `0x`, in any case. Outputs are lowercase hex without a
    /// prefix.
    ///
    /// # Errors
    ///
    /// * [`ScannerError::InvalidWorkId`] for the first input that does not parse. Nothing is
    ///   looked up in that case.
    /// * [`ScannerError::Query`] if the log index lookup fails.
    pub async fn scan_work_ids<S: AsRef<str>>(
        &self,
        work_ids: &[S],
    ) -> Result<Vec<String>, ScannerError> {
        let ids = work_ids
            .iter()
            .map(|raw| {
                let raw = raw.as_ref();
                raw.parse::<WorkId>().map_err(|source| ScannerError::InvalidWorkId {
                    input: raw.to_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let performed = self.performed(&ids).await?;
        Ok(performed.iter().map(ToString::to_string).collect())
    }

    /// [`scan_work_ids`](Self::scan_work_ids) that gives up as soon as `cancel` fires.
    ///
    /// The in-flight lookup is dropped on cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`ScannerError::Query`] with [`LogIndexError::Cancelled`] when cancelled, and
    /// otherwise the errors of [`scan_work_ids`](Self::scan_work_ids).
    pub async fn scan_work_ids_until_cancelled<S: AsRef<str>>(
        &self,
        cancel: &CancellationToken,
        work_ids: &[S],
    ) -> Result<Vec<String>, ScannerError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(registry = %self.registry_address, "Performed work lookup cancelled");
                Err(ScannerError::Query {
                    address: self.registry_address,
                    source: LogIndexError::Cancelled,
                })
            }
            result = self.scan_work_ids(work_ids) => result,
        }
    }

    /// Ends the scanner's life.
    ///
    /// The scanner owns no connections, tasks or buffers; the log index handle is released by
    /// dropping it. Dropping the scanner is equivalent.
    #[allow(clippy::needless_pass_by_value)]
    pub fn close(self) {}
}

fn logs_to_work_ids(logs: &[LogRecord], requested: &HashSet<Topic>) -> Vec<WorkId> {
    let mut seen = HashSet::with_capacity(logs.len());
    let mut work_ids = Vec::with_capacity(logs.len());

    for log in logs {
        let Some(work_id) = log.work_id() else {
            debug!(topics = ?log.topics, block_number = log.block_number, "Unexpected log topics");
            continue;
        };
        if !requested.contains(&work_id.topic()) {
            debug!(work_id = %work_id, "Log index returned a work id that was not requested");
            continue;
        }
        if seen.insert(work_id) {
            work_ids.push(work_id);
        }
    }
    work_ids
}
