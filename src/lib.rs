//! Performed-work deduplication for keeper registries.
//!
//! Several off-chain workers may race to perform the same scheduled upkeep. Once a registry
//! performs one it emits `DedupKeyAdded(dedupKey)`, and [`PerformedEventsScanner`] looks those
//! logs up so a worker can tell which of its candidate work ids were already performed and must
//! not be resubmitted.
//!
//! The scanner owns no storage. Logs are retained and indexed by a [`LogIndex`], which the
//! scanner tells what to keep via [`PerformedEventsScanner::start`] and queries with one
//! batched lookup per [`PerformedEventsScanner::scan_work_ids`] call.
//!
//! # Finality
//!
//! A log only counts once it has at least the configured number of confirmations. Shallower logs
//! may still be reorganized away, so a work id performed in the last few blocks is reported as
//! not performed until it is deep enough; callers should query again later.
//!
//! # Failures
//!
//! Index failures are returned, never retried and never turned into an empty result. An error
//! from [`PerformedEventsScanner::scan_work_ids`] means "unknown", not "not performed".
//!
//! # Log indexes
//!
//! * [`RpcLogIndex`] looks logs up over JSON-RPC with timeouts, retries and failover.
//! * `InMemoryLogIndex` (feature `test-utils`) is a scriptable stub for tests.

#[macro_use]
mod logging;

pub mod log_index;

mod error;
mod performed;
mod types;

pub use error::{LogIndexError, ScannerError, WorkIdError};
pub use log_index::{Filter, LogIndex, RpcLogIndex, RpcLogIndexBuilder, filter_name};
pub use performed::{
    DEDUP_FILTER_PURPOSE, DEFAULT_FINALITY_DEPTH, LOG_RETENTION, PerformedEventsScanner,
    PerformedEventsScannerBuilder, WORK_ID_TOPIC_INDEX,
};
pub use types::{DedupKeyAdded, LogRecord, Topic, WorkId};

#[cfg(any(test, feature = "test-utils"))]
pub use log_index::InMemoryLogIndex;
