//! The log index capability the scanner queries.
//!
//! A log index ingests chain blocks, keeps the logs that match registered [`Filter`]s for as
//! long as their retention asks, and answers indexed lookups over them. The scanner uses exactly
//! two operations, [`LogIndex::register_filter`] and [`LogIndex::indexed_logs`], so any backend
//! that can provide them can be plugged in:
//!
//! * [`RpcLogIndex`] answers lookups straight from a JSON-RPC node with retries, timeouts and
//!   failover.
//! * `InMemoryLogIndex` (behind the `test-utils` feature) is a scriptable stub.

use std::{ops::RangeInclusive, sync::Arc, time::Duration};

use alloy::primitives::Address;

use crate::{
    error::LogIndexError,
    types::{LogRecord, Topic},
};

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod rpc;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::InMemoryLogIndex;
pub use rpc::{RpcLogIndex, RpcLogIndexBuilder};

/// Builds the name a filter is registered under.
///
/// The name depends only on `purpose` and `address`, so every scanner built for the same
/// contract registers the same filter.
#[must_use]
pub fn filter_name(purpose: &str, address: Address) -> String {
    format!("{purpose} - {address}")
}

/// A named subscription telling the log index which logs to keep and for how long.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filter {
    pub name: String,
    pub event_signatures: Vec<Topic>,
    pub addresses: Vec<Address>,
    pub retention: Duration,
}

impl Filter {
    /// Checks the fields every index requires.
    ///
    /// # Errors
    ///
    /// Returns [`LogIndexError::InvalidFilter`] if the name, the event signatures or the
    /// addresses are empty.
    pub fn validate(&self) -> Result<(), LogIndexError> {
        let reason = if self.name.is_empty() {
            "name is empty"
        } else if self.event_signatures.is_empty() {
            "no event signatures"
        } else if self.addresses.is_empty() {
            "no addresses"
        } else {
            return Ok(());
        };
        Err(LogIndexError::InvalidFilter { name: self.name.clone(), reason })
    }

    /// Whether logs of `event` emitted by `address` are retained by this filter.
    #[must_use]
    pub fn covers(&self, event: Topic, address: Address) -> bool {
        self.event_signatures.contains(&event) && self.addresses.contains(&address)
    }
}

/// Topic positions that can carry indexed event arguments. Position 0 is the event signature.
pub const INDEXED_TOPICS: RangeInclusive<usize> = 1..=3;

/// Rejects topic positions outside [`INDEXED_TOPICS`].
pub(crate) fn check_topic_index(topic_index: usize) -> Result<(), LogIndexError> {
    if INDEXED_TOPICS.contains(&topic_index) {
        Ok(())
    } else {
        Err(LogIndexError::UnsupportedTopicIndex(topic_index))
    }
}

/// Storage and lookup of chain logs.
pub trait LogIndex: Send + Sync {
    /// Asks the index to retain logs matching `filter`.
    ///
    /// Registering a filter whose name is already known with identical content is a no-op
    /// success.
    fn register_filter(
        &self,
        filter: Filter,
    ) -> impl Future<Output = Result<(), LogIndexError>> + Send;

    /// Returns the known logs of `event` emitted by `address` whose topic at `topic_index` is one
    /// of `topic_values` and which have at least `confirmations` confirmations.
    ///
    /// A log in block `b` has `head - b` confirmations, so with zero confirmations logs in the
    /// head block are included. `topic_index` must lie in [`INDEXED_TOPICS`], otherwise
    /// [`LogIndexError::UnsupportedTopicIndex`] is returned.
    fn indexed_logs(
        &self,
        event: Topic,
        address: Address,
        topic_index: usize,
        topic_values: &[Topic],
        confirmations: u64,
    ) -> impl Future<Output = Result<Vec<LogRecord>, LogIndexError>> + Send;
}

impl<L: LogIndex> LogIndex for Arc<L> {
    fn register_filter(
        &self,
        filter: Filter,
    ) -> impl Future<Output = Result<(), LogIndexError>> + Send {
        self.as_ref().register_filter(filter)
    }

    fn indexed_logs(
        &self,
        event: Topic,
        address: Address,
        topic_index: usize,
        topic_values: &[Topic],
        confirmations: u64,
    ) -> impl Future<Output = Result<Vec<LogRecord>, LogIndexError>> + Send {
        self.as_ref().indexed_logs(event, address, topic_index, topic_values, confirmations)
    }
}
