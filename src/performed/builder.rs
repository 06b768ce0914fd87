use std::time::Duration;

use alloy::primitives::Address;

use crate::{
    log_index::LogIndex,
    performed::{DEFAULT_FINALITY_DEPTH, LOG_RETENTION, PerformedEventsScanner},
};

/// Configuration for a [`PerformedEventsScanner`].
#[derive(Clone, Debug)]
pub struct PerformedEventsScannerBuilder {
    registry_address: Address,
    finality_depth: u64,
    retention: Duration,
}

impl PerformedEventsScannerBuilder {
    /// Starts configuring a scanner for the registry at `registry_address`.
    #[must_use]
    pub fn new(registry_address: Address) -> Self {
        Self { registry_address, finality_depth: DEFAULT_FINALITY_DEPTH, retention: LOG_RETENTION }
    }

    /// Number of confirmations a `DedupKeyAdded` log needs before its work id counts as
    /// performed.
    ///
    /// Default is [`DEFAULT_FINALITY_DEPTH`].
    #[must_use]
    pub fn finality_depth(mut self, finality_depth: u64) -> Self {
        self.finality_depth = finality_depth;
        self
    }

    /// How long the log index should keep the registry's `DedupKeyAdded` logs.
    ///
    /// Default is [`LOG_RETENTION`].
    #[must_use]
    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    #[must_use]
    pub fn build<L: LogIndex>(self, log_index: L) -> PerformedEventsScanner<L> {
        debug!(
            registry = %self.registry_address,
            finality_depth = self.finality_depth,
            retention_secs = self.retention.as_secs(),
            "Building PerformedEventsScanner"
        );

        PerformedEventsScanner {
            log_index,
            registry_address: self.registry_address,
            finality_depth: self.finality_depth,
            retention: self.retention,
        }
    }
}
