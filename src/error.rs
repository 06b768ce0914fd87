use std::sync::Arc;

use alloy::{
    primitives::{Address, B256},
    transports::{RpcError, TransportErrorKind},
};
use thiserror::Error;

/// Errors returned by [`PerformedEventsScanner`](crate::PerformedEventsScanner).
///
/// None of these are retried internally. A caller that receives an error must not read it as
/// "no work performed"; it should retry the whole call later.
#[derive(Error, Debug, Clone)]
pub enum ScannerError {
    /// The log index refused the scanner's filter.
    #[error("failed to register filter {name:?} for {address}: {source}")]
    Registration {
        name: String,
        address: Address,
        #[source]
        source: LogIndexError,
    },

    /// Fetching `DedupKeyAdded` logs failed, was cancelled or timed out.
    #[error("failed to fetch performed logs for {address}: {source}")]
    Query {
        address: Address,
        #[source]
        source: LogIndexError,
    },

    /// A caller-supplied work id is not a hex encoded 32-byte value.
    #[error("invalid work id {input:?}: {source}")]
    InvalidWorkId {
        input: String,
        #[source]
        source: WorkIdError,
    },
}

impl ScannerError {
    /// Returns `true` if the failure came from a cancelled query.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScannerError::Query { source: LogIndexError::Cancelled, .. })
    }
}

/// Errors reported by a [`LogIndex`](crate::LogIndex) implementation.
#[derive(Error, Debug, Clone)]
pub enum LogIndexError {
    /// The underlying RPC transport returned an error.
    #[error("RPC error: {0}")]
    RpcError(Arc<RpcError<TransportErrorKind>>),

    /// The call did not complete within the configured timeout.
    #[error("operation timed out")]
    Timeout,

    /// The caller cancelled the call before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// The filter is missing a required field.
    #[error("invalid filter {name:?}: {reason}")]
    InvalidFilter { name: String, reason: &'static str },

    /// Lookups are only supported on the indexed topics 1 to 3.
    #[error("topic index {0} cannot be queried")]
    UnsupportedTopicIndex(usize),

    /// No registered filter retains logs for this event and address.
    #[error("no filter registered for event {event} on {address}")]
    FilterNotRegistered { event: B256, address: Address },

    /// The index backend cannot serve requests right now.
    #[error("log index unavailable: {0}")]
    Unavailable(String),
}

impl From<RpcError<TransportErrorKind>> for LogIndexError {
    fn from(error: RpcError<TransportErrorKind>) -> Self {
        LogIndexError::RpcError(Arc::new(error))
    }
}

impl From<tokio::time::error::Elapsed> for LogIndexError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        LogIndexError::Timeout
    }
}

/// Reasons a string cannot be read as a [`WorkId`](crate::WorkId).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkIdError {
    #[error("work id is empty")]
    Empty,

    #[error("work id is not valid hex")]
    InvalidHex,

    /// The decoded value is longer than 32 bytes. Holds the number of hex digits seen.
    #[error("work id has {0} hex digits, at most 64 are allowed")]
    TooLong(usize),
}
