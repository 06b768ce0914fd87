use std::{fmt, str::FromStr};

use alloy::{
    hex,
    primitives::{Address, B256},
    rpc::types::Log,
    sol,
};

use crate::error::WorkIdError;

sol! {
    /// Emitted by the keeper registry each time a performed upkeep records its dedup key.
    event DedupKeyAdded(bytes32 indexed dedupKey);
}

/// An indexed event parameter.
pub type Topic = B256;

/// Identifier of a unit of schedulable work.
///
/// A work id shares the 32-byte space of [`Topic`]: converting between the two is a plain
/// reinterpretation of the bytes. The text form is lowercase hex without a `0x` prefix.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkId(B256);

impl WorkId {
    #[must_use]
    pub const fn new(bytes: B256) -> Self {
        Self(bytes)
    }

    /// The topic value a `DedupKeyAdded` log carries for this work id.
    #[must_use]
    pub const fn topic(&self) -> Topic {
        self.0
    }

    #[must_use]
    pub const fn from_topic(topic: Topic) -> Self {
        Self(topic)
    }
}

impl From<B256> for WorkId {
    fn from(bytes: B256) -> Self {
        Self(bytes)
    }
}

impl From<WorkId> for B256 {
    fn from(id: WorkId) -> Self {
        id.0
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for WorkId {
    type Err = WorkIdError;

    /// Parses a hex work id.
    ///
    /// An optional `0x` prefix and any letter case are accepted. Values shorter than 32 bytes are
    /// left-padded with zeros.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        if digits.is_empty() {
            return Err(WorkIdError::Empty);
        }
        if !digits.is_ascii() {
            return Err(WorkIdError::InvalidHex);
        }
        if digits.len() > 64 {
            return Err(WorkIdError::TooLong(digits.len()));
        }

        let mut padded = [b'0'; 64];
        padded[64 - digits.len()..].copy_from_slice(digits.as_bytes());

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(padded, &mut bytes).map_err(|_| WorkIdError::InvalidHex)?;
        Ok(Self(B256::from(bytes)))
    }
}

/// A log as served by a [`LogIndex`](crate::LogIndex).
///
/// Topic 0 is the event signature. For `DedupKeyAdded` topic 1 holds the work id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    pub address: Address,
    pub topics: Vec<Topic>,
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: Option<B256>,
}

impl LogRecord {
    /// The work id carried in topic 1, or `None` when the log has fewer than two topics.
    #[must_use]
    pub fn work_id(&self) -> Option<WorkId> {
        self.topics.get(1).copied().map(WorkId::from_topic)
    }
}

impl From<Log> for LogRecord {
    fn from(log: Log) -> Self {
        LogRecord {
            address: log.address(),
            topics: log.topics().to_vec(),
            block_number: log.block_number.unwrap_or_default(),
            log_index: log.log_index.unwrap_or_default(),
            transaction_hash: log.transaction_hash,
        }
    }
}
