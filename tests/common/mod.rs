#![allow(dead_code)]

use std::sync::Arc;

use alloy::primitives::{Address, B256, address};
use performed_work_scanner::{InMemoryLogIndex, PerformedEventsScanner, WorkId};

pub const REGISTRY: Address = address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
pub const OTHER_REGISTRY: Address = address!("0x00000000000000000000000000000000000000bb");

pub type SharedIndex = Arc<InMemoryLogIndex>;
pub type Scanner = PerformedEventsScanner<SharedIndex>;

pub fn work_id(byte: u8) -> WorkId {
    WorkId::new(B256::repeat_byte(byte))
}

/// A scanner over a fresh in-memory index, started and ready to query.
pub async fn setup_scanner(finality_depth: u64) -> anyhow::Result<(SharedIndex, Scanner)> {
    let index = Arc::new(InMemoryLogIndex::new());
    let scanner = PerformedEventsScanner::new(index.clone(), REGISTRY, finality_depth);
    scanner.start().await?;
    Ok((index, scanner))
}

/// Records `DedupKeyAdded` logs for `ids` in `block_number` on `REGISTRY`.
pub async fn perform(index: &InMemoryLogIndex, ids: &[WorkId], block_number: u64) {
    for id in ids {
        index.insert_dedup_key(REGISTRY, *id, block_number).await;
    }
}

pub fn sorted(mut ids: Vec<WorkId>) -> Vec<WorkId> {
    ids.sort();
    ids
}
