//! Ordered reassembly of chunk results.

use crossbeam_channel::Receiver;

use crate::record::TrafficRecord;
use crate::transcript::ParseStats;

use super::worker::ChunkResult;

/// Drain `rx` until every sender is gone, then concatenate chunks by id.
pub fn merge_chunks(rx: &Receiver<ChunkResult>, expected: usize) -> (Vec<TrafficRecord>, ParseStats) {
    let mut slots: Vec<Option<ChunkResult>> = (0..expected).map(|_| None).collect();

    for result in rx.iter() {
        let idx = result.chunk_id;
        if idx < slots.len() {
            slots[idx] = Some(result);
        } else {
            tracing::warn!(chunk = idx, expected, "chunk id out of range, ignored");
        }
    }

    let mut records = Vec::new();
    let mut stats = ParseStats::default();
    for (idx, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(chunk) => {
                records.extend(chunk.records);
                stats += chunk.stats;
            }
            None => tracing::warn!(chunk = idx, "chunk missing from merge"),
        }
    }

    (records, stats)
}
