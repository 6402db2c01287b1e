//! Per-chunk parse worker.

use crossbeam_channel::Sender;

use crate::record::{RecordBuilder, TrafficRecord};
use crate::transcript::{LineParser, ParseStats};

/// Records and counters for one contiguous chunk of lines.
#[derive(Debug)]
pub struct ChunkResult {
    pub chunk_id: usize,
    pub records: Vec<TrafficRecord>,
    pub stats: ParseStats,
}

#[derive(Debug, Clone, Copy)]
pub struct ParseWorker {
    chunk_id: usize,
}

impl ParseWorker {
    pub fn new(chunk_id: usize) -> Self {
        ParseWorker { chunk_id }
    }

    pub fn run<S: AsRef<str>>(&self, parser: &LineParser, lines: &[S], tx: &Sender<ChunkResult>) {
        let mut builder = RecordBuilder::new(parser);
        builder.extend(lines);
        let (records, stats) = builder.finish();

        tracing::trace!(chunk = self.chunk_id, parsed = stats.parsed, skipped = stats.skipped, "chunk done");

        if tx
            .send(ChunkResult {
                chunk_id: self.chunk_id,
                records,
                stats,
            })
            .is_err()
        {
            tracing::warn!(chunk = self.chunk_id, "merge side hung up, chunk dropped");
        }
    }
}
