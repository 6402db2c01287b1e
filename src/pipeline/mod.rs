//! Parallel parse path.
//!
//! Line parsing is the only stage with no cross-record dependency, so it is
//! the only stage that fans out. Lines are split into contiguous chunks, one
//! per worker; results are reassembled in chunk order so the record sequence
//! and the parse counters are identical to a sequential pass.
//!
//! ```text
//! lines ──┬── chunk 0 ──→ Worker 0 ──┐
//!         ├── chunk 1 ──→ Worker 1 ──┤
//!         ...                        ├──[crossbeam channel]──→ merge (ordered)
//!         └── chunk N-1 → Worker N-1 ┘
//! ```

pub mod aggregator;
pub mod router;
pub mod worker;

use std::thread;

use crate::record::{self, TrafficRecord};
use crate::transcript::{LineParser, ParseStats};

pub use worker::{ChunkResult, ParseWorker};

/// Number of parse threads for a configured value (0 = auto).
pub fn resolve_workers(configured: usize) -> usize {
    if configured == 0 {
        // Use half the available cores, minimum 1, maximum 8.
        (num_cpus::get() / 2).clamp(1, 8)
    } else {
        configured
    }
}

/// Parse `lines` into records, in input order, using up to `workers`
/// threads.
pub fn build_records<S>(
    lines: &[S],
    parser: &LineParser,
    workers: usize,
) -> (Vec<TrafficRecord>, ParseStats)
where
    S: AsRef<str> + Sync,
{
    let workers = resolve_workers(workers);
    if workers <= 1 || lines.len() < 2 {
        return record::build_records(parser, lines);
    }

    let ranges = router::chunk_ranges(lines.len(), workers);
    tracing::debug!(workers = ranges.len(), lines = lines.len(), "parallel parse");

    let (tx, rx) = crossbeam_channel::unbounded::<ChunkResult>();

    thread::scope(|scope| {
        for (chunk_id, range) in ranges.iter().cloned().enumerate() {
            let chunk = &lines[range];
            let worker = ParseWorker::new(chunk_id);
            let worker_tx = tx.clone();

            let spawned = thread::Builder::new()
                .name(format!("ds-parse-{}", chunk_id))
                .spawn_scoped(scope, move || worker.run(parser, chunk, &worker_tx));

            if let Err(err) = spawned {
                tracing::warn!(chunk_id, error = %err, "parse thread spawn failed, parsing inline");
                worker.run(parser, chunk, &tx);
            }
        }

        // Workers hold the remaining senders; the merge ends when they finish.
        drop(tx);
        aggregator::merge_chunks(&rx, ranges.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::endpoint::EndpointNormalizer;
    use crate::transcript::format::CaptureFormat;

    fn lines() -> Vec<String> {
        (0..257)
            .map(|i| {
                if i % 7 == 0 {
                    format!("garbage line {}", i)
                } else {
                    format!(
                        "10:{:02}:00.{:06} IP 10.0.{}.{}.{} > 10.9.9.9.22: Flags [S], length {}",
                        i % 60,
                        i,
                        i / 200,
                        i % 200,
                        1024 + i,
                        i
                    )
                }
            })
            .collect()
    }

    #[test]
    fn parallel_matches_sequential() {
        let parser =
            LineParser::new(CaptureFormat::Canonical, EndpointNormalizer::default()).unwrap();
        let input = lines();

        let (seq_records, seq_stats) = build_records(&input, &parser, 1);
        for workers in [2, 3, 8] {
            let (par_records, par_stats) = build_records(&input, &parser, workers);
            assert_eq!(par_stats, seq_stats, "workers={}", workers);
            assert_eq!(par_records, seq_records, "workers={}", workers);
        }
        assert_eq!(seq_stats.skipped, 37);
    }

    #[test]
    fn auto_workers_is_bounded() {
        let n = resolve_workers(0);
        assert!((1..=8).contains(&n));
        assert_eq!(resolve_workers(3), 3);
    }
}
