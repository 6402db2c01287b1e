//! Chunk assignment for the parallel parse path.

use std::ops::Range;

/// Split `len` lines into at most `workers` contiguous, non-empty ranges
/// that together cover `0..len` in order. Earlier ranges take the remainder.
pub fn chunk_ranges(len: usize, workers: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }
    let chunks = workers.clamp(1, len);
    let base = len / chunks;
    let extra = len % chunks;

    let mut ranges = Vec::with_capacity(chunks);
    let mut start = 0;
    for i in 0..chunks {
        let size = base + usize::from(i < extra);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}
