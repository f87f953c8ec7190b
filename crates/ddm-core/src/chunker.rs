//! Byte-range planning for a new download.

/// One planned byte range, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedChunk {
    pub index: i64,
    pub start_byte: i64,
    pub end_byte: i64,
}

/// Splits `total_size` bytes into `chunk_count` contiguous, non-overlapping
/// ranges. Equal-size partition with any remainder absorbed by the last
/// chunk. `total_size` and `chunk_count` must both be > 0;
/// `chunk_count` is clamped to `total_size` so no chunk is ever empty.
pub fn plan_chunks(total_size: i64, chunk_count: i64) -> Vec<PlannedChunk> {
    assert!(total_size > 0, "total_size must be positive");
    assert!(chunk_count > 0, "chunk_count must be positive");

    let chunk_count = chunk_count.min(total_size);
    let base = total_size / chunk_count;
    let remainder = total_size % chunk_count;

    let mut out = Vec::with_capacity(chunk_count as usize);
    let mut offset = 0i64;
    for i in 0..chunk_count {
        // Remainder bytes are absorbed by the last chunk, not spread evenly.
        let len = if i == chunk_count - 1 {
            base + remainder
        } else {
            base
        };
        let start = offset;
        let end = start + len - 1;
        out.push(PlannedChunk {
            index: i,
            start_byte: start,
            end_byte: end,
        });
        offset = end + 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split() {
        let chunks = plan_chunks(1024, 4);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].start_byte, 0);
        assert_eq!(chunks[0].end_byte, 255);
        assert_eq!(chunks[3].start_byte, 768);
        assert_eq!(chunks[3].end_byte, 1023);
    }

    #[test]
    fn uneven_split_last_chunk_absorbs_remainder() {
        // size=1000, chunks=3 -> 333/333/334.
        let chunks = plan_chunks(1000, 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].start_byte, 0);
        assert_eq!(chunks[0].end_byte, 332);
        assert_eq!(chunks[1].start_byte, 333);
        assert_eq!(chunks[1].end_byte, 665);
        assert_eq!(chunks[2].start_byte, 666);
        assert_eq!(chunks[2].end_byte, 999);
    }

    #[test]
    fn contiguous_and_sums_to_total() {
        let total = 10_000_037i64;
        let chunks = plan_chunks(total, 7);
        assert_eq!(chunks[0].start_byte, 0);
        assert_eq!(chunks.last().unwrap().end_byte, total - 1);
        let mut sum = 0i64;
        for w in chunks.windows(2) {
            assert_eq!(w[0].end_byte + 1, w[1].start_byte, "chunks must be contiguous");
            sum += w[0].end_byte - w[0].start_byte + 1;
        }
        sum += chunks.last().unwrap().end_byte - chunks.last().unwrap().start_byte + 1;
        assert_eq!(sum, total);
    }

    #[test]
    fn chunk_count_clamped_to_total_size() {
        let chunks = plan_chunks(3, 10);
        assert_eq!(chunks.len(), 3);
        for c in &chunks {
            assert_eq!(c.end_byte - c.start_byte + 1, 1);
        }
    }

    #[test]
    fn single_chunk_covers_whole_file() {
        let chunks = plan_chunks(100, 1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_byte, 0);
        assert_eq!(chunks[0].end_byte, 99);
    }
}
