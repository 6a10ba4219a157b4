//! Byte-range partitioning for parallel copies.
//!
//! A file is split into at most `streams` contiguous, disjoint ranges
//! covering `[0, total)` exactly. Each range is owned by one copy worker
//! for the duration of a single parallel pass; ranges are never persisted
//! and no worker ever touches another worker's range.

/// A contiguous byte interval of the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub offset: u64,
    pub len: u64,
}

impl ChunkRange {
    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

/// Partition `[0, total)` into at most `streams` non-empty ranges.
///
/// Range length is `ceil(total / streams)`; the tail range absorbs the
/// remainder and empty tails are dropped, so small files may yield fewer
/// ranges than streams. `total == 0` yields no ranges.
pub fn partition(total: u64, streams: usize) -> Vec<ChunkRange> {
    let streams = streams.max(1) as u64;
    if total == 0 {
        return Vec::new();
    }

    let chunk_len = total.div_ceil(streams);
    let mut ranges = Vec::with_capacity(streams as usize);
    for i in 0..streams {
        let offset = i * chunk_len;
        if offset >= total {
            break;
        }
        let len = chunk_len.min(total - offset);
        ranges.push(ChunkRange { offset, len });
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    /// No gaps, no overlaps, lengths sum to the total.
    fn assert_exact_partition(total: u64, streams: usize) {
        let ranges = partition(total, streams);

        let mut expected_offset = 0u64;
        for range in &ranges {
            assert!(range.len > 0, "empty range in partition of {total}");
            assert_eq!(
                range.offset, expected_offset,
                "gap or overlap at offset {expected_offset} (total={total}, streams={streams})"
            );
            expected_offset = range.end();
        }
        assert_eq!(expected_offset, total);
        assert_eq!(ranges.iter().map(|r| r.len).sum::<u64>(), total);
        assert!(ranges.len() <= streams.max(1));
    }

    #[test]
    fn partitions_exactly_for_many_shapes() {
        for streams in 1..=32 {
            for total in [0u64, 1, 2, 31, 32, 33, 1000, 4095, 4096, 4097, 1 << 20] {
                assert_exact_partition(total, streams);
            }
        }
    }

    #[test]
    fn zero_length_file_yields_no_ranges() {
        assert!(partition(0, 4).is_empty());
    }

    #[test]
    fn more_streams_than_bytes() {
        let ranges = partition(3, 8);
        assert_eq!(ranges.len(), 3);
        for (i, r) in ranges.iter().enumerate() {
            assert_eq!(r.offset, i as u64);
            assert_eq!(r.len, 1);
        }
    }

    #[test]
    fn ten_mib_across_four_streams() {
        let total = 10 * 1024 * 1024;
        let ranges = partition(total, 4);
        assert_eq!(ranges.len(), 4);
        // ceil(10 MiB / 4) = 2.5 MiB per range.
        for r in &ranges {
            assert_eq!(r.len, 2_621_440);
        }
        assert_eq!(ranges[3].end(), total);
    }

    #[test]
    fn zero_streams_treated_as_one() {
        let ranges = partition(100, 0);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0], ChunkRange { offset: 0, len: 100 });
    }
}
