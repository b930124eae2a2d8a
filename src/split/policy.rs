//! Chunk size selection.

/// Tiers as `(upper bound exclusive, chunk size)`, ascending.
const TIERS: [(usize, usize); 5] = [
    (10_000, 1_000),
    (100_000, 10_000),
    (1_000_000, 100_000),
    (10_000_000, 1_000_000),
    (100_000_000, 10_000_000),
];

/// Chunk size for files of `n` rows and above the last tier.
const LARGEST_CHUNK: usize = 10_000_000;

/// Pick the chunk size for a file with `total_rows` data rows.
///
/// Bounds are half-open, so exactly 10,000 rows falls in the 10,000 tier.
pub fn chunk_size_for(total_rows: usize) -> usize {
    TIERS
        .iter()
        .find(|(upper, _)| total_rows < *upper)
        .map_or(LARGEST_CHUNK, |(_, size)| *size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        let cases = [
            (0, 1_000),
            (1, 1_000),
            (9_999, 1_000),
            (10_000, 10_000),
            (99_999, 10_000),
            (100_000, 100_000),
            (999_999, 100_000),
            (1_000_000, 1_000_000),
            (9_999_999, 1_000_000),
            (10_000_000, 10_000_000),
            (55_000_000, 10_000_000),
            (99_999_999, 10_000_000),
            (100_000_000, 10_000_000),
            (usize::MAX, 10_000_000),
        ];
        for (rows, expected) in cases {
            assert_eq!(chunk_size_for(rows), expected, "rows = {rows}");
        }
    }

    #[test]
    fn test_fifteen_thousand_rows() {
        assert_eq!(chunk_size_for(15_000), 10_000);
    }

    #[test]
    fn test_monotonic() {
        let mut previous = 0;
        for exp in 0..10 {
            let size = chunk_size_for(10usize.pow(exp));
            assert!(size >= previous);
            previous = size;
        }
    }
}
