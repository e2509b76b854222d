//! Permutation-based cuckoo hashing (receiver) and complete, every-hash-
//! function placement (sender).
//!
//! Both tables hold [`BucketSlot`] values. The receiver's table has exactly
//! one slot per bucket; the sender's has `capacity` slots per bucket, one row
//! per bucket, because every sender element is placed under *all* `H` hash
//! functions rather than just one.

#![forbid(unsafe_code)]

use rand::Rng;

use crate::prp::loc;

/// Number of cuckoo hash functions. Fixed by the protocol (§3).
pub const HASH_FUNCTIONS: u8 = 3;

/// A single slot of a cuckoo table: empty, or occupied by `(input_index,
/// hash_index)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BucketSlot {
    /// No input occupies this slot.
    Empty,
    /// `input_index` (into the caller's input vector) placed here via hash
    /// function `hash_index` (`< HASH_FUNCTIONS`).
    Occupied { input_index: usize, hash_index: u8 },
}

impl BucketSlot {
    /// True for [`BucketSlot::Empty`].
    #[inline]
    pub fn is_empty(self) -> bool {
        matches!(self, BucketSlot::Empty)
    }
}

/// Errors from the hashing layer.
#[derive(Debug, thiserror::Error)]
pub enum HashingError {
    /// Cuckoo insertion did not converge within the eviction cap.
    #[error("cuckoo insertion of input {input_index} did not converge after {attempts} evictions")]
    CuckooFailure { input_index: usize, attempts: usize },
    /// A sender bucket row filled up before every hash function placement fit.
    #[error("bucket row {row} overflowed its capacity of {capacity}")]
    RowOverflow { row: u64, capacity: usize },
}

/// Eviction cap per cuckoo-insert chain: `500 * m`, per the design note that
/// the original implementation leaves this unbounded (§9 of SPEC_FULL.md).
fn eviction_cap(bucket_count_log: u32) -> usize {
    500 * (bucket_count_log.max(1) as usize)
}

/// Cuckoo-insert `inputs` into a table of `2^bucket_count_log` slots.
///
/// Returns the filled table, one slot per input, or `HashingError::CuckooFailure`
/// if some input's eviction chain exceeds the cap.
pub fn cuckoo_hash<R: Rng + ?Sized>(
    rng: &mut R,
    inputs: &[u64],
    bucket_count_log: u32,
    seeds: &[u64],
) -> Result<Vec<BucketSlot>, HashingError> {
    assert_eq!(seeds.len(), HASH_FUNCTIONS as usize, "seeds.len() must equal HASH_FUNCTIONS");
    let bucket_count = 1usize << bucket_count_log;
    let mut table = vec![BucketSlot::Empty; bucket_count];
    let cap = eviction_cap(bucket_count_log);

    for i in 0..inputs.len() {
        let mut current = BucketSlot::Occupied {
            input_index: i,
            hash_index: rng.gen_range(0..HASH_FUNCTIONS),
        };
        let mut attempts = 0usize;
        loop {
            let (entry_index, hash_index) = match current {
                BucketSlot::Occupied { input_index, hash_index } => (input_index, hash_index),
                BucketSlot::Empty => unreachable!("eviction chain never carries an empty slot"),
            };
            let row = loc(seeds[hash_index as usize], bucket_count_log, inputs[entry_index]) as usize;
            let evicted = std::mem::replace(&mut table[row], current);
            match evicted {
                BucketSlot::Empty => break,
                occupied => {
                    attempts += 1;
                    if attempts > cap {
                        return Err(HashingError::CuckooFailure { input_index: i, attempts });
                    }
                    let (evicted_input, evicted_hash) = match occupied {
                        BucketSlot::Occupied { input_index, hash_index } => (input_index, hash_index),
                        BucketSlot::Empty => unreachable!(),
                    };
                    // Rehash the evicted slot under a different hash function.
                    let mut next_hash = rng.gen_range(0..HASH_FUNCTIONS);
                    while next_hash == evicted_hash && HASH_FUNCTIONS > 1 {
                        next_hash = rng.gen_range(0..HASH_FUNCTIONS);
                    }
                    current = BucketSlot::Occupied { input_index: evicted_input, hash_index: next_hash };
                }
            }
        }
    }

    tracing::debug!(inputs = inputs.len(), bucket_count, "cuckoo-placed every receiver input");
    Ok(table)
}

/// Place every `(input_index, hash_index)` pair for every input and every
/// hash function into a `(2^bucket_count_log) x capacity` table, then shuffle
/// each row independently.
///
/// Returns the table in row-major order (`table[row * capacity + slot]`).
pub fn complete_hash<R: Rng + ?Sized>(
    rng: &mut R,
    inputs: &[u64],
    bucket_count_log: u32,
    capacity: usize,
    seeds: &[u64],
) -> Result<Vec<BucketSlot>, HashingError> {
    assert_eq!(seeds.len(), HASH_FUNCTIONS as usize, "seeds.len() must equal HASH_FUNCTIONS");
    let bucket_count = 1usize << bucket_count_log;
    let mut table = vec![BucketSlot::Empty; bucket_count * capacity];

    for i in 0..inputs.len() {
        for h in 0..HASH_FUNCTIONS {
            let row = loc(seeds[h as usize], bucket_count_log, inputs[i]) as usize;
            let base = row * capacity;
            let mut placed = false;
            for slot in 0..capacity {
                if table[base + slot].is_empty() {
                    table[base + slot] = BucketSlot::Occupied { input_index: i, hash_index: h };
                    placed = true;
                    break;
                }
            }
            if !placed {
                return Err(HashingError::RowOverflow { row: row as u64, capacity });
            }
        }
    }

    // Fisher-Yates shuffle within each row so occupancy doesn't leak a
    // partition boundary.
    for row in 0..bucket_count {
        let base = row * capacity;
        for k in (1..capacity).rev() {
            let j = rng.gen_range(0..=k);
            table.swap(base + k, base + j);
        }
    }

    tracing::debug!(inputs = inputs.len(), bucket_count, capacity, "complete-placed every sender input under every hash function");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn seeds() -> Vec<u64> {
        vec![0x1111, 0x2222, 0x3333]
    }

    #[test]
    fn cuckoo_hash_places_every_input_exactly_once() {
        let mut rng = StdRng::seed_from_u64(7);
        let inputs: Vec<u64> = (0..50u64).map(|i| i * 37 + 11).collect();
        let table = cuckoo_hash(&mut rng, &inputs, 10, &seeds()).expect("should place");
        let mut seen = vec![false; inputs.len()];
        for slot in &table {
            if let BucketSlot::Occupied { input_index, .. } = slot {
                assert!(!seen[*input_index], "input placed twice");
                seen[*input_index] = true;
            }
        }
        assert!(seen.iter().all(|&b| b), "every input must be placed");
    }

    #[test]
    fn complete_hash_places_every_input_under_every_hash_function() {
        let mut rng = StdRng::seed_from_u64(11);
        let inputs: Vec<u64> = vec![1, 2, 3, 4, 5];
        let table = complete_hash(&mut rng, &inputs, 8, 20, &seeds()).expect("should place");
        let mut found = vec![[false; 3]; inputs.len()];
        for slot in &table {
            if let BucketSlot::Occupied { input_index, hash_index } = slot {
                found[*input_index][*hash_index as usize] = true;
            }
        }
        for row in &found {
            assert!(row.iter().all(|&b| b), "every (input, hash fn) pair must appear once");
        }
    }

    #[test]
    fn complete_hash_reports_row_overflow() {
        let mut rng = StdRng::seed_from_u64(3);
        let inputs: Vec<u64> = (0..1000u64).collect();
        let result = complete_hash(&mut rng, &inputs, 2, 1, &seeds());
        assert!(matches!(result, Err(HashingError::RowOverflow { .. })));
    }
}
