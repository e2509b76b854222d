//! Protocol parameter derivation: the ring degree, plaintext prime, bucket
//! count, sender capacity, partition count, and window size must all be
//! mutually consistent before a single byte is exchanged.

#![forbid(unsafe_code)]

use rand::Rng;

use crate::hashing::HASH_FUNCTIONS;

/// Errors from parameter derivation.
#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    /// No table entry covers `input_bits - bucket_count_log + 2`.
    #[error("no plaintext prime covers input_bits - bucket_count_log + 2 = {min_log_modulus}")]
    NoPlainModulus { min_log_modulus: u32 },
    /// `2^bucket_count_log` must be at least `receiver_size`.
    #[error("bucket count 2^{bucket_count_log} cannot hold receiver_size {receiver_size}")]
    TooFewBuckets { bucket_count_log: u32, receiver_size: usize },
    /// `2^bucket_count_log` must fit in one batched ciphertext (`<= N`).
    #[error("bucket count 2^{bucket_count_log} exceeds ring degree N={ring_degree}")]
    TooManyBuckets { bucket_count_log: u32, ring_degree: usize },
    /// `poly_modulus_degree` must be 8192 or 16384.
    #[error("poly_modulus_degree must be 8192 or 16384, got {0}")]
    BadRingDegree(usize),
    /// No capacity table entry covers this `sender_size`.
    #[error("sender_size {0} exceeds the largest tabulated bucket capacity (2^28)")]
    SenderSetTooLarge(usize),
    /// `seeds.len()` must equal `HASH_FUNCTIONS`.
    #[error("expected {expected} seeds, got {got}")]
    WrongSeedCount { expected: usize, got: usize },
    /// `sender_partition_count` must not exceed `sender_bucket_capacity()`.
    #[error("sender_partition_count {partition_count} exceeds sender_bucket_capacity {capacity}")]
    PartitionCountExceedsCapacity { partition_count: usize, capacity: usize },
}

/// Parameters shared by the receiver and sender for one protocol session.
///
/// Immutable after construction; `generate_seeds`/`set_seeds` is the only
/// mutation allowed, and only once.
#[derive(Debug, Clone)]
pub struct PsiParams {
    receiver_size: usize,
    sender_size: usize,
    input_bits: u32,
    poly_modulus_degree: usize,
    sender_partition_count: usize,
    window_size: u32,
    seeds: Option<Vec<u64>>,
}

impl PsiParams {
    /// Construct parameters for a session. `poly_modulus_degree` must be
    /// 8192 or 16384. Defaults `sender_partition_count` to `min(16,
    /// sender_bucket_capacity())` and `window_size` to 3, matching the
    /// upstream protocol's defaults; the partition-count default is clamped
    /// to the capacity table rather than left at a fixed 16 so that a small
    /// `sender_size` (and therefore a small `C`) can never leave the default
    /// construction in a state where `compute_matches` would later panic on
    /// `C < P` — see `ParamError::PartitionCountExceedsCapacity`.
    pub fn new_r(
        receiver_size: usize,
        sender_size: usize,
        input_bits: u32,
        poly_modulus_degree: usize,
    ) -> Result<Self, ParamError> {
        if poly_modulus_degree != 8192 && poly_modulus_degree != 16384 {
            return Err(ParamError::BadRingDegree(poly_modulus_degree));
        }
        let mut params = PsiParams {
            receiver_size,
            sender_size,
            input_bits,
            poly_modulus_degree,
            sender_partition_count: 16,
            window_size: 3,
            seeds: None,
        };

        let log = params.bucket_count_log();
        if receiver_size > (1usize << log) {
            return Err(ParamError::TooFewBuckets { bucket_count_log: log, receiver_size });
        }
        if (1usize << log) > poly_modulus_degree {
            return Err(ParamError::TooManyBuckets { bucket_count_log: log, ring_degree: poly_modulus_degree });
        }
        params.plain_modulus_r()?;
        let capacity = params.sender_bucket_capacity_r()?;
        if params.sender_partition_count > capacity {
            params.sender_partition_count = capacity;
        }

        tracing::debug!(
            receiver_size,
            sender_size,
            input_bits,
            poly_modulus_degree,
            bucket_count_log = log,
            plain_modulus = params.plain_modulus(),
            sender_bucket_capacity = capacity,
            sender_partition_count = params.sender_partition_count,
            "derived PSI parameters"
        );

        Ok(params)
    }

    /// `new_r`, panicking on infeasible parameters. For tests and call sites
    /// that already know the parameters are feasible.
    pub fn new(receiver_size: usize, sender_size: usize, input_bits: u32, poly_modulus_degree: usize) -> Self {
        Self::new_r(receiver_size, sender_size, input_bits, poly_modulus_degree).expect("infeasible PSI parameters")
    }

    /// Override the sender partition count. Must be `<= sender_bucket_capacity()`;
    /// returns `ParamError::PartitionCountExceedsCapacity` otherwise.
    pub fn with_sender_partition_count_r(mut self, count: usize) -> Result<Self, ParamError> {
        let capacity = self.sender_bucket_capacity_r()?;
        if count > capacity {
            return Err(ParamError::PartitionCountExceedsCapacity { partition_count: count, capacity });
        }
        self.sender_partition_count = count;
        Ok(self)
    }

    /// `with_sender_partition_count_r`, panicking if `count` exceeds
    /// `sender_bucket_capacity()`. For tests and call sites that already
    /// know the override is feasible.
    pub fn with_sender_partition_count(self, count: usize) -> Self {
        self.with_sender_partition_count_r(count).expect("sender_partition_count exceeds sender_bucket_capacity")
    }

    /// Override the windowing parameter (0 disables windowing).
    pub fn with_window_size(mut self, w: u32) -> Self {
        self.window_size = w;
        self
    }

    /// Draw `HASH_FUNCTIONS` independent 64-bit seeds (receiver side).
    pub fn generate_seeds<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.seeds = Some((0..HASH_FUNCTIONS).map(|_| rng.gen()).collect());
        tracing::debug!(hash_functions = HASH_FUNCTIONS, "generated fresh hash-function seeds");
    }

    /// Install externally-received seeds (sender side).
    pub fn set_seeds_r(&mut self, seeds: Vec<u64>) -> Result<(), ParamError> {
        if seeds.len() != HASH_FUNCTIONS as usize {
            return Err(ParamError::WrongSeedCount { expected: HASH_FUNCTIONS as usize, got: seeds.len() });
        }
        self.seeds = Some(seeds);
        Ok(())
    }

    /// The seeds, once generated or set. Panics if neither has happened yet
    /// (a programmer error per §7: calling protocol operations before the
    /// handshake completes).
    pub fn seeds(&self) -> &[u64] {
        self.seeds.as_deref().expect("PsiParams::generate_seeds or set_seeds must be called first")
    }

    /// `receiver_size`, as supplied at construction.
    pub fn receiver_size(&self) -> usize {
        self.receiver_size
    }

    /// `sender_size`, as supplied at construction.
    pub fn sender_size(&self) -> usize {
        self.sender_size
    }

    /// Ring degree `N`.
    pub fn poly_modulus_degree(&self) -> usize {
        self.poly_modulus_degree
    }

    /// `sender_partition_count`.
    pub fn sender_partition_count(&self) -> usize {
        self.sender_partition_count
    }

    /// `window_size`.
    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    /// `H = 3`, fixed.
    pub fn hash_functions(&self) -> u8 {
        HASH_FUNCTIONS
    }

    /// `m`: 13 for N=8192, 14 for N=16384.
    pub fn bucket_count_log(&self) -> u32 {
        if self.poly_modulus_degree == 8192 { 13 } else { 14 }
    }

    /// `2^m`.
    pub fn bucket_count(&self) -> usize {
        1usize << self.bucket_count_log()
    }

    /// Plaintext prime, chosen by the `input_bits - m + 2` table.
    pub fn plain_modulus_r(&self) -> Result<u64, ParamError> {
        let m = self.bucket_count_log();
        let min_log_modulus = if self.input_bits + 2 >= m { self.input_bits + 2 - m } else { 0 };
        Ok(match min_log_modulus {
            0..=16 => (8192 * 2 * 4) + 1, // 2^16 + 1
            17..=23 => 8_519_681,         // 2^23 + 2^17 + 1
            24..=35 => 34_359_771_137,    // 2^35 + 2^15 + 1
            _ => return Err(ParamError::NoPlainModulus { min_log_modulus }),
        })
    }

    /// `plain_modulus_r`, panicking on infeasibility already ruled out by `new_r`.
    pub fn plain_modulus(&self) -> u64 {
        self.plain_modulus_r().expect("infeasible plain modulus")
    }

    /// Sender bucket capacity `C`, from the (m, sender_size) lookup table
    /// reproduced verbatim from [CLR17] Table 1.
    pub fn sender_bucket_capacity_r(&self) -> Result<usize, ParamError> {
        let m = self.bucket_count_log();
        let s = self.sender_size;
        let table: &[(usize, usize)] = if m == 13 {
            &[
                (1 << 8, 9),
                (1 << 12, 20),
                (1 << 16, 74),
                (1 << 20, 556),
                (1 << 24, 6798),
                (1 << 28, 100_890),
            ]
        } else {
            &[
                (1 << 8, 8),
                (1 << 12, 16),
                (1 << 16, 51),
                (1 << 20, 318),
                (1 << 24, 3543),
                (1 << 28, 51_002),
            ]
        };
        table
            .iter()
            .find(|&&(max_size, _)| s <= max_size)
            .map(|&(_, capacity)| capacity)
            .ok_or(ParamError::SenderSetTooLarge(s))
    }

    /// `sender_bucket_capacity_r`, panicking on infeasibility already ruled out by `new_r`.
    pub fn sender_bucket_capacity(&self) -> usize {
        self.sender_bucket_capacity_r().expect("sender set too large for capacity table")
    }

    /// Encode a bucket slot into a field element `< plain_modulus()`.
    ///
    /// - Occupied: `((input >> m) << 2) | hash_index`.
    /// - Empty: `3 | (role_bit << 2)`, role_bit = 1 for receiver, 0 for sender.
    pub fn encode_bucket_element(&self, inputs: &[u64], slot: crate::hashing::BucketSlot, is_receiver: bool) -> u64 {
        use crate::hashing::BucketSlot;
        let m = self.bucket_count_log();
        let result = match slot {
            BucketSlot::Occupied { input_index, hash_index } => {
                debug_assert!(hash_index < 3, "hash_index must be in [0, 3)");
                ((inputs[input_index] >> m) << 2) | (hash_index as u64)
            }
            BucketSlot::Empty => 3 | ((is_receiver as u64) << 2),
        };
        debug_assert!(result < self.plain_modulus());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_partition_count_and_window_match_upstream() {
        // sender_size=4096 -> m=13 capacity table gives C=20, comfortably
        // above the 16 default so it isn't clamped here.
        let p = PsiParams::new(4, 4096, 32, 8192);
        assert_eq!(p.sender_partition_count(), 16);
        assert_eq!(p.window_size(), 3);
        assert_eq!(p.bucket_count_log(), 13);
    }

    #[test]
    fn default_partition_count_is_clamped_to_small_capacity() {
        // sender_size=100 -> m=13 capacity table gives C=9, below the 16
        // default; the default must clamp down to C rather than leave
        // `compute_matches` to panic on `C < P` later.
        let p = PsiParams::new(4, 100, 32, 8192);
        assert_eq!(p.sender_bucket_capacity(), 9);
        assert_eq!(p.sender_partition_count(), 9);
    }

    #[test]
    fn with_sender_partition_count_rejects_counts_above_capacity() {
        let p = PsiParams::new(4, 100, 32, 8192); // capacity = 9
        let result = p.with_sender_partition_count_r(10);
        assert!(matches!(result, Err(ParamError::PartitionCountExceedsCapacity { partition_count: 10, capacity: 9 })));
    }

    #[test]
    fn plain_modulus_table_boundaries() {
        // m=13: input_bits=8 -> min_log_modulus = 0 -> smallest prime.
        let p = PsiParams::new(4, 100, 8, 8192);
        assert_eq!(p.plain_modulus(), 65537);
    }

    #[test]
    fn sender_bucket_capacity_matches_literal_example() {
        let p = PsiParams::new(4, 1 << 20, 32, 8192);
        assert_eq!(p.sender_bucket_capacity(), 556);
    }

    #[test]
    fn sender_bucket_capacity_m14_row() {
        let p = PsiParams::new(4, 1 << 20, 32, 16384);
        assert_eq!(p.sender_bucket_capacity(), 318);
    }

    #[test]
    fn infeasible_receiver_size_is_rejected() {
        let result = PsiParams::new_r(1 << 20, 100, 32, 8192);
        assert!(matches!(result, Err(ParamError::TooFewBuckets { .. })));
    }

    #[test]
    fn encode_bucket_element_is_injective_for_occupied_and_empty() {
        use crate::hashing::BucketSlot;
        let p = PsiParams::new(4, 100, 32, 8192);
        let inputs = vec![0x1122_3344u64, 0xaabb_ccddu64];
        let occupied0 = p.encode_bucket_element(&inputs, BucketSlot::Occupied { input_index: 0, hash_index: 0 }, false);
        let occupied1 = p.encode_bucket_element(&inputs, BucketSlot::Occupied { input_index: 1, hash_index: 1 }, false);
        let empty_receiver = p.encode_bucket_element(&inputs, BucketSlot::Empty, true);
        let empty_sender = p.encode_bucket_element(&inputs, BucketSlot::Empty, false);
        let mut all = vec![occupied0, occupied1, empty_receiver, empty_sender];
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 4, "all four encodings must be distinct");
        assert_eq!(empty_receiver & 0b11, 3);
        assert_eq!(empty_sender & 0b11, 3);
        assert_ne!(empty_receiver, empty_sender);
    }
}
