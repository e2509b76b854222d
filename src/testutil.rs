//! Random set/label generation for tests, mirroring upstream's
//! `test_utils.{h,cpp}` (`generate_random_sender_set`,
//! `generate_random_receiver_set` with `match_prob_percent`,
//! `generate_random_labels`).

#![forbid(unsafe_code)]

use std::collections::HashSet;

use rand::Rng;

/// Draw `count` distinct uniform `bits`-wide values.
pub fn generate_random_sender_set<R: Rng + ?Sized>(rng: &mut R, count: usize, bits: u32) -> Vec<u64> {
    let mut seen = HashSet::with_capacity(count);
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        let value = random_bits(rng, bits);
        if seen.insert(value) {
            out.push(value);
        }
    }
    out
}

/// Draw `count` uniform `bits`-wide labels. Unlike the sets, labels need not
/// be distinct.
pub fn generate_random_labels<R: Rng + ?Sized>(rng: &mut R, count: usize, bits: u32) -> Vec<u64> {
    (0..count).map(|_| random_bits(rng, bits)).collect()
}

/// Build a receiver set of `count` distinct values: the first
/// `count * match_prob_percent / 100` are drawn from `sender_inputs` (so they
/// are guaranteed matches), the rest are fresh random `bits`-wide values; the
/// whole vector is then Fisher-Yates shuffled so matches aren't clustered at
/// the front.
pub fn generate_random_receiver_set<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    sender_inputs: &[u64],
    bits: u32,
    match_prob_percent: u64,
) -> Vec<u64> {
    let matches = (count as u64 * match_prob_percent / 100) as usize;
    let mut seen = HashSet::with_capacity(count);
    let mut out = Vec::with_capacity(count);
    for j in 0..count {
        let value = loop {
            let candidate = if j < matches {
                sender_inputs[rng.gen_range(0..sender_inputs.len())]
            } else {
                random_bits(rng, bits)
            };
            if !seen.contains(&candidate) {
                break candidate;
            }
        };
        seen.insert(value);
        out.push(value);
    }

    for j in (1..out.len()).rev() {
        let k = rng.gen_range(0..=j);
        out.swap(j, k);
    }

    out
}

/// Uniform `bits`-wide value (`bits` in `[1, 64]`).
fn random_bits<R: Rng + ?Sized>(rng: &mut R, bits: u32) -> u64 {
    assert!(bits >= 1 && bits <= 64, "random_bits: bits must be in [1, 64], got {bits}");
    if bits == 64 {
        rng.gen()
    } else {
        rng.gen_range(0..(1u64 << bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn sender_set_is_distinct_and_within_bit_width() {
        let mut rng = StdRng::seed_from_u64(1);
        let set = generate_random_sender_set(&mut rng, 200, 10);
        let unique: HashSet<_> = set.iter().copied().collect();
        assert_eq!(unique.len(), set.len());
        assert!(set.iter().all(|&v| v < (1 << 10)));
    }

    #[test]
    fn receiver_set_honors_match_probability() {
        let mut rng = StdRng::seed_from_u64(2);
        let sender = generate_random_sender_set(&mut rng, 100, 16);
        let receiver = generate_random_receiver_set(&mut rng, 20, &sender, 16, 50);
        let sender_set: HashSet<_> = sender.iter().copied().collect();
        let overlap = receiver.iter().filter(|v| sender_set.contains(v)).count();
        assert_eq!(overlap, 10, "50% of 20 receiver elements should come from sender_inputs");
    }

    #[test]
    fn receiver_set_is_distinct() {
        let mut rng = StdRng::seed_from_u64(3);
        let sender = generate_random_sender_set(&mut rng, 50, 12);
        let receiver = generate_random_receiver_set(&mut rng, 30, &sender, 12, 100);
        let unique: HashSet<_> = receiver.iter().copied().collect();
        assert_eq!(unique.len(), receiver.len());
    }
}
