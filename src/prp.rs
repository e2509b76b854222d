//! Keyed pseudorandom permutation over 128-bit blocks, and the two hash
//! primitives built on top of it (`aes_hash`, `loc`).
//!
//! The only cryptographic primitive consumed here is a single encrypt-one-
//! block call; everything else in this module is combinatorics. We use the
//! `aes` crate's fixed-key `Aes128` block cipher as the permutation, the same
//! way the AES-NI intrinsics were used upstream for a keyed PRP rather than
//! for authenticated encryption.

#![forbid(unsafe_code)]

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;

/// Expand a 64-bit seed into a 128-bit AES key by repeating it twice.
///
/// The hash functions only need a keyed permutation, not key secrecy against
/// related-key attacks, so a simple deterministic expansion of the seed is
/// sufficient and keeps `PSIParams::seeds` at the 64-bit width the wire
/// format (§6) already carries.
fn expand_key(seed: u64) -> Aes128 {
    let mut key = [0u8; 16];
    key[0..8].copy_from_slice(&seed.to_be_bytes());
    key[8..16].copy_from_slice(&seed.to_be_bytes());
    Aes128::new(GenericArray::from_slice(&key))
}

/// Encrypt the 128-bit block `(high, low)` under `seed` and return the two
/// 64-bit halves of the ciphertext, high half first.
fn encrypt_block(seed: u64, high: u64, low: u64) -> (u64, u64) {
    let cipher = expand_key(seed);
    let mut block = [0u8; 16];
    block[0..8].copy_from_slice(&high.to_be_bytes());
    block[8..16].copy_from_slice(&low.to_be_bytes());
    let mut ga = *GenericArray::from_slice(&block);
    cipher.encrypt_block(&mut ga);
    let hi = u64::from_be_bytes(ga[0..8].try_into().expect("8 bytes"));
    let lo = u64::from_be_bytes(ga[8..16].try_into().expect("8 bytes"));
    (hi, lo)
}

#[inline]
fn mask_low_bits(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// `aes_hash(seed, bits, v) = (E_seed(0 ‖ v).low XOR v) & mask_low_bits(bits)`.
///
/// `bits` must be `< 64`; the protocol only ever calls this with `bits = m`,
/// the bucket-count exponent, which is 13 or 14.
pub fn aes_hash(seed: u64, bits: u32, v: u64) -> u64 {
    debug_assert!(bits < 64, "aes_hash bits must be < 64, got {bits}");
    let (_, low) = encrypt_block(seed, 0, v);
    (low ^ v) & mask_low_bits(bits)
}

/// `loc(seed, m, v) = aes_hash(seed, m, v >> m) XOR (v & ((1 << m) - 1))`.
///
/// Permutation-based hashing: fixing the low `m` bits of `v` and varying the
/// high bits traces out a permutation of `[0, 2^m)`, so it is safe to drop
/// the low `m` bits of `v` once it has been placed at `loc(seed, m, v)`.
pub fn loc(seed: u64, m: u32, v: u64) -> u64 {
    let low_mask = mask_low_bits(m);
    aes_hash(seed, m, v >> m) ^ (v & low_mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn loc_is_a_permutation_for_fixed_high_bits() {
        let seed = 0xdead_beef_cafe_babeu64;
        let m = 8u32;
        let high = 0x1234u64;
        let mut seen = HashSet::new();
        for low in 0..(1u64 << m) {
            let v = (high << m) | low;
            let out = loc(seed, m, v);
            assert!(out < (1u64 << m));
            assert!(seen.insert(out), "loc collided within a fixed-high-bits run");
        }
        assert_eq!(seen.len(), 1usize << m);
    }

    #[test]
    fn loc_differs_across_seeds_almost_always() {
        let m = 10u32;
        let v = 0xabc123u64;
        let a = loc(1, m, v);
        let b = loc(2, m, v);
        assert_ne!(a, b);
    }

    #[test]
    fn aes_hash_respects_bit_mask() {
        let seed = 42u64;
        for bits in [1u32, 4, 13, 14, 32, 63] {
            let v = 0x1122_3344_5566_7788u64;
            let h = aes_hash(seed, bits, v);
            assert!(h <= mask_low_bits(bits));
        }
    }
}
