//! Windowing (§4.4): compresses "compute y, y², …, y^M" into a small set of
//! receiver-published window values plus a sender-side reconstruction
//! schedule, trading receiver plaintext volume for sender multiplications.
//!
//! [`prepare`] runs on the receiver's plaintext `y` vector (one field element
//! per batched slot); [`compute_powers`] runs on the sender's ciphertexts,
//! generic over whichever [`FheBackend`] is in use.

#![forbid(unsafe_code)]

use crate::backend::FheBackend;
use crate::field::mulmod;

/// Number of windows `⌈log₂(M+1)/w⌉` for window size `w ≥ 1` and maximum
/// power `max_power`. `w == 0` always uses exactly one window (`y` itself).
fn num_windows(max_power: usize, w: u32) -> usize {
    if w == 0 {
        return 1;
    }
    let bits = (usize::BITS - max_power.leading_zeros()) as usize;
    (bits + w as usize - 1) / w as usize
}

/// Receiver side: build the window plaintext vectors `W_{i,j} = y^{2^{w·i}·j}`
/// (pointwise mod `p`), flattened in `(i, j)` order, `0 ≤ i < num_windows`,
/// `1 ≤ j < 2^w`.
///
/// `w == 0` returns a single-element result containing `y` itself; the
/// sender then reconstructs every power by repeated squaring (see
/// [`compute_powers`]).
pub fn prepare(y: &[u64], p: u64, w: u32, max_power: usize) -> Vec<Vec<u64>> {
    if w == 0 {
        return vec![y.to_vec()];
    }

    let windows_per_level = (1usize << w) - 1;
    let levels = num_windows(max_power, w);
    let mut result = Vec::with_capacity(levels * windows_per_level);

    let mut base = y.to_vec();
    for _ in 0..levels {
        let mut running = base.clone();
        for j in 1..=windows_per_level {
            if j > 1 {
                for (r, b) in running.iter_mut().zip(base.iter()) {
                    *r = mulmod(*r, *b, p);
                }
            }
            result.push(running.clone());
        }
        for b in base.iter_mut() {
            *b = mulmod(*b, *b, p);
        }
        for _ in 1..w {
            for b in base.iter_mut() {
                *b = mulmod(*b, *b, p);
            }
        }
    }

    result
}

/// Sender side: given the flattened window ciphertexts produced by
/// encrypting [`prepare`]'s output (same `(i, j)` order, same `w`),
/// reconstruct `powers[1 ..= max_power]`. `powers[0]` is left as a clone of
/// `powers[1]` and must not be used by the caller.
pub fn compute_powers<B: FheBackend>(
    backend: &B,
    windows: &[B::Ciphertext],
    w: u32,
    max_power: usize,
    rk: &B::RelinKeys,
) -> Result<Vec<B::Ciphertext>, B::Error> {
    assert!(max_power >= 1, "compute_powers requires max_power >= 1");

    if w == 0 {
        let y = windows[0].clone();
        let mut powers = vec![y.clone(); max_power + 1];
        powers[1] = y;
        for k in 2..=max_power {
            let mut next = if k % 2 == 0 {
                backend.multiply(&powers[k / 2], &powers[k / 2])?
            } else {
                backend.multiply(&powers[k - 1], &powers[1])?
            };
            backend.relinearize_inplace(&mut next, rk)?;
            powers[k] = next;
        }
        return Ok(powers);
    }

    let windows_per_level = (1usize << w) - 1;
    let levels = num_windows(max_power, w);
    assert_eq!(windows.len(), levels * windows_per_level, "windows length must match (levels, w, max_power)");

    let mut powers = vec![windows[0].clone(); max_power + 1];
    for i in 0..levels {
        let step = 1usize << (w as usize * i);
        for j in 1..=windows_per_level {
            let window_ct = &windows[i * windows_per_level + (j - 1)];
            let k0 = j * step;
            if k0 <= max_power {
                powers[k0] = window_ct.clone();
            }
            if step > 1 {
                for low in 1..step {
                    let k = k0 + low;
                    if k > max_power {
                        continue;
                    }
                    let mut next = backend.multiply(&powers[low], window_ct)?;
                    backend.relinearize_inplace(&mut next, rk)?;
                    powers[k] = next;
                }
            }
        }
    }

    Ok(powers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::field::powmod;

    const P: u64 = 101;

    #[test]
    fn prepare_w0_returns_y_itself() {
        let y = vec![2, 3, 5];
        let w = prepare(&y, P, 0, 8);
        assert_eq!(w, vec![y]);
    }

    #[test]
    fn prepare_produces_correct_powers_for_w1() {
        // w=1: windows_per_level=1, so W_{i,1} = y^{2^i}.
        let y = vec![3u64];
        let max_power = 5usize;
        let windows = prepare(&y, P, 1, max_power);
        assert_eq!(windows.len(), num_windows(max_power, 1));
        for (i, window) in windows.iter().enumerate() {
            let expected = powmod(3, 1u64 << i, P);
            assert_eq!(window[0], expected, "window {i}");
        }
    }

    #[test]
    fn compute_powers_w0_matches_direct_powmod() {
        let backend = MockBackend::new(4, P);
        let y = 7u64;
        let windows_plain = prepare(&[y, y, y, y], P, 0, 10);
        let pt = backend.encode(&windows_plain[0]).unwrap();
        let (pk, sk) = backend.keygen().unwrap();
        let ct = backend.encrypt(&pt, &pk).unwrap();
        let rk = backend.relin_keys(&sk).unwrap();

        let powers = compute_powers(&backend, &[ct], 0, 10, &rk).unwrap();
        for k in 1..=10u64 {
            let decoded = backend.decode(&backend.decrypt(&powers[k as usize], &sk).unwrap()).unwrap();
            assert_eq!(decoded[0], powmod(y, k, P), "power {k}");
        }
    }

    #[test]
    fn compute_powers_w2_matches_direct_powmod() {
        let backend = MockBackend::new(4, P);
        let y = 11u64;
        let max_power = 12usize;
        let windows_plain = prepare(&[y, y, y, y], P, 2, max_power);
        let (pk, sk) = backend.keygen().unwrap();
        let rk = backend.relin_keys(&sk).unwrap();
        let windows_ct: Vec<_> = windows_plain
            .iter()
            .map(|w| backend.encrypt(&backend.encode(w).unwrap(), &pk).unwrap())
            .collect();

        let powers = compute_powers(&backend, &windows_ct, 2, max_power, &rk).unwrap();
        for k in 1..=max_power as u64 {
            let decoded = backend.decode(&backend.decrypt(&powers[k as usize], &sk).unwrap()).unwrap();
            assert_eq!(decoded[0], powmod(y, k, P), "power {k}");
        }
    }
}
