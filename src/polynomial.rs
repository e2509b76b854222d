//! Polynomial construction over ℤ/pℤ: the roots polynomial used to build
//! `f(x) = Π(x - bucket element)`, and Newton-form interpolation used to
//! build the labeled-PSI `g(x)` with `g(bucket element) = label`.
//!
//! Coefficients are always stored low-degree-first, matching the upstream
//! `vector<uint64_t>` convention.

#![forbid(unsafe_code)]

use std::collections::HashSet;

use crate::field::{addmod, invmod, mulmod, submod};

/// `roots_poly(roots, p)`: coefficients of `Π(x - roots[i]) mod p`.
///
/// O(n²) incremental build: start from the constant polynomial `[1]` and
/// multiply in `(x - r)` one root at a time. Output length is
/// `roots.len() + 1`.
pub fn roots_poly(roots: &[u64], p: u64) -> Vec<u64> {
    let mut result = vec![0u64; roots.len() + 1];
    result[0] = 1 % p;

    for (i, &root) in roots.iter().enumerate() {
        let neg_root = p - (root % p);
        for j in (1..=i + 1).rev() {
            result[j] = addmod(result[j - 1], mulmod(neg_root, result[j], p), p);
        }
        result[0] = mulmod(result[0], neg_root, p);
    }

    result
}

/// `interp_poly(xs, ys, p)`: the unique `≤ (n-1)`-degree polynomial through
/// `(xs[i], ys[i])`, computed via Newton's divided differences and then
/// expanded to monomial form.
///
/// Duplicate `xs` are deduplicated first (first occurrence wins), since the
/// sender's labeled variant builds interpolation points from bucket slots
/// whose encoded form can collide; without dedup, a repeated `x` would make
/// a divided-difference denominator zero.
pub fn interp_poly(xs: &[u64], ys: &[u64], p: u64) -> Vec<u64> {
    assert_eq!(xs.len(), ys.len(), "interp_poly: xs and ys must have equal length");

    let mut seen = HashSet::with_capacity(xs.len());
    let mut dedup_xs = Vec::with_capacity(xs.len());
    let mut dedup_ys = Vec::with_capacity(xs.len());
    for (&x, &y) in xs.iter().zip(ys.iter()) {
        if seen.insert(x % p) {
            dedup_xs.push(x % p);
            dedup_ys.push(y % p);
        }
    }

    let n = dedup_xs.len();
    if n == 0 {
        return Vec::new();
    }

    // Newton divided-difference table; dd[0] = ys, dd[k][i] depends on dd[k-1].
    let mut dd: Vec<Vec<u64>> = Vec::with_capacity(n);
    dd.push(dedup_ys.clone());
    for k in 1..n {
        let prev = &dd[k - 1];
        let mut row = Vec::with_capacity(n - k);
        for i in 0..(n - k) {
            let num = submod(prev[i + 1], prev[i], p);
            let den = submod(dedup_xs[i + k], dedup_xs[i], p);
            row.push(mulmod(num, invmod(den, p), p));
        }
        dd.push(row);
    }
    let newton_coeffs: Vec<u64> = (0..n).map(|k| dd[k][0]).collect();

    // Expand Newton form f(x) = c0 + c1(x-x0) + c2(x-x0)(x-x1) + ... back to
    // monomial form by folding from the highest-order term inward, the same
    // multiply-by-(x-root)-and-accumulate step `roots_poly` uses.
    let mut result = vec![newton_coeffs[n - 1]];
    for k in (0..n - 1).rev() {
        let neg_root = p - (dedup_xs[k] % p);
        let mut next = vec![0u64; result.len() + 1];
        for (j, &coeff) in result.iter().enumerate() {
            next[j] = addmod(next[j], mulmod(coeff, neg_root, p), p);
            next[j + 1] = addmod(next[j + 1], coeff, p);
        }
        next[0] = addmod(next[0], newton_coeffs[k], p);
        result = next;
    }

    result
}

/// Evaluate a low-degree-first polynomial at `x` mod `p` via Horner's method.
pub fn eval_poly(coeffs: &[u64], x: u64, p: u64) -> u64 {
    let mut acc = 0u64;
    for &c in coeffs.iter().rev() {
        acc = addmod(mulmod(acc, x, p), c, p);
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roots_poly_matches_literal_example() {
        // (x - 2)(x - 3) = x^2 - 5x + 6, mod 17.
        assert_eq!(roots_poly(&[2, 3], 17), vec![6, 12, 1]);
    }

    #[test]
    fn interp_poly_recovers_x_squared() {
        // f(1)=1, f(2)=4, f(3)=9 uniquely determines f(x) = x^2.
        assert_eq!(interp_poly(&[1, 2, 3], &[1, 4, 9], 101), vec![0, 0, 1]);
    }

    #[test]
    fn roots_poly_vanishes_at_its_roots() {
        let p = 1_000_003u64;
        let roots = [3u64, 17, 101, 9999];
        let poly = roots_poly(&roots, p);
        for &r in &roots {
            assert_eq!(eval_poly(&poly, r, p), 0);
        }
    }

    #[test]
    fn interp_poly_passes_through_every_distinct_point() {
        let p = 101u64;
        let xs = [4u64, 9, 15, 33];
        let ys = [10u64, 20, 30, 40];
        let poly = interp_poly(&xs, &ys, p);
        for (&x, &y) in xs.iter().zip(ys.iter()) {
            assert_eq!(eval_poly(&poly, x, p), y % p);
        }
    }

    #[test]
    fn interp_poly_deduplicates_first_occurrence_wins() {
        let p = 101u64;
        // x=5 appears twice with different y; first occurrence (y=7) should win.
        let xs = [5u64, 5, 8];
        let ys = [7u64, 99, 12];
        let poly = interp_poly(&xs, &ys, p);
        assert_eq!(eval_poly(&poly, 5, p), 7);
        assert_eq!(eval_poly(&poly, 8, p), 12);
    }
}
