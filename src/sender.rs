//! Sender side of the protocol (§4.5.3): batched polynomial evaluation
//! against the receiver's window ciphertexts.

#![forbid(unsafe_code)]

use rand::{CryptoRng, Rng};

use crate::backend::FheBackend;
use crate::hashing::{complete_hash, BucketSlot, HashingError};
use crate::params::PsiParams;
use crate::polynomial::{interp_poly, roots_poly};
use crate::windowing;

/// Errors from the sender role.
#[derive(Debug, thiserror::Error)]
pub enum SenderError<E> {
    /// Complete-hashing the sender's set failed (a row overflowed).
    #[error(transparent)]
    Hashing(#[from] HashingError),
    /// The backend reported an error.
    #[error("backend error: {0}")]
    Backend(E),
    /// `labels` was supplied with a different length than `inputs`.
    #[error("labels length {labels_len} does not match inputs length {inputs_len}")]
    LabelCountMismatch { labels_len: usize, inputs_len: usize },
}

/// Which step of the per-partition evaluation a [`DebugEvent`] was emitted
/// from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugPhase {
    /// After adding in the term for a given polynomial degree.
    Term,
    /// After the first random mask (unlabeled result, or `F` in labeled mode).
    Mask,
    /// After the second random mask applied before adding in `G` (labeled mode only).
    SecondMask,
    /// After `F' + G` (labeled mode only).
    FinalAdd,
}

/// Diagnostic snapshot passed to an optional debug hook during
/// [`Sender::compute_matches`]. Replaces the upstream implementation's
/// global secret-key leak: a caller who wants to inspect noise budgets
/// during development constructs the hook themselves, with their own
/// (test-only) access to the receiver's secret key.
pub struct DebugEvent<'a, C> {
    /// Which partition this event belongs to.
    pub partition: usize,
    /// The polynomial degree just processed, if this is a [`DebugPhase::Term`] event.
    pub degree: Option<usize>,
    /// Which step of the evaluation this is.
    pub phase: DebugPhase,
    /// The ciphertext as it stands after this step.
    pub ciphertext: &'a C,
}

/// Draw `slot_count` independent uniform elements of `[1, plain_modulus)`.
fn random_mask<R: Rng + ?Sized>(rng: &mut R, slot_count: usize, plain_modulus: u64) -> Vec<u64> {
    (0..slot_count).map(|_| 1 + rng.gen_range(0..plain_modulus - 1)).collect()
}

/// Multiply `ciphertext` by a fresh random nonzero mask and relinearize, in
/// place.
fn multiply_by_random_mask<B: FheBackend, R: Rng + ?Sized>(
    backend: &B,
    rng: &mut R,
    ciphertext: &mut B::Ciphertext,
    slot_count: usize,
    plain_modulus: u64,
    relin_keys: &B::RelinKeys,
) -> Result<(), B::Error> {
    let mask = random_mask(rng, slot_count, plain_modulus);
    let mask_pt = backend.encode(&mask)?;
    let mut masked = backend.multiply_plain(ciphertext, &mask_pt)?;
    backend.relinearize_inplace(&mut masked, relin_keys)?;
    *ciphertext = masked;
    Ok(())
}

/// The sender's role: holds only protocol parameters, since the sender
/// never generates key material.
pub struct Sender<B: FheBackend> {
    params: PsiParams,
    backend: B,
}

impl<B: FheBackend> Sender<B> {
    /// Construct a sender for `params` using `backend` for all homomorphic
    /// operations.
    pub fn new(params: PsiParams, backend: B) -> Self {
        Self { params, backend }
    }

    /// The backend this session uses, for serializing ciphertexts on the wire.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Compute the batched matching ciphertexts (§4.5.3).
    ///
    /// `labels`, if present, must have the same length as `inputs`; the
    /// result then has `2 * sender_partition_count()` ciphertexts
    /// (alternating match, label-carrying), otherwise `sender_partition_count()`.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_matches<R: Rng + CryptoRng + ?Sized>(
        &self,
        rng: &mut R,
        inputs: &[u64],
        labels: Option<&[u64]>,
        receiver_public_key: &B::PublicKey,
        relin_keys: &B::RelinKeys,
        receiver_inputs: &[B::Ciphertext],
        mut debug_hook: Option<&mut dyn FnMut(DebugEvent<B::Ciphertext>)>,
    ) -> Result<Vec<B::Ciphertext>, SenderError<B::Error>> {
        assert_eq!(inputs.len(), self.params.sender_size(), "inputs.len() must equal sender_size");
        if let Some(labels) = labels {
            if labels.len() != inputs.len() {
                return Err(SenderError::LabelCountMismatch { labels_len: labels.len(), inputs_len: inputs.len() });
            }
        }

        let plain_modulus = self.params.plain_modulus();
        let bucket_count_log = self.params.bucket_count_log();
        let bucket_count = self.params.bucket_count();
        let capacity = self.params.sender_bucket_capacity();
        let buckets = complete_hash(rng, inputs, bucket_count_log, capacity, self.params.seeds())?;

        let partition_count = self.params.sender_partition_count();
        assert!(capacity >= partition_count, "sender_bucket_capacity must be at least sender_partition_count");
        let max_partition_size = (capacity + partition_count - 1) / partition_count;
        let big_partition_count = capacity - (max_partition_size - 1) * partition_count;

        tracing::debug!(
            sender_size = inputs.len(),
            labeled = labels.is_some(),
            partition_count,
            max_partition_size,
            big_partition_count,
            "partitioned sender buckets, reconstructing powers"
        );

        let powers = windowing::compute_powers(&self.backend, receiver_inputs, self.params.window_size(), max_partition_size, relin_keys)
            .map_err(SenderError::Backend)?;

        let mut result = vec![None; if labels.is_some() { 2 * partition_count } else { partition_count }];

        for partition in 0..partition_count {
            let (partition_size, partition_start) = if partition < big_partition_count {
                (max_partition_size, max_partition_size * partition)
            } else {
                (max_partition_size - 1, max_partition_size * partition - (partition - big_partition_count))
            };

            let mut f_coeffs: Vec<Vec<u64>> = Vec::with_capacity(bucket_count);
            let mut g_coeffs: Vec<Vec<u64>> = Vec::with_capacity(if labels.is_some() { bucket_count } else { 0 });

            for j in 0..bucket_count {
                let slice = &buckets[j * capacity + partition_start..j * capacity + partition_start + partition_size];
                let current_bucket: Vec<u64> = slice
                    .iter()
                    .map(|&slot| self.params.encode_bucket_element(inputs, slot, false))
                    .collect();
                f_coeffs.push(roots_poly(&current_bucket, plain_modulus));

                if let Some(labels) = labels {
                    let mut xs = Vec::with_capacity(partition_size);
                    let mut ys = Vec::with_capacity(partition_size);
                    for (&slot, &x) in slice.iter().zip(current_bucket.iter()) {
                        if let BucketSlot::Occupied { input_index, .. } = slot {
                            xs.push(x);
                            ys.push(labels[input_index]);
                        }
                    }
                    g_coeffs.push(interp_poly(&xs, &ys, plain_modulus));
                }
            }

            let mut f_evaluated: Option<B::Ciphertext> = None;
            let mut g_evaluated: Option<B::Ciphertext> = None;

            for degree in 0..=partition_size {
                let f_coeffs_enc: Vec<u64> = (0..bucket_count).map(|k| f_coeffs[k][degree]).collect();
                let f_plain = self.backend.encode(&f_coeffs_enc).map_err(SenderError::Backend)?;

                let g_plain = if labels.is_some() {
                    let g_coeffs_enc: Vec<u64> = (0..bucket_count)
                        .map(|k| g_coeffs[k].get(degree).copied().unwrap_or(0))
                        .collect();
                    Some(self.backend.encode(&g_coeffs_enc).map_err(SenderError::Backend)?)
                } else {
                    None
                };

                if degree == 0 {
                    // The constant term has no ciphertext operand to multiply against;
                    // it is encrypted directly under the receiver's public key, and
                    // every later term is added into it.
                    f_evaluated = Some(self.backend.encrypt(&f_plain, receiver_public_key).map_err(SenderError::Backend)?);
                    if let Some(g_plain) = &g_plain {
                        g_evaluated = Some(self.backend.encrypt(g_plain, receiver_public_key).map_err(SenderError::Backend)?);
                    }
                } else {
                    if !self.backend.is_plaintext_zero(&f_plain) {
                        let mut term = self.backend.multiply_plain(&powers[degree], &f_plain).map_err(SenderError::Backend)?;
                        self.backend.relinearize_inplace(&mut term, relin_keys).map_err(SenderError::Backend)?;
                        let acc = f_evaluated.as_mut().expect("f_evaluated initialized at degree 0");
                        self.backend.add_inplace(acc, &term).map_err(SenderError::Backend)?;
                    }
                    if let Some(g_plain) = &g_plain {
                        if !self.backend.is_plaintext_zero(g_plain) {
                            let mut term = self.backend.multiply_plain(&powers[degree], g_plain).map_err(SenderError::Backend)?;
                            self.backend.relinearize_inplace(&mut term, relin_keys).map_err(SenderError::Backend)?;
                            let acc = g_evaluated.as_mut().expect("g_evaluated initialized at degree 0");
                            self.backend.add_inplace(acc, &term).map_err(SenderError::Backend)?;
                        }
                    }
                }

                if let Some(hook) = debug_hook.as_deref_mut() {
                    if let Some(f_ct) = &f_evaluated {
                        hook(DebugEvent { partition, degree: Some(degree), phase: DebugPhase::Term, ciphertext: f_ct });
                    }
                }
            }

            let mut f_evaluated = f_evaluated.expect("partition_size + 1 >= 1 so degree 0 always ran");
            let slot_count = self.backend.slot_count();
            multiply_by_random_mask(&self.backend, rng, &mut f_evaluated, slot_count, plain_modulus, relin_keys).map_err(SenderError::Backend)?;
            if let Some(hook) = debug_hook.as_deref_mut() {
                hook(DebugEvent { partition, degree: None, phase: DebugPhase::Mask, ciphertext: &f_evaluated });
            }

            if let Some(mut g_evaluated) = g_evaluated {
                result[2 * partition] = Some(f_evaluated.clone());

                multiply_by_random_mask(&self.backend, rng, &mut f_evaluated, slot_count, plain_modulus, relin_keys).map_err(SenderError::Backend)?;
                if let Some(hook) = debug_hook.as_deref_mut() {
                    hook(DebugEvent { partition, degree: None, phase: DebugPhase::SecondMask, ciphertext: &f_evaluated });
                }

                self.backend.add_inplace(&mut g_evaluated, &f_evaluated).map_err(SenderError::Backend)?;
                if let Some(hook) = debug_hook.as_deref_mut() {
                    hook(DebugEvent { partition, degree: None, phase: DebugPhase::FinalAdd, ciphertext: &g_evaluated });
                }
                result[2 * partition + 1] = Some(g_evaluated);
            } else {
                result[partition] = Some(f_evaluated);
            }

            tracing::debug!(partition, partition_size, "evaluated and masked partition");
        }

        Ok(result.into_iter().map(|c| c.expect("every partition slot is filled")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::receiver::Receiver;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn test_params() -> PsiParams {
        PsiParams::new(4, 8, 16, 8192).with_sender_partition_count(2).with_window_size(0)
    }

    #[test]
    fn unlabeled_round_trip_finds_the_intersection() {
        let params = test_params();
        let backend_r = MockBackend::new(params.poly_modulus_degree(), params.plain_modulus());
        let receiver = Receiver::new(params.clone(), backend_r).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        let receiver_inputs = vec![0x02u64, 0x07, 0x05, 0xfe];
        let (windows, buckets) = receiver.encrypt_inputs(&mut rng, &receiver_inputs).unwrap();

        let backend_s = MockBackend::new(params.poly_modulus_degree(), params.plain_modulus());
        let sender = Sender::new(params, backend_s);
        let sender_inputs = vec![0x01u64, 0x02, 0x03, 0x04, 0x07, 0x22, 0xca, 0xfe];
        let relin_keys = receiver.relin_keys().unwrap();
        let matches = sender
            .compute_matches(&mut rng, &sender_inputs, None, receiver.public_key(), &relin_keys, &windows, None)
            .unwrap();

        let matched_buckets = receiver.decrypt_matches(&matches).unwrap();
        let matched_inputs: Vec<u64> = matched_buckets
            .iter()
            .filter_map(|&b| match buckets[b] {
                BucketSlot::Occupied { input_index, .. } => Some(receiver_inputs[input_index]),
                BucketSlot::Empty => None,
            })
            .collect();

        let mut matched_inputs = matched_inputs;
        matched_inputs.sort_unstable();
        assert_eq!(matched_inputs, vec![0x02, 0x07, 0xfe]);
    }
}
