//! Receiver side of the protocol (§4.5.2, §4.5.4): cuckoo-hash the
//! receiver's set, window-encrypt it, and later decrypt the sender's
//! matches.

#![forbid(unsafe_code)]

use rand::{CryptoRng, Rng};

use crate::backend::FheBackend;
use crate::hashing::{cuckoo_hash, BucketSlot, HashingError};
use crate::params::PsiParams;
use crate::windowing;

/// Errors from the receiver role.
#[derive(Debug, thiserror::Error)]
pub enum ReceiverError<E> {
    /// Cuckoo hashing the receiver's set failed.
    #[error(transparent)]
    Hashing(#[from] HashingError),
    /// The backend reported an error.
    #[error("backend error: {0}")]
    Backend(E),
    /// `decrypt_labeled_matches` requires an even number of ciphertexts
    /// (one match ciphertext + one label ciphertext per partition).
    #[error("labeled matches must come in (match, label) pairs, got {0} ciphertexts")]
    OddLabeledCiphertextCount(usize),
}

/// Holds the receiver's keypair and parameters for one protocol session.
pub struct Receiver<B: FheBackend> {
    params: PsiParams,
    backend: B,
    public_key: B::PublicKey,
    secret_key: B::SecretKey,
}

impl<B: FheBackend> Receiver<B> {
    /// Generate a fresh keypair under `backend` for this session's `params`.
    pub fn new(params: PsiParams, backend: B) -> Result<Self, ReceiverError<B::Error>> {
        let (public_key, secret_key) = backend.keygen().map_err(ReceiverError::Backend)?;
        Ok(Self { params, backend, public_key, secret_key })
    }

    /// The public key to send to the sender.
    pub fn public_key(&self) -> &B::PublicKey {
        &self.public_key
    }

    /// The backend this session uses, for serializing keys/ciphertexts on the wire.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Fresh relinearization keys to send to the sender.
    pub fn relin_keys(&self) -> Result<B::RelinKeys, ReceiverError<B::Error>> {
        self.backend.relin_keys(&self.secret_key).map_err(ReceiverError::Backend)
    }

    /// Cuckoo-hash `inputs` (must have length `params.receiver_size()`) and
    /// encrypt the windowed representation. Returns the window ciphertexts
    /// to send to the sender, and the bucket table (so the caller can
    /// translate match bucket indices back to input elements).
    pub fn encrypt_inputs<R: Rng + CryptoRng + ?Sized>(
        &self,
        rng: &mut R,
        inputs: &[u64],
    ) -> Result<(Vec<B::Ciphertext>, Vec<BucketSlot>), ReceiverError<B::Error>> {
        assert_eq!(inputs.len(), self.params.receiver_size(), "inputs.len() must equal receiver_size");

        let bucket_count_log = self.params.bucket_count_log();
        let buckets = cuckoo_hash(rng, inputs, bucket_count_log, self.params.seeds())?;

        let plain_modulus = self.params.plain_modulus();
        let partition_count = self.params.sender_partition_count();
        let capacity = self.params.sender_bucket_capacity();
        let max_partition_size = (capacity + partition_count - 1) / partition_count;

        let bucket_count = self.params.bucket_count();
        let buckets_enc: Vec<u64> = (0..bucket_count)
            .map(|i| self.params.encode_bucket_element(inputs, buckets[i], true))
            .collect();

        let windows_plain = windowing::prepare(&buckets_enc, plain_modulus, self.params.window_size(), max_partition_size);
        tracing::debug!(
            window_size = self.params.window_size(),
            max_partition_size,
            windows = windows_plain.len(),
            "prepared window plaintexts, encrypting"
        );
        let windows_ct = windows_plain
            .iter()
            .map(|w| {
                let pt = self.backend.encode(w).map_err(ReceiverError::Backend)?;
                self.backend.encrypt(&pt, &self.public_key).map_err(ReceiverError::Backend)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((windows_ct, buckets))
    }

    /// Unlabeled match decryption (§4.5.4): decode every ciphertext and
    /// report every bucket index whose slot decoded to zero.
    pub fn decrypt_matches(&self, encrypted_matches: &[B::Ciphertext]) -> Result<Vec<usize>, ReceiverError<B::Error>> {
        let bucket_count = self.params.bucket_count();
        let mut result = Vec::new();
        for ct in encrypted_matches {
            let pt = self.backend.decrypt(ct, &self.secret_key).map_err(ReceiverError::Backend)?;
            let decoded = self.backend.decode(&pt).map_err(ReceiverError::Backend)?;
            for j in 0..bucket_count {
                if decoded[j] == 0 {
                    result.push(j);
                }
            }
        }
        tracing::debug!(matches = result.len(), "decrypted unlabeled matches");
        Ok(result)
    }

    /// Labeled match decryption (§4.5.4): `encrypted_matches` alternates
    /// `(match ciphertext, label ciphertext)` pairs. Reports `(bucket,
    /// label)` for every slot where the match ciphertext decodes to zero.
    pub fn decrypt_labeled_matches(
        &self,
        encrypted_matches: &[B::Ciphertext],
    ) -> Result<Vec<(usize, u64)>, ReceiverError<B::Error>> {
        if encrypted_matches.len() % 2 != 0 {
            return Err(ReceiverError::OddLabeledCiphertextCount(encrypted_matches.len()));
        }
        let bucket_count = self.params.bucket_count();
        let mut result = Vec::new();
        for pair in encrypted_matches.chunks_exact(2) {
            let match_pt = self.backend.decrypt(&pair[0], &self.secret_key).map_err(ReceiverError::Backend)?;
            let match_decoded = self.backend.decode(&match_pt).map_err(ReceiverError::Backend)?;
            let label_pt = self.backend.decrypt(&pair[1], &self.secret_key).map_err(ReceiverError::Backend)?;
            let label_decoded = self.backend.decode(&label_pt).map_err(ReceiverError::Backend)?;
            for j in 0..bucket_count {
                if match_decoded[j] == 0 {
                    result.push((j, label_decoded[j]));
                }
            }
        }
        tracing::debug!(matches = result.len(), "decrypted labeled matches");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn test_params() -> PsiParams {
        PsiParams::new(4, 20, 16, 8192).with_sender_partition_count(2).with_window_size(0)
    }

    #[test]
    fn encrypt_inputs_produces_one_window_ciphertext_for_w0() {
        let params = test_params();
        let backend = MockBackend::new(params.poly_modulus_degree(), params.plain_modulus());
        let receiver = Receiver::new(params, backend).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let inputs = vec![10u64, 20, 30, 40];
        let (windows, buckets) = receiver.encrypt_inputs(&mut rng, &inputs).unwrap();
        assert_eq!(windows.len(), 1, "w=0 always produces exactly one window ciphertext");
        assert_eq!(buckets.len(), receiver.params.bucket_count());
    }

    #[test]
    fn decrypt_labeled_matches_rejects_odd_count() {
        let params = test_params();
        let backend = MockBackend::new(params.poly_modulus_degree(), params.plain_modulus());
        let receiver = Receiver::new(params, backend).unwrap();
        let pt = receiver.backend.encode(&[0]).unwrap();
        let ct = receiver.backend.encrypt(&pt, &receiver.public_key).unwrap();
        let result = receiver.decrypt_labeled_matches(&[ct]);
        assert!(matches!(result, Err(ReceiverError::OddLabeledCiphertextCount(1))));
    }
}
