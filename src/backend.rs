//! The FHE backend contract (§6): everything the core needs from a BFV-style,
//! CRT-batched homomorphic encryption scheme, expressed as a trait so the
//! protocol logic in `receiver.rs`/`sender.rs` never calls a concrete
//! encryption library directly.
//!
//! Two implementations are provided:
//! - [`mock`] — plain modular arithmetic standing in for ciphertexts, used by
//!   this crate's own tests (and any caller who wants to exercise the
//!   protocol's combinatorics without linking a real SEAL install).
//! - [`seal`] — a thin wrapper around the `sealy` crate's BFV bindings.

#![forbid(unsafe_code)]

/// Everything the core protocol needs from a batched, ring-LWE homomorphic
/// encryption backend. Modeled directly on the shape of `sealy::Evaluator`:
/// one associated type per plaintext/ciphertext, one method per primitive
/// operation, each fallible with the backend's own error type.
pub trait FheBackend {
    /// Batched plaintext: a vector of up to `slot_count()` field elements.
    type Plaintext: Clone;
    /// Opaque ciphertext carrying a noise budget.
    type Ciphertext: Clone;
    /// Public encryption key.
    type PublicKey;
    /// Secret decryption key.
    type SecretKey;
    /// Relinearization keys, produced from a secret key.
    type RelinKeys;
    /// Backend-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Number of CRT slots per plaintext/ciphertext (`N`, the ring degree).
    fn slot_count(&self) -> usize;

    /// The plaintext modulus `p`.
    fn plain_modulus(&self) -> u64;

    /// Batch-encode up to `slot_count()` field elements into one plaintext.
    fn encode(&self, values: &[u64]) -> Result<Self::Plaintext, Self::Error>;

    /// Inverse of [`Self::encode`].
    fn decode(&self, plaintext: &Self::Plaintext) -> Result<Vec<u64>, Self::Error>;

    /// Generate a fresh `(public key, secret key)` pair.
    fn keygen(&self) -> Result<(Self::PublicKey, Self::SecretKey), Self::Error>;

    /// Generate relinearization keys for `secret_key` (decomposition bit
    /// count 8, matching the backend contract).
    fn relin_keys(&self, secret_key: &Self::SecretKey) -> Result<Self::RelinKeys, Self::Error>;

    /// Encrypt a plaintext under `pk`.
    fn encrypt(&self, plaintext: &Self::Plaintext, pk: &Self::PublicKey) -> Result<Self::Ciphertext, Self::Error>;

    /// Decrypt a ciphertext under `sk`.
    fn decrypt(&self, ciphertext: &Self::Ciphertext, sk: &Self::SecretKey) -> Result<Self::Plaintext, Self::Error>;

    /// `a + b`.
    fn add(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext, Self::Error>;

    /// `a += b`.
    fn add_inplace(&self, a: &mut Self::Ciphertext, b: &Self::Ciphertext) -> Result<(), Self::Error>;

    /// `a + b` where `b` is a plaintext.
    fn add_plain(&self, a: &Self::Ciphertext, b: &Self::Plaintext) -> Result<Self::Ciphertext, Self::Error>;

    /// `a * b`. Caller must relinearize afterward.
    fn multiply(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext, Self::Error>;

    /// `a * b` where `b` is a plaintext. `b` must not be identically zero —
    /// backends are permitted to error or panic on a zero plaintext operand.
    fn multiply_plain(&self, a: &Self::Ciphertext, b: &Self::Plaintext) -> Result<Self::Ciphertext, Self::Error>;

    /// Relinearize `a` in place, shrinking it back to two polynomials.
    fn relinearize_inplace(&self, a: &mut Self::Ciphertext, rk: &Self::RelinKeys) -> Result<(), Self::Error>;

    /// True if every slot of `plaintext` is zero (used to skip multiply-by-
    /// zero terms per §4.5.3 step d).
    fn is_plaintext_zero(&self, plaintext: &Self::Plaintext) -> bool;

    /// Serialize a ciphertext for the wire (`Ciphertext.save` upstream).
    fn serialize_ciphertext(&self, ciphertext: &Self::Ciphertext) -> Result<Vec<u8>, Self::Error>;

    /// Inverse of [`Self::serialize_ciphertext`] (`Ciphertext.load` upstream).
    fn deserialize_ciphertext(&self, bytes: &[u8]) -> Result<Self::Ciphertext, Self::Error>;

    /// Serialize a public key for the wire.
    fn serialize_public_key(&self, public_key: &Self::PublicKey) -> Result<Vec<u8>, Self::Error>;

    /// Inverse of [`Self::serialize_public_key`].
    fn deserialize_public_key(&self, bytes: &[u8]) -> Result<Self::PublicKey, Self::Error>;

    /// Serialize relinearization keys for the wire.
    fn serialize_relin_keys(&self, relin_keys: &Self::RelinKeys) -> Result<Vec<u8>, Self::Error>;

    /// Inverse of [`Self::serialize_relin_keys`].
    fn deserialize_relin_keys(&self, bytes: &[u8]) -> Result<Self::RelinKeys, Self::Error>;
}

/// An in-memory mock backend: ciphertexts *are* plaintexts, operations are
/// plain modular arithmetic. No noise budget, no security — exists purely so
/// the protocol's combinatorics can be tested without a SEAL install.
pub mod mock {
    use super::FheBackend;
    use crate::field::{addmod, mulmod};

    /// A plaintext/ciphertext slot vector, padded to `slot_count`.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct MockVector(pub Vec<u64>);

    /// The mock backend never fails.
    #[derive(Debug, thiserror::Error)]
    #[error("unreachable: the mock backend has no failure modes")]
    pub struct MockError;

    /// Mock FHE backend parameterized by `(slot_count, plain_modulus)`.
    pub struct MockBackend {
        slot_count: usize,
        plain_modulus: u64,
    }

    impl MockBackend {
        /// Construct a mock backend with `slot_count` CRT slots mod `plain_modulus`.
        pub fn new(slot_count: usize, plain_modulus: u64) -> Self {
            Self { slot_count, plain_modulus }
        }
    }

    impl FheBackend for MockBackend {
        type Plaintext = MockVector;
        type Ciphertext = MockVector;
        type PublicKey = ();
        type SecretKey = ();
        type RelinKeys = ();
        type Error = MockError;

        fn slot_count(&self) -> usize {
            self.slot_count
        }

        fn plain_modulus(&self) -> u64 {
            self.plain_modulus
        }

        fn encode(&self, values: &[u64]) -> Result<Self::Plaintext, Self::Error> {
            let mut v = vec![0u64; self.slot_count];
            for (slot, &value) in v.iter_mut().zip(values.iter()) {
                *slot = value % self.plain_modulus;
            }
            Ok(MockVector(v))
        }

        fn decode(&self, plaintext: &Self::Plaintext) -> Result<Vec<u64>, Self::Error> {
            Ok(plaintext.0.clone())
        }

        fn keygen(&self) -> Result<(Self::PublicKey, Self::SecretKey), Self::Error> {
            Ok(((), ()))
        }

        fn relin_keys(&self, _secret_key: &Self::SecretKey) -> Result<Self::RelinKeys, Self::Error> {
            Ok(())
        }

        fn encrypt(&self, plaintext: &Self::Plaintext, _pk: &Self::PublicKey) -> Result<Self::Ciphertext, Self::Error> {
            Ok(plaintext.clone())
        }

        fn decrypt(&self, ciphertext: &Self::Ciphertext, _sk: &Self::SecretKey) -> Result<Self::Plaintext, Self::Error> {
            Ok(ciphertext.clone())
        }

        fn add(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext, Self::Error> {
            let mut out = a.clone();
            self.add_inplace(&mut out, b)?;
            Ok(out)
        }

        fn add_inplace(&self, a: &mut Self::Ciphertext, b: &Self::Ciphertext) -> Result<(), Self::Error> {
            for (x, y) in a.0.iter_mut().zip(b.0.iter()) {
                *x = addmod(*x, *y, self.plain_modulus);
            }
            Ok(())
        }

        fn add_plain(&self, a: &Self::Ciphertext, b: &Self::Plaintext) -> Result<Self::Ciphertext, Self::Error> {
            self.add(a, b)
        }

        fn multiply(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext, Self::Error> {
            let mut out = a.clone();
            for (x, y) in out.0.iter_mut().zip(b.0.iter()) {
                *x = mulmod(*x, *y, self.plain_modulus);
            }
            Ok(out)
        }

        fn multiply_plain(&self, a: &Self::Ciphertext, b: &Self::Plaintext) -> Result<Self::Ciphertext, Self::Error> {
            self.multiply(a, b)
        }

        fn relinearize_inplace(&self, _a: &mut Self::Ciphertext, _rk: &Self::RelinKeys) -> Result<(), Self::Error> {
            Ok(())
        }

        fn is_plaintext_zero(&self, plaintext: &Self::Plaintext) -> bool {
            plaintext.0.iter().all(|&v| v == 0)
        }

        fn serialize_ciphertext(&self, ciphertext: &Self::Ciphertext) -> Result<Vec<u8>, Self::Error> {
            Ok(ciphertext.0.iter().flat_map(|v| v.to_be_bytes()).collect())
        }

        fn deserialize_ciphertext(&self, bytes: &[u8]) -> Result<Self::Ciphertext, Self::Error> {
            Ok(MockVector(bytes.chunks_exact(8).map(|c| u64::from_be_bytes(c.try_into().unwrap())).collect()))
        }

        fn serialize_public_key(&self, _public_key: &Self::PublicKey) -> Result<Vec<u8>, Self::Error> {
            Ok(Vec::new())
        }

        fn deserialize_public_key(&self, _bytes: &[u8]) -> Result<Self::PublicKey, Self::Error> {
            Ok(())
        }

        fn serialize_relin_keys(&self, _relin_keys: &Self::RelinKeys) -> Result<Vec<u8>, Self::Error> {
            Ok(Vec::new())
        }

        fn deserialize_relin_keys(&self, _bytes: &[u8]) -> Result<Self::RelinKeys, Self::Error> {
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn encrypt_decrypt_round_trips() {
            let backend = MockBackend::new(8, 101);
            let (pk, sk) = backend.keygen().unwrap();
            let pt = backend.encode(&[1, 2, 3]).unwrap();
            let ct = backend.encrypt(&pt, &pk).unwrap();
            let back = backend.decrypt(&ct, &sk).unwrap();
            assert_eq!(backend.decode(&back).unwrap()[..3], [1, 2, 3]);
        }

        #[test]
        fn add_and_multiply_are_pointwise() {
            let backend = MockBackend::new(4, 101);
            let a = backend.encode(&[1, 2, 3, 4]).unwrap();
            let b = backend.encode(&[10, 10, 10, 10]).unwrap();
            let sum = backend.add(&a, &b).unwrap();
            assert_eq!(backend.decode(&sum).unwrap(), vec![11, 12, 13, 14]);
            let prod = backend.multiply(&a, &b).unwrap();
            assert_eq!(backend.decode(&prod).unwrap(), vec![10, 20, 30, 40]);
        }

        #[test]
        fn ciphertext_serialization_round_trips() {
            let backend = MockBackend::new(4, 101);
            let ct = backend.encode(&[7, 8, 9, 10]).unwrap();
            let bytes = backend.serialize_ciphertext(&ct).unwrap();
            let back = backend.deserialize_ciphertext(&bytes).unwrap();
            assert_eq!(ct, back);
        }
    }
}

/// A backend wrapping Microsoft SEAL's BFV scheme via the `sealy` crate.
///
/// This is the production backend the CLI binaries use; `mock::MockBackend`
/// exists so the protocol logic can be unit-tested independently of SEAL.
/// Excluded entirely under the `mock-backend` feature so that building and
/// testing this crate never requires a real SEAL installation.
#[cfg(not(feature = "mock-backend"))]
pub mod seal {
    use super::FheBackend;

    /// Errors from the SEAL-backed implementation: everything `sealy` can
    /// report, pass-through.
    #[derive(Debug, thiserror::Error)]
    pub enum SealBackendError {
        /// A `sealy` call failed.
        #[error("seal backend error: {0}")]
        Seal(#[from] sealy::Error),
        /// A plaintext operand to `multiply_plain` was identically zero.
        #[error("multiply_plain called with a zero plaintext")]
        ZeroPlaintextMultiply,
    }

    /// BFV parameters matching the backend contract of §6: ring degree `N`,
    /// a 128-bit-security coefficient modulus for that `N`, and plaintext
    /// modulus `p`.
    pub struct SealBackend {
        context: sealy::Context,
        encoder: sealy::BFVEncoder,
        evaluator: sealy::BFVEvaluator,
        plain_modulus: u64,
    }

    impl SealBackend {
        /// Build a SEAL context for ring degree `n` and plaintext modulus `p`,
        /// using SEAL's default 128-bit-security coefficient modulus for `n`.
        pub fn new(n: usize, plain_modulus: u64) -> Result<Self, SealBackendError> {
            let params = sealy::EncryptionParametersBuilder::new()
                .set_poly_modulus_degree(n as u64)
                .set_coefficient_modulus(sealy::CoefficientModulus::bfv_default(
                    n as u64,
                    sealy::SecurityLevel::Tc128,
                )?)
                .set_plain_modulus(sealy::PlainModulus::raw(plain_modulus)?)
                .build()?;
            let context = sealy::Context::new(&params, true, sealy::SecurityLevel::Tc128)?;
            let encoder = sealy::BFVEncoder::new(&context)?;
            let evaluator = sealy::BFVEvaluator::new(&context)?;
            Ok(Self { context, encoder, evaluator, plain_modulus })
        }
    }

    impl FheBackend for SealBackend {
        type Plaintext = sealy::Plaintext;
        type Ciphertext = sealy::Ciphertext;
        type PublicKey = sealy::PublicKey;
        type SecretKey = sealy::SecretKey;
        type RelinKeys = sealy::RelinearizationKeys;
        type Error = SealBackendError;

        fn slot_count(&self) -> usize {
            self.encoder.get_slot_count()
        }

        fn plain_modulus(&self) -> u64 {
            self.plain_modulus
        }

        fn encode(&self, values: &[u64]) -> Result<Self::Plaintext, Self::Error> {
            Ok(self.encoder.encode_unsigned(values)?)
        }

        fn decode(&self, plaintext: &Self::Plaintext) -> Result<Vec<u64>, Self::Error> {
            Ok(self.encoder.decode_unsigned(plaintext)?)
        }

        fn keygen(&self) -> Result<(Self::PublicKey, Self::SecretKey), Self::Error> {
            let keygen = sealy::KeyGenerator::new(&self.context)?;
            let sk = keygen.secret_key();
            let pk = keygen.create_public_key();
            Ok((pk, sk))
        }

        fn relin_keys(&self, secret_key: &Self::SecretKey) -> Result<Self::RelinKeys, Self::Error> {
            let keygen = sealy::KeyGenerator::new_from_secret_key(&self.context, secret_key.clone())?;
            Ok(keygen.create_relinearization_keys()?)
        }

        fn encrypt(&self, plaintext: &Self::Plaintext, pk: &Self::PublicKey) -> Result<Self::Ciphertext, Self::Error> {
            let encryptor = sealy::Encryptor::with_public_key(&self.context, pk)?;
            Ok(encryptor.encrypt(plaintext)?)
        }

        fn decrypt(&self, ciphertext: &Self::Ciphertext, sk: &Self::SecretKey) -> Result<Self::Plaintext, Self::Error> {
            let decryptor = sealy::Decryptor::new(&self.context, sk)?;
            Ok(decryptor.decrypt(ciphertext)?)
        }

        fn add(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext, Self::Error> {
            Ok(self.evaluator.add(a, b)?)
        }

        fn add_inplace(&self, a: &mut Self::Ciphertext, b: &Self::Ciphertext) -> Result<(), Self::Error> {
            Ok(self.evaluator.add_inplace(a, b)?)
        }

        fn add_plain(&self, a: &Self::Ciphertext, b: &Self::Plaintext) -> Result<Self::Ciphertext, Self::Error> {
            Ok(self.evaluator.add_plain(a, b)?)
        }

        fn multiply(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext, Self::Error> {
            Ok(self.evaluator.multiply(a, b)?)
        }

        fn multiply_plain(&self, a: &Self::Ciphertext, b: &Self::Plaintext) -> Result<Self::Ciphertext, Self::Error> {
            Ok(self.evaluator.multiply_plain(a, b)?)
        }

        fn relinearize_inplace(&self, a: &mut Self::Ciphertext, rk: &Self::RelinKeys) -> Result<(), Self::Error> {
            Ok(self.evaluator.relinearize_inplace(a, rk)?)
        }

        fn is_plaintext_zero(&self, plaintext: &Self::Plaintext) -> bool {
            plaintext.is_zero()
        }

        fn serialize_ciphertext(&self, ciphertext: &Self::Ciphertext) -> Result<Vec<u8>, Self::Error> {
            Ok(ciphertext.as_bytes()?)
        }

        fn deserialize_ciphertext(&self, bytes: &[u8]) -> Result<Self::Ciphertext, Self::Error> {
            Ok(sealy::Ciphertext::from_bytes(&self.context, bytes)?)
        }

        fn serialize_public_key(&self, public_key: &Self::PublicKey) -> Result<Vec<u8>, Self::Error> {
            Ok(public_key.as_bytes()?)
        }

        fn deserialize_public_key(&self, bytes: &[u8]) -> Result<Self::PublicKey, Self::Error> {
            Ok(sealy::PublicKey::from_bytes(&self.context, bytes)?)
        }

        fn serialize_relin_keys(&self, relin_keys: &Self::RelinKeys) -> Result<Vec<u8>, Self::Error> {
            Ok(relin_keys.as_bytes()?)
        }

        fn deserialize_relin_keys(&self, bytes: &[u8]) -> Result<Self::RelinKeys, Self::Error> {
            Ok(sealy::RelinearizationKeys::from_bytes(&self.context, bytes)?)
        }
    }
}
