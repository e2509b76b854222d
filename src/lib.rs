//! Crate root: public surface for the two-party labeled Private Set
//! Intersection (PSI) protocol.
//!
//! This module re-exports the pieces a caller actually wires together —
//! [`params::PsiParams`], [`receiver::Receiver`], [`sender::Sender`], and the
//! [`backend::FheBackend`] trait — and documents the protocol-wide invariants
//! that the submodules individually enforce.
//!
//! ## Invariants
//!
//! - **Field.** All polynomial arithmetic happens in ℤ/pℤ for a caller-chosen
//!   prime `p < 2^62`, represented as plain `u64` (see [`field`]). There is no
//!   elliptic-curve field or Arkworks dependency anywhere in this crate.
//!
//! - **Parameters are immutable once sealed.** A [`params::PsiParams`]
//!   becomes read-only the moment `generate_seeds`/`set_seeds_r` has run; every
//!   later protocol operation borrows it, never mutates it.
//!
//! - **No process-global secret state.** The sender's optional debug hook
//!   (`sender::DebugEvent`) is an explicit, caller-supplied closure. This
//!   crate never stashes key material in a static — see `DESIGN.md` for the
//!   upstream global-key-leak this replaces.
//!
//! - **Backend-agnostic core.** [`receiver::Receiver`] and [`sender::Sender`]
//!   are generic over [`backend::FheBackend`]; the only concrete
//!   implementations shipped are [`backend::mock::MockBackend`] (tests) and
//!   [`backend::seal::SealBackend`] (production, via the `sealy` crate).
//!
//! These invariants are enforced by the type system and by runtime checks
//! that return the error enums documented per module; this crate never
//! invokes undefined behavior to enforce them (`forbid(unsafe_code)`
//! throughout).

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

/// Modular arithmetic over a caller-chosen `< 2^62`-bit prime.
pub mod field;
/// Keyed pseudorandom permutation (`aes_hash`/`loc`) used to build hash functions.
pub mod prp;
/// Permutation-based cuckoo hashing (receiver) and complete hashing (sender).
pub mod hashing;
/// Roots-polynomial and Newton-interpolation polynomial construction mod `p`.
pub mod polynomial;
/// Receiver-side power precomputation / sender-side power reconstruction.
pub mod windowing;
/// Protocol parameter derivation: ring degree, plaintext modulus, bucket
/// count, sender capacity, partition count, window size.
pub mod params;
/// The homomorphic-encryption backend contract, plus a mock and a
/// `sealy`-backed implementation.
pub mod backend;
/// Receiver role: cuckoo-hash, window-encrypt, and later decrypt matches.
pub mod receiver;
/// Sender role: complete-hash, batched polynomial evaluation, masking.
pub mod sender;
/// Wire framing for the receiver/sender handshake (§6 of the design doc).
pub mod wire;

/// Random-input and random-label generation for tests, mirroring the
/// upstream `test_utils.{h,cpp}` helpers.
///
/// Not `#[cfg(test)]`-gated so that `tests/`-level integration tests (which
/// link this crate as an ordinary dependency, not its unit-test build) can
/// use it too; it is otherwise not meant for production call sites.
pub mod testutil;

// ============================================================================
// Root-level re-exports
// ============================================================================

pub use crate::backend::FheBackend;
pub use crate::hashing::{BucketSlot, HashingError};
pub use crate::params::{ParamError, PsiParams};
pub use crate::receiver::{Receiver, ReceiverError};
pub use crate::sender::{DebugEvent, DebugPhase, Sender, SenderError};

/// Number of cuckoo hash functions, `H = 3`. Re-exported at the root since
/// every module above agrees on this constant.
pub const HASH_FUNCTIONS: u8 = crate::hashing::HASH_FUNCTIONS;
