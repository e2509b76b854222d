//! The protocol's wire format (§6): big-endian length-prefixed records with
//! 32-bit magic tags, carried over `std::net::TcpStream`. Grounded on
//! `Networking`'s `read_*`/`write_*` method pairs, generalized to any
//! [`FheBackend`] via its `serialize_*`/`deserialize_*` methods rather than
//! calling directly into a single hardcoded encryption library.

#![forbid(unsafe_code)]

use std::io::{self, Read, Write};

use crate::backend::FheBackend;

/// Errors from reading or writing a framed record.
#[derive(Debug, thiserror::Error)]
pub enum WireError<E> {
    /// The 32-bit tag at the start of a record didn't match what was expected.
    #[error("expected magic tag {expected:#010x}, got {got:#010x}")]
    BadMagic { expected: u32, got: u32 },
    /// The stream ended before a complete record could be read.
    #[error("stream truncated while reading a record")]
    Truncated,
    /// Underlying I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The backend failed to (de)serialize a key or ciphertext.
    #[error("backend (de)serialization error: {0}")]
    Backend(E),
}

const MAGIC_HELLO: u32 = 0x5052_4956; // "PRIV" (first four bytes of "PRIVCATS")
const MAGIC_VUI8: u32 = 0x7675_6938; // "vui8"
const MAGIC_CIPT: u32 = 0x6369_7074; // "cipt"
const MAGIC_VCIP: u32 = 0x7663_6970; // "vcip"
const MAGIC_VVCI: u32 = 0x7676_6369; // "vvci"
const MAGIC_PKEY: u32 = 0x706b_6579; // "pkey"
const MAGIC_RELN: u32 = 0x7265_6c6e; // "reln"

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn write_u32<W: Write>(w: &mut W, value: u32) -> io::Result<()> {
    w.write_all(&value.to_be_bytes())
}

fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

fn write_u64<W: Write>(w: &mut W, value: u64) -> io::Result<()> {
    w.write_all(&value.to_be_bytes())
}

fn expect_magic<R: Read, E>(r: &mut R, expected: u32) -> Result<(), WireError<E>> {
    let got = read_u32(r)?;
    if got != expected {
        return Err(WireError::BadMagic { expected, got });
    }
    Ok(())
}

fn read_blob<R: Read, E>(r: &mut R) -> Result<Vec<u8>, WireError<E>> {
    let len = read_u32(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).map_err(|e| if e.kind() == io::ErrorKind::UnexpectedEof { WireError::Truncated } else { e.into() })?;
    Ok(buf)
}

fn write_blob<W: Write, E>(w: &mut W, bytes: &[u8]) -> Result<(), WireError<E>> {
    write_u32(w, bytes.len() as u32)?;
    w.write_all(bytes)?;
    Ok(())
}

/// `PRIVCATS` hello: an 8-byte session value (the peer's set size).
pub fn write_hello<W: Write, E>(w: &mut W, session_size: u64) -> Result<(), WireError<E>> {
    write_u32(w, MAGIC_HELLO)?;
    write_u64(w, session_size)?;
    Ok(())
}

/// Read a `PRIVCATS` hello, returning the peer's session size.
pub fn read_hello<R: Read, E>(r: &mut R) -> Result<u64, WireError<E>> {
    expect_magic(r, MAGIC_HELLO)?;
    Ok(read_u64(r)?)
}

/// `vui8`: a length-prefixed vector of `uint64`s (used for hash seeds).
pub fn write_u64_vec<W: Write, E>(w: &mut W, values: &[u64]) -> Result<(), WireError<E>> {
    write_u32(w, MAGIC_VUI8)?;
    write_u32(w, values.len() as u32)?;
    for &v in values {
        write_u64(w, v)?;
    }
    Ok(())
}

/// Inverse of [`write_u64_vec`].
pub fn read_u64_vec<R: Read, E>(r: &mut R) -> Result<Vec<u64>, WireError<E>> {
    expect_magic(r, MAGIC_VUI8)?;
    let n = read_u32(r)? as usize;
    (0..n).map(|_| Ok(read_u64(r)?)).collect()
}

/// `cipt`: one backend-serialized ciphertext.
pub fn write_ciphertext<W: Write, B: FheBackend>(w: &mut W, backend: &B, ciphertext: &B::Ciphertext) -> Result<(), WireError<B::Error>> {
    write_u32(w, MAGIC_CIPT)?;
    let bytes = backend.serialize_ciphertext(ciphertext).map_err(WireError::Backend)?;
    write_blob(w, &bytes)
}

/// Inverse of [`write_ciphertext`].
pub fn read_ciphertext<R: Read, B: FheBackend>(r: &mut R, backend: &B) -> Result<B::Ciphertext, WireError<B::Error>> {
    expect_magic(r, MAGIC_CIPT)?;
    let bytes = read_blob(r)?;
    backend.deserialize_ciphertext(&bytes).map_err(WireError::Backend)
}

/// `vcip`: a length-prefixed vector of ciphertexts.
pub fn write_ciphertext_vec<W: Write, B: FheBackend>(w: &mut W, backend: &B, ciphertexts: &[B::Ciphertext]) -> Result<(), WireError<B::Error>> {
    write_u32(w, MAGIC_VCIP)?;
    write_u32(w, ciphertexts.len() as u32)?;
    for ct in ciphertexts {
        let bytes = backend.serialize_ciphertext(ct).map_err(WireError::Backend)?;
        write_blob(w, &bytes)?;
    }
    Ok(())
}

/// Inverse of [`write_ciphertext_vec`].
pub fn read_ciphertext_vec<R: Read, B: FheBackend>(r: &mut R, backend: &B) -> Result<Vec<B::Ciphertext>, WireError<B::Error>> {
    expect_magic(r, MAGIC_VCIP)?;
    let n = read_u32(r)? as usize;
    (0..n)
        .map(|_| {
            let bytes = read_blob(r)?;
            backend.deserialize_ciphertext(&bytes).map_err(WireError::Backend)
        })
        .collect()
}

/// `vvci`: a length-prefixed vector of ciphertext vectors (the receiver's
/// per-window ciphertexts, or the sender's per-partition results).
pub fn write_ciphertext_vec_vec<W: Write, B: FheBackend>(w: &mut W, backend: &B, ciphertexts: &[Vec<B::Ciphertext>]) -> Result<(), WireError<B::Error>> {
    write_u32(w, MAGIC_VVCI)?;
    write_u32(w, ciphertexts.len() as u32)?;
    for row in ciphertexts {
        write_u32(w, row.len() as u32)?;
        for ct in row {
            let bytes = backend.serialize_ciphertext(ct).map_err(WireError::Backend)?;
            write_blob(w, &bytes)?;
        }
    }
    Ok(())
}

/// Inverse of [`write_ciphertext_vec_vec`].
pub fn read_ciphertext_vec_vec<R: Read, B: FheBackend>(r: &mut R, backend: &B) -> Result<Vec<Vec<B::Ciphertext>>, WireError<B::Error>> {
    expect_magic(r, MAGIC_VVCI)?;
    let rows = read_u32(r)? as usize;
    (0..rows)
        .map(|_| {
            let n = read_u32(r)? as usize;
            (0..n)
                .map(|_| {
                    let bytes = read_blob(r)?;
                    backend.deserialize_ciphertext(&bytes).map_err(WireError::Backend)
                })
                .collect()
        })
        .collect()
}

/// `pkey`: a backend-serialized public key.
pub fn write_public_key<W: Write, B: FheBackend>(w: &mut W, backend: &B, public_key: &B::PublicKey) -> Result<(), WireError<B::Error>> {
    write_u32(w, MAGIC_PKEY)?;
    let bytes = backend.serialize_public_key(public_key).map_err(WireError::Backend)?;
    write_blob(w, &bytes)
}

/// Inverse of [`write_public_key`].
pub fn read_public_key<R: Read, B: FheBackend>(r: &mut R, backend: &B) -> Result<B::PublicKey, WireError<B::Error>> {
    expect_magic(r, MAGIC_PKEY)?;
    let bytes = read_blob(r)?;
    backend.deserialize_public_key(&bytes).map_err(WireError::Backend)
}

/// `reln`: backend-serialized relinearization keys.
pub fn write_relin_keys<W: Write, B: FheBackend>(w: &mut W, backend: &B, relin_keys: &B::RelinKeys) -> Result<(), WireError<B::Error>> {
    write_u32(w, MAGIC_RELN)?;
    let bytes = backend.serialize_relin_keys(relin_keys).map_err(WireError::Backend)?;
    write_blob(w, &bytes)
}

/// Inverse of [`write_relin_keys`].
pub fn read_relin_keys<R: Read, B: FheBackend>(r: &mut R, backend: &B) -> Result<B::RelinKeys, WireError<B::Error>> {
    expect_magic(r, MAGIC_RELN)?;
    let bytes = read_blob(r)?;
    backend.deserialize_relin_keys(&bytes).map_err(WireError::Backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use std::io::Cursor;

    #[test]
    fn hello_round_trips() {
        let mut buf = Vec::new();
        write_hello::<_, ()>(&mut buf, 42).unwrap();
        let mut cursor = Cursor::new(buf);
        let size = read_hello::<_, ()>(&mut cursor).unwrap();
        assert_eq!(size, 42);
    }

    #[test]
    fn bad_magic_is_reported() {
        let mut buf = Vec::new();
        write_u64_vec::<_, ()>(&mut buf, &[1, 2, 3]).unwrap();
        let mut cursor = Cursor::new(buf);
        let result = read_hello::<_, ()>(&mut cursor);
        assert!(matches!(result, Err(WireError::BadMagic { .. })));
    }

    #[test]
    fn u64_vec_round_trips() {
        let mut buf = Vec::new();
        let values = vec![0xdead_beefu64, 1, 2, u64::MAX];
        write_u64_vec::<_, ()>(&mut buf, &values).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_u64_vec::<_, ()>(&mut cursor).unwrap(), values);
    }

    #[test]
    fn ciphertext_round_trips_through_a_backend() {
        let backend = MockBackend::new(4, 101);
        let pt = backend.encode(&[5, 6, 7, 8]).unwrap();
        let (pk, _sk) = backend.keygen().unwrap();
        let ct = backend.encrypt(&pt, &pk).unwrap();

        let mut buf = Vec::new();
        write_ciphertext(&mut buf, &backend, &ct).unwrap();
        let mut cursor = Cursor::new(buf);
        let back = read_ciphertext(&mut cursor, &backend).unwrap();
        assert_eq!(back, ct);
    }

    #[test]
    fn ciphertext_vec_round_trips() {
        let backend = MockBackend::new(4, 101);
        let (pk, _sk) = backend.keygen().unwrap();
        let cts: Vec<_> = (0..3)
            .map(|i| backend.encrypt(&backend.encode(&[i, i + 1]).unwrap(), &pk).unwrap())
            .collect();

        let mut buf = Vec::new();
        write_ciphertext_vec(&mut buf, &backend, &cts).unwrap();
        let mut cursor = Cursor::new(buf);
        let back = read_ciphertext_vec(&mut cursor, &backend).unwrap();
        assert_eq!(back, cts);
    }
}
