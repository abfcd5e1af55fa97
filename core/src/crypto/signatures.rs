//! # Signatures
//!
//! ECDSA over the STARK curve, in the variant the network's account
//! contracts verify:
//!
//! ```text
//! sign(d, z):   R = k·G          r = R.x        (1 <= r < 2^251)
//!               s = (z + r·d)/k  (mod N)        w = 1/s (1 <= w < 2^251)
//! verify(Q, z): x( w·(z·G ± r·Q) ) == r
//! ```
//!
//! Signatures are not recoverable; the verifier needs the public key. The
//! `±` exists because a public key recovered from its x-coordinate may come
//! back with either `y`.
//!
//! ## Nonces
//!
//! Reusing `k` across two messages leaks the private key in two lines of
//! algebra. Nonces therefore come from a [`NonceSource`]:
//!
//! - [`Rfc6979`] (the default) derives `k` from the key and the message
//!   with HMAC-SHA256, so signing needs no randomness at all.
//! - [`RandomNonce`] draws `k` from a CSPRNG.
//!
//! If a nonce produces a degenerate `r`, `s` or `w` we ask the source for
//! the next one, up to [`MAX_SIGNING_ATTEMPTS`] times.

use std::fmt;

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use super::curve::StarkCurve;
use super::field::{Felt, Scalar};
use super::keys::{KeyError, PrivateKey, PublicKey};
use crate::config::{ECDSA_BITS, MAX_SIGNING_ATTEMPTS};

type HmacSha256 = Hmac<Sha256>;

/// An `(r, s)` signature pair.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub r: Felt,
    pub s: Felt,
}

impl Signature {
    pub fn new(r: Felt, s: Felt) -> Self {
        Self { r, s }
    }

    /// The two-element form account contracts receive.
    pub fn to_vec(&self) -> Vec<Felt> {
        vec![self.r, self.s]
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(r={}, s={})", self.r, self.s)
    }
}

// ---------------------------------------------------------------------------
// Nonce sources
// ---------------------------------------------------------------------------

/// Supplies the per-signature secret `k`.
///
/// `attempt` counts from zero and increases each time the previous nonce
/// turned out degenerate; a source must return a different `k` for each
/// attempt on the same message.
pub trait NonceSource {
    fn nonce(&mut self, key: &PrivateKey, msg_hash: &Felt, attempt: u32) -> Scalar;
}

/// Deterministic nonces per RFC 6979 with HMAC-SHA256.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rfc6979;

impl NonceSource for Rfc6979 {
    fn nonce(&mut self, key: &PrivateKey, msg_hash: &Felt, attempt: u32) -> Scalar {
        rfc6979_nonce(&key.to_bytes_be(), &msg_hash.to_bytes_be(), attempt)
    }
}

/// Nonces straight from a CSPRNG.
#[derive(Debug, Clone)]
pub struct RandomNonce<R> {
    rng: R,
}

impl<R: RngCore + CryptoRng> RandomNonce<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomNonce<OsRng> {
    pub fn os() -> Self {
        Self::new(OsRng)
    }
}

impl<R: RngCore + CryptoRng> NonceSource for RandomNonce<R> {
    fn nonce(&mut self, _key: &PrivateKey, _msg_hash: &Felt, _attempt: u32) -> Scalar {
        loop {
            let mut bytes = [0u8; 32];
            self.rng.fill_bytes(&mut bytes);
            bytes[0] &= 0x0f;
            if let Ok(k) = Scalar::from_bytes_be(&bytes) {
                if !k.is_zero() {
                    return k;
                }
            }
        }
    }
}

fn hmac(key: &[u8; 32], parts: &[&[u8]]) -> [u8; 32] {
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts keys of any length"),
    };
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// `bits2int` for a 252-bit order: keep the leftmost 252 bits of a 256-bit
/// string.
fn bits2int(bytes: &[u8; 32]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut carry = 0u8;
    for (i, byte) in bytes.iter().enumerate() {
        out[i] = carry | (byte >> 4);
        carry = byte << 4;
    }
    out
}

/// RFC 6979 §3.2, returning the `attempt`-th in-range candidate.
///
/// The message hash is fed to the DRBG as its full 32-byte value. Signable
/// hashes are below `2^251 < N`, so it is already reduced; running it
/// through `bits2int` would drop its low nibble and hand sixteen
/// neighbouring hashes the same `k`.
fn rfc6979_nonce(secret: &[u8; 32], msg_hash: &[u8; 32], attempt: u32) -> Scalar {
    let h1 = msg_hash;

    let mut v = [0x01u8; 32];
    let mut k = [0x00u8; 32];
    k = hmac(&k, &[&v, &[0x00], secret, h1]);
    v = hmac(&k, &[&v]);
    k = hmac(&k, &[&v, &[0x01], secret, h1]);
    v = hmac(&k, &[&v]);

    let mut skipped = 0;
    loop {
        v = hmac(&k, &[&v]);
        if let Ok(candidate) = Scalar::from_bytes_be(&bits2int(&v)) {
            if !candidate.is_zero() {
                if skipped == attempt {
                    return candidate;
                }
                skipped += 1;
            }
        }
        k = hmac(&k, &[&v, &[0x00]]);
        v = hmac(&k, &[&v]);
    }
}

// ---------------------------------------------------------------------------
// Sign / verify
// ---------------------------------------------------------------------------

fn is_valid_message_hash(msg_hash: &Felt) -> bool {
    !msg_hash.is_zero() && msg_hash.is_below_pow2(ECDSA_BITS)
}

/// Signs `msg_hash`, drawing nonces from `nonces` until one works.
///
/// Fails with `InvalidMessageHash` for a zero hash or one at or above
/// `2^251`, and with `SignatureDegenerate` if every attempt was degenerate.
pub fn sign<N: NonceSource + ?Sized>(
    curve: &StarkCurve,
    key: &PrivateKey,
    msg_hash: &Felt,
    nonces: &mut N,
) -> Result<Signature, KeyError> {
    if !is_valid_message_hash(msg_hash) {
        return Err(KeyError::InvalidMessageHash);
    }
    for attempt in 0..MAX_SIGNING_ATTEMPTS {
        let k = nonces.nonce(key, msg_hash, attempt);
        match sign_with_nonce(curve, key, msg_hash, &k) {
            Err(KeyError::SignatureDegenerate(_)) => {
                debug!(attempt, "degenerate signing nonce, retrying");
            }
            other => return other,
        }
    }
    Err(KeyError::SignatureDegenerate(MAX_SIGNING_ATTEMPTS))
}

/// Signs with an explicit nonce `k`. No retries.
///
/// Exposed for reference-vector tests and for callers bringing their own
/// nonce discipline. Never reuse `k`.
pub fn sign_with_nonce(
    curve: &StarkCurve,
    key: &PrivateKey,
    msg_hash: &Felt,
    k: &Scalar,
) -> Result<Signature, KeyError> {
    if !is_valid_message_hash(msg_hash) {
        return Err(KeyError::InvalidMessageHash);
    }
    let degenerate = KeyError::SignatureDegenerate(1);
    if k.is_zero() {
        return Err(degenerate);
    }

    let r = match curve.mul_generator(k).x() {
        Some(r) if !r.is_zero() && r.is_below_pow2(ECDSA_BITS) => r,
        _ => return Err(degenerate),
    };

    // r and z are below 2^251 < N, so the conversions are exact.
    let r_scalar = Scalar::from_felt_mod_order(&r);
    let z = Scalar::from_felt_mod_order(msg_hash);
    let k_inv = k.inverse().map_err(|_| degenerate.clone())?;
    let s = (z + r_scalar * *key.scalar()) * k_inv;
    if s.is_zero() {
        return Err(degenerate);
    }
    let w = s.inverse().map_err(|_| degenerate.clone())?;
    if !w.to_felt().is_below_pow2(ECDSA_BITS) {
        return Err(degenerate);
    }

    Ok(Signature { r, s: s.to_felt() })
}

/// Verifies `signature` over `msg_hash` against `public_key`.
///
/// Returns `false` for anything malformed: zero or oversized components, a
/// hash out of range, a signature that simply doesn't match. Never panics.
pub fn verify(
    curve: &StarkCurve,
    public_key: &PublicKey,
    msg_hash: &Felt,
    signature: &Signature,
) -> bool {
    let Signature { r, s } = signature;
    if !msg_hash.is_below_pow2(ECDSA_BITS) {
        return false;
    }
    if r.is_zero() || !r.is_below_pow2(ECDSA_BITS) {
        return false;
    }
    let Ok(s_scalar) = Scalar::from_felt(s) else {
        return false;
    };
    let Ok(w) = s_scalar.inverse() else {
        return false;
    };
    let w = w.to_felt();
    if w.is_zero() || !w.is_below_pow2(ECDSA_BITS) {
        return false;
    }

    let z_g = curve.scalar_mul(msg_hash, &curve.generator());
    let r_q = curve.scalar_mul(r, public_key.point());

    [z_g.add(&r_q), z_g.sub(&r_q)]
        .iter()
        .any(|candidate| candidate.mul(&w).x().as_ref() == Some(r))
}
