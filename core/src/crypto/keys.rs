//! # Key Management
//!
//! STARK-curve keypairs: private scalars, public points and the account
//! keypair that ties them to a curve instance.
//!
//! ## Conventions
//!
//! - A private key is a [`Scalar`] in `[1, N)`. Fresh keys are drawn 252 bits
//!   at a time from a CSPRNG and rejected until they land in range, so every
//!   valid key is equally likely. No modulo bias, no "close enough".
//! - A public key is the full curve point `d·G`. The network only ever
//!   stores its x-coordinate, which is what [`PublicKey::x`] returns and what
//!   account contracts are deployed with.
//! - Private keys are never logged, never serialized implicitly and print as
//!   `PrivateKey(<redacted>)`. If you need the bytes, ask for them by name.

use std::fmt;

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::constants::ConstantsError;
use super::curve::{CurvePoint, StarkCurve};
use super::field::{Felt, Scalar};
use super::signatures::{self, NonceSource, Rfc6979, Signature};

/// Errors from key handling and signing.
///
/// Intentionally terse about *why* a key was rejected; error messages end up
/// in logs and logs end up everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("invalid private key: must be a nonzero integer below the curve order")]
    InvalidPrivateKey,

    #[error("invalid public key: not a point on the curve")]
    InvalidPublicKey,

    #[error("message hash must be nonzero and below 2^251")]
    InvalidMessageHash,

    #[error("no usable signing nonce after {0} attempts")]
    SignatureDegenerate(u32),

    #[error("curve constants unavailable: {0}")]
    Constants(String),
}

impl From<ConstantsError> for KeyError {
    fn from(err: ConstantsError) -> Self {
        KeyError::Constants(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// PrivateKey
// ---------------------------------------------------------------------------

/// A secret signing scalar in `[1, N)`.
///
/// Does not implement `Serialize`. Exporting a private key should be a
/// deliberate act, so the only way out is [`PrivateKey::to_bytes_be`].
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(Scalar);

impl PrivateKey {
    /// Draws a fresh key from the OS RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut OsRng)
    }

    /// Draws a fresh key from the given CSPRNG.
    ///
    /// Candidates are 252 random bits; anything `>= N` or zero is thrown
    /// away. `N` is just above `2^251`, so about half the draws survive.
    pub fn generate_with<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        loop {
            let mut bytes = [0u8; 32];
            rng.fill_bytes(&mut bytes);
            bytes[0] &= 0x0f;
            if let Ok(key) = Self::from_bytes_be(&bytes) {
                return key;
            }
        }
    }

    /// Wraps a scalar, rejecting zero.
    pub fn from_scalar(scalar: Scalar) -> Result<Self, KeyError> {
        if scalar.is_zero() {
            return Err(KeyError::InvalidPrivateKey);
        }
        Ok(Self(scalar))
    }

    /// Strict big-endian parse: rejects zero and anything `>= N`.
    pub fn from_bytes_be(bytes: &[u8; 32]) -> Result<Self, KeyError> {
        let scalar = Scalar::from_bytes_be(bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Self::from_scalar(scalar)
    }

    /// Parses a `0x`-prefixed (or bare) hex private key.
    ///
    /// Handy for devnet keys in environment variables. For anything that
    /// holds real funds, keep keys out of plain text.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let felt = Felt::from_hex(s).map_err(|_| KeyError::InvalidPrivateKey)?;
        Self::from_felt(&felt)
    }

    pub fn from_felt(value: &Felt) -> Result<Self, KeyError> {
        let scalar = Scalar::from_felt(value).map_err(|_| KeyError::InvalidPrivateKey)?;
        Self::from_scalar(scalar)
    }

    /// Raw key material. **Handle with care.**
    pub fn to_bytes_be(&self) -> [u8; 32] {
        self.0.to_bytes_be()
    }

    pub(crate) fn scalar(&self) -> &Scalar {
        &self.0
    }

    /// `d·G`, computed with the fixed-length ladder.
    pub fn public_key(&self, curve: &StarkCurve) -> PublicKey {
        PublicKey {
            point: curve.mul_generator(&self.0),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// The public half of a keypair.
///
/// Serializes as its x-coordinate, the form the network stores.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    point: CurvePoint,
}

impl PublicKey {
    /// Validates an externally supplied point.
    pub fn from_point(point: CurvePoint) -> Result<Self, KeyError> {
        if point.is_infinity() || !point.is_on_curve() {
            return Err(KeyError::InvalidPublicKey);
        }
        Ok(Self { point })
    }

    /// Recovers a public key from its x-coordinate alone.
    ///
    /// Which of the two `y` roots comes back is unspecified; verification
    /// accepts either.
    pub fn from_x(x: Felt) -> Result<Self, KeyError> {
        let point = CurvePoint::from_x(x).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { point })
    }

    pub fn point(&self) -> &CurvePoint {
        &self.point
    }

    /// The x-coordinate: what account contracts call "the public key".
    pub fn x(&self) -> Felt {
        // Constructors reject infinity.
        self.point.x().unwrap_or_default()
    }

    pub fn to_hex(&self) -> String {
        self.x().to_hex()
    }

    /// Checks `signature` over `msg_hash`. Never fails, just says no.
    pub fn verify(&self, curve: &StarkCurve, msg_hash: &Felt, signature: &Signature) -> bool {
        signatures::verify(curve, self, msg_hash, signature)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.x().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let x = Felt::deserialize(deserializer)?;
        PublicKey::from_x(x).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// StarkKeypair
// ---------------------------------------------------------------------------

/// A private key, its public key and the curve they live on.
///
/// This is what an [`Account`](crate::account::Account) signs with. The
/// public key is derived once at construction.
#[derive(Clone)]
pub struct StarkKeypair {
    curve: StarkCurve,
    private_key: PrivateKey,
    public_key: PublicKey,
}

impl StarkKeypair {
    pub fn new(curve: StarkCurve, private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key(&curve);
        Self {
            curve,
            private_key,
            public_key,
        }
    }

    /// Fresh keypair on the process-wide curve, keyed from the OS RNG.
    pub fn generate() -> Result<Self, KeyError> {
        Ok(Self::new(StarkCurve::shared()?, PrivateKey::generate()))
    }

    pub fn curve(&self) -> &StarkCurve {
        &self.curve
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Signs with RFC 6979 nonces: same key and hash, same signature.
    pub fn sign(&self, msg_hash: &Felt) -> Result<Signature, KeyError> {
        self.sign_with(msg_hash, &mut Rfc6979)
    }

    pub fn sign_with<N: NonceSource + ?Sized>(
        &self,
        msg_hash: &Felt,
        nonces: &mut N,
    ) -> Result<Signature, KeyError> {
        signatures::sign(&self.curve, &self.private_key, msg_hash, nonces)
    }

    pub fn verify(&self, msg_hash: &Felt, signature: &Signature) -> bool {
        self.public_key.verify(&self.curve, msg_hash, signature)
    }
}

impl fmt::Debug for StarkKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StarkKeypair(pub={})", self.public_key.to_hex())
    }
}
