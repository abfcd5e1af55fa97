//! # Prime Field Arithmetic
//!
//! Everything in this crate eventually bottoms out in two prime fields:
//!
//! - **`Felt`**: integers modulo the network prime
//!   `P = 2^251 + 17·2^192 + 1`. Curve coordinates, hashes, addresses,
//!   calldata, nonces and fees are all `Felt`s.
//! - **`Scalar`**: integers modulo the curve order `N`. Private keys and
//!   the `s` half of a signature live here.
//!
//! Both are fixed-width (four 64-bit limbs) Montgomery-form integers built on
//! `ark-ff`. The modulus is baked into the type, so there is no runtime
//! modulus to get wrong and every operation re-reduces automatically: a value
//! outside `[0, P)` simply cannot be constructed.
//!
//! Parsing is strict. `from_hex("0x8000…0001")` (that is, `P` itself) is an
//! error, not a silent zero. Reducing modulo the prime is available but you
//! have to ask for it by name ([`Felt::from_bytes_be_mod_order`]).

use std::fmt;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use ark_ff::fields::{Fp256, MontBackend, MontConfig};
use ark_ff::{BigInt, BigInteger, Field, One, PrimeField, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(MontConfig)]
#[modulus = "3618502788666131213697322783095070105623107215331596699973092056135872020481"]
#[generator = "3"]
pub struct FeltConfig;

#[derive(MontConfig)]
#[modulus = "3618502788666131213697322783095070105526743751716087489154079457884512865583"]
#[generator = "3"]
pub struct ScalarConfig;

type FeltRepr = Fp256<MontBackend<FeltConfig, 4>>;
type ScalarRepr = Fp256<MontBackend<ScalarConfig, 4>>;

/// Maximum length of a Cairo short string (31 bytes fit below `P`).
pub const MAX_SHORT_STRING_LENGTH: usize = 31;

/// Errors raised while turning external input into field elements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("invalid hex field element: {0}")]
    InvalidHex(String),

    #[error("value is not below the field modulus")]
    OutOfRange,

    #[error("short string is {0} bytes, at most 31 fit in a field element")]
    ShortStringTooLong(usize),

    #[error("short strings must be ASCII")]
    NonAsciiShortString,
}

/// Arithmetic failures. Always fatal to the single operation that hit them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("scalar is out of range for the curve order")]
    InvalidScalar,

    #[error("point does not satisfy the curve equation")]
    PointNotOnCurve,
}

// ---------------------------------------------------------------------------
// Felt
// ---------------------------------------------------------------------------

/// An element of the network's base field, always in `[0, P)`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Felt(FeltRepr);

impl Felt {
    /// Additive identity.
    pub fn zero() -> Self {
        Self(FeltRepr::zero())
    }

    /// Multiplicative identity.
    pub fn one() -> Self {
        Self(FeltRepr::one())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Parses a big-endian 32-byte integer, rejecting values `>= P`.
    pub fn from_bytes_be(bytes: &[u8; 32]) -> Result<Self, FieldError> {
        FeltRepr::from_bigint(bigint_from_be(bytes))
            .map(Self)
            .ok_or(FieldError::OutOfRange)
    }

    /// Interprets arbitrary big-endian bytes as an integer and reduces it
    /// modulo `P`. Only use this where reduction is the intended semantics.
    pub fn from_bytes_be_mod_order(bytes: &[u8]) -> Self {
        Self(FeltRepr::from_be_bytes_mod_order(bytes))
    }

    /// Big-endian 32-byte encoding of the canonical integer.
    pub fn to_bytes_be(&self) -> [u8; 32] {
        bigint_to_be(&self.0.into_bigint())
    }

    /// Parses a hex string with or without the `0x` prefix. Odd lengths are
    /// accepted (`0x1` is fine), values `>= P` are not.
    pub fn from_hex(s: &str) -> Result<Self, FieldError> {
        let bytes = parse_hex_32(s)?;
        Self::from_bytes_be(&bytes)
    }

    /// Minimal `0x`-prefixed lowercase hex, `0x0` for zero.
    pub fn to_hex(&self) -> String {
        minimal_hex(&self.to_bytes_be())
    }

    /// Encodes an ASCII string of at most 31 bytes as a big-endian integer,
    /// the way Cairo represents short string literals.
    pub fn from_short_string(s: &str) -> Result<Self, FieldError> {
        if !s.is_ascii() {
            return Err(FieldError::NonAsciiShortString);
        }
        if s.len() > MAX_SHORT_STRING_LENGTH {
            return Err(FieldError::ShortStringTooLong(s.len()));
        }
        let mut bytes = [0u8; 32];
        bytes[32 - s.len()..].copy_from_slice(s.as_bytes());
        // 31 bytes are always below P.
        Self::from_bytes_be(&bytes)
    }

    /// Returns bit `i` (little-endian numbering) of the canonical integer.
    pub fn bit(&self, i: usize) -> bool {
        self.0.into_bigint().get_bit(i)
    }

    /// Number of significant bits of the canonical integer.
    pub fn num_bits(&self) -> u32 {
        self.0.into_bigint().num_bits()
    }

    /// `true` when the canonical integer is strictly below `2^bits`.
    pub fn is_below_pow2(&self, bits: u32) -> bool {
        self.num_bits() <= bits
    }

    /// Returns the value as a `u64` if it fits.
    pub fn to_u64(&self) -> Option<u64> {
        let limbs = self.0.into_bigint().0;
        if limbs[1..].iter().all(|l| *l == 0) {
            Some(limbs[0])
        } else {
            None
        }
    }

    /// Returns the value as a `u128` if it fits.
    pub fn to_u128(&self) -> Option<u128> {
        let limbs = self.0.into_bigint().0;
        if limbs[2] == 0 && limbs[3] == 0 {
            Some(((limbs[1] as u128) << 64) | limbs[0] as u128)
        } else {
            None
        }
    }

    /// `self^exponent` where the exponent is the canonical integer of a felt.
    pub fn pow(&self, exponent: &Felt) -> Self {
        Self(self.0.pow(exponent.0.into_bigint()))
    }

    pub fn pow_u64(&self, exponent: u64) -> Self {
        Self(self.0.pow([exponent]))
    }

    /// Multiplicative inverse. Zero has none.
    pub fn inverse(&self) -> Result<Self, ArithmeticError> {
        self.0
            .inverse()
            .map(Self)
            .ok_or(ArithmeticError::DivisionByZero)
    }

    /// `self / rhs`.
    pub fn div(&self, rhs: &Felt) -> Result<Self, ArithmeticError> {
        Ok(*self * rhs.inverse()?)
    }

    /// A square root, if one exists. Which of the two roots comes back is
    /// unspecified; callers needing a particular one negate as required.
    pub fn sqrt(&self) -> Option<Self> {
        self.0.sqrt().map(Self)
    }

    pub fn square(&self) -> Self {
        Self(self.0.square())
    }

    pub fn double(&self) -> Self {
        Self(self.0.double())
    }

    pub(crate) fn into_repr(self) -> BigInt<4> {
        self.0.into_bigint()
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        Self(FeltRepr::from(value))
    }
}

impl From<u128> for Felt {
    fn from(value: u128) -> Self {
        Self(FeltRepr::from(value))
    }
}

impl From<usize> for Felt {
    fn from(value: usize) -> Self {
        Self(FeltRepr::from(value as u64))
    }
}

impl FromStr for Felt {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Add for Felt {
    type Output = Felt;
    fn add(self, rhs: Felt) -> Felt {
        Felt(self.0 + rhs.0)
    }
}

impl Sub for Felt {
    type Output = Felt;
    fn sub(self, rhs: Felt) -> Felt {
        Felt(self.0 - rhs.0)
    }
}

impl Mul for Felt {
    type Output = Felt;
    fn mul(self, rhs: Felt) -> Felt {
        Felt(self.0 * rhs.0)
    }
}

impl Neg for Felt {
    type Output = Felt;
    fn neg(self) -> Felt {
        Felt(-self.0)
    }
}

impl AddAssign for Felt {
    fn add_assign(&mut self, rhs: Felt) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Felt {
    fn sub_assign(&mut self, rhs: Felt) {
        self.0 -= rhs.0;
    }
}

impl MulAssign for Felt {
    fn mul_assign(&mut self, rhs: Felt) {
        self.0 *= rhs.0;
    }
}

impl fmt::Display for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Felt({})", self.to_hex())
    }
}

impl fmt::LowerHex for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        if f.alternate() {
            write!(f, "{}", hex)
        } else {
            write!(f, "{}", &hex[2..])
        }
    }
}

impl Serialize for Felt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Felt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Felt::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Scalar
// ---------------------------------------------------------------------------

/// An integer modulo the curve order `N`.
///
/// Scalars never leave this crate as raw integers except through
/// [`Scalar::to_felt`]; `N < P`, so that conversion is always exact.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scalar(ScalarRepr);

impl Scalar {
    pub fn zero() -> Self {
        Self(ScalarRepr::zero())
    }

    pub fn one() -> Self {
        Self(ScalarRepr::one())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Strict conversion: fails with `InvalidScalar` if `value >= N`.
    pub fn from_felt(value: &Felt) -> Result<Self, ArithmeticError> {
        ScalarRepr::from_bigint(value.into_repr())
            .map(Self)
            .ok_or(ArithmeticError::InvalidScalar)
    }

    /// Reduces a felt modulo `N`.
    pub fn from_felt_mod_order(value: &Felt) -> Self {
        Self(ScalarRepr::from_be_bytes_mod_order(&value.to_bytes_be()))
    }

    /// Strict big-endian parse, rejecting values `>= N`.
    pub fn from_bytes_be(bytes: &[u8; 32]) -> Result<Self, ArithmeticError> {
        ScalarRepr::from_bigint(bigint_from_be(bytes))
            .map(Self)
            .ok_or(ArithmeticError::InvalidScalar)
    }

    /// Interprets arbitrary big-endian bytes and reduces them modulo `N`.
    pub fn from_bytes_be_mod_order(bytes: &[u8]) -> Self {
        Self(ScalarRepr::from_be_bytes_mod_order(bytes))
    }

    pub fn to_bytes_be(&self) -> [u8; 32] {
        bigint_to_be(&self.0.into_bigint())
    }

    /// The scalar's canonical integer as a base-field element.
    pub fn to_felt(&self) -> Felt {
        // N < P, so every canonical scalar is a canonical felt.
        Felt(FeltRepr::from_bigint(self.0.into_bigint()).unwrap_or_default())
    }

    pub fn bit(&self, i: usize) -> bool {
        self.0.into_bigint().get_bit(i)
    }

    pub fn num_bits(&self) -> u32 {
        self.0.into_bigint().num_bits()
    }

    pub fn inverse(&self) -> Result<Self, ArithmeticError> {
        self.0
            .inverse()
            .map(Self)
            .ok_or(ArithmeticError::DivisionByZero)
    }
}

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        Self(ScalarRepr::from(value))
    }
}

impl Add for Scalar {
    type Output = Scalar;
    fn add(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 + rhs.0)
    }
}

impl Sub for Scalar {
    type Output = Scalar;
    fn sub(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 - rhs.0)
    }
}

impl Mul for Scalar {
    type Output = Scalar;
    fn mul(self, rhs: Scalar) -> Scalar {
        Scalar(self.0 * rhs.0)
    }
}

impl Neg for Scalar {
    type Output = Scalar;
    fn neg(self) -> Scalar {
        Scalar(-self.0)
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar({})", minimal_hex(&self.to_bytes_be()))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn bigint_from_be(bytes: &[u8; 32]) -> BigInt<4> {
    let mut limbs = [0u64; 4];
    for (i, limb) in limbs.iter_mut().enumerate() {
        let start = 32 - 8 * (i + 1);
        let mut chunk = [0u8; 8];
        chunk.copy_from_slice(&bytes[start..start + 8]);
        *limb = u64::from_be_bytes(chunk);
    }
    BigInt::new(limbs)
}

fn bigint_to_be(value: &BigInt<4>) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (i, limb) in value.0.iter().enumerate() {
        let start = 32 - 8 * (i + 1);
        out[start..start + 8].copy_from_slice(&limb.to_be_bytes());
    }
    out
}

fn parse_hex_32(s: &str) -> Result<[u8; 32], FieldError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.is_empty() || digits.len() > 64 {
        return Err(FieldError::InvalidHex(s.to_string()));
    }
    let padded = if digits.len() % 2 == 1 {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };
    let decoded = hex::decode(&padded).map_err(|_| FieldError::InvalidHex(s.to_string()))?;
    let mut bytes = [0u8; 32];
    bytes[32 - decoded.len()..].copy_from_slice(&decoded);
    Ok(bytes)
}

fn minimal_hex(bytes: &[u8; 32]) -> String {
    let full = hex::encode(bytes);
    let trimmed = full.trim_start_matches('0');
    if trimmed.is_empty() {
        "0x0".to_string()
    } else {
        format!("0x{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P_HEX: &str = "0x800000000000011000000000000000000000000000000000000000000000001";

    fn felt(s: &str) -> Felt {
        Felt::from_hex(s).unwrap()
    }

    #[test]
    fn modulus_itself_is_rejected() {
        assert_eq!(Felt::from_hex(P_HEX), Err(FieldError::OutOfRange));
    }

    #[test]
    fn p_minus_one_is_the_largest_element() {
        let max = felt("0x800000000000011000000000000000000000000000000000000000000000000");
        assert_eq!(max + Felt::one(), Felt::zero());
        assert_eq!(-Felt::one(), max);
    }

    #[test]
    fn hex_parsing_accepts_prefix_and_odd_length() {
        assert_eq!(felt("0x1"), Felt::from(1u64));
        assert_eq!(felt("ff"), Felt::from(255u64));
        assert_eq!(felt("0X0a"), Felt::from(10u64));
    }

    #[test]
    fn hex_parsing_rejects_garbage() {
        assert!(matches!(Felt::from_hex(""), Err(FieldError::InvalidHex(_))));
        assert!(matches!(Felt::from_hex("0x"), Err(FieldError::InvalidHex(_))));
        assert!(matches!(Felt::from_hex("0xzz"), Err(FieldError::InvalidHex(_))));
        let too_long = format!("0x{}", "1".repeat(65));
        assert!(matches!(Felt::from_hex(&too_long), Err(FieldError::InvalidHex(_))));
    }

    #[test]
    fn to_hex_is_minimal() {
        assert_eq!(Felt::zero().to_hex(), "0x0");
        assert_eq!(Felt::from(0x1234u64).to_hex(), "0x1234");
        let h = "0x49ee3eba8c1600700ee1b87eb599f16716b0b1022947733551fde4050ca6804";
        assert_eq!(felt(h).to_hex(), h);
    }

    #[test]
    fn subtraction_wraps_around_the_modulus() {
        let a = Felt::from(3u64);
        let b = Felt::from(5u64);
        assert_eq!(a - b + b, a);
        assert_eq!(
            (a - b).to_hex(),
            "0x800000000000010ffffffffffffffffffffffffffffffffffffffffffffffff"
        );
    }

    #[test]
    fn inverse_of_zero_is_division_by_zero() {
        assert_eq!(Felt::zero().inverse(), Err(ArithmeticError::DivisionByZero));
        assert_eq!(Scalar::zero().inverse(), Err(ArithmeticError::DivisionByZero));
    }

    #[test]
    fn inverse_roundtrips() {
        let x = felt("0x1ef15c18599971b7beced415a40f0c7deacfd9b0d1819e03d723d8bc943cfca");
        let inv = x.inverse().unwrap();
        assert_eq!(x * inv, Felt::one());
        assert_eq!(x.div(&x).unwrap(), Felt::one());
    }

    #[test]
    fn pow_matches_repeated_multiplication() {
        let x = Felt::from(7u64);
        assert_eq!(x.pow_u64(3), x * x * x);
        assert_eq!(x.pow(&Felt::from(3u64)), x * x * x);
        assert_eq!(x.pow_u64(0), Felt::one());
    }

    #[test]
    fn fermat_little_theorem_holds() {
        // x^(P-1) = 1 for nonzero x.
        let p_minus_one = -Felt::one();
        let x = Felt::from(123_456_789u64);
        assert_eq!(x.pow(&p_minus_one), Felt::one());
    }

    #[test]
    fn sqrt_of_square_is_a_root() {
        let x = Felt::from(42u64);
        let root = x.square().sqrt().unwrap();
        assert!(root == x || root == -x);
    }

    #[test]
    fn bytes_roundtrip() {
        let x = felt("0x3ca0cfe4b3bc6ddf346d49d06ea0ed34e621062c0e056c1d0405d266e10268a");
        assert_eq!(Felt::from_bytes_be(&x.to_bytes_be()).unwrap(), x);
    }

    #[test]
    fn reduction_must_be_requested_explicitly() {
        let mut p_bytes = [0u8; 32];
        p_bytes.copy_from_slice(&hex::decode(format!("0{}", &P_HEX[2..])).unwrap());
        assert!(Felt::from_bytes_be(&p_bytes).is_err());
        assert_eq!(Felt::from_bytes_be_mod_order(&p_bytes), Felt::zero());
    }

    #[test]
    fn bits_are_little_endian() {
        let x = Felt::from(0b1010u64);
        assert!(!x.bit(0));
        assert!(x.bit(1));
        assert!(!x.bit(2));
        assert!(x.bit(3));
        assert_eq!(x.num_bits(), 4);
        assert!(x.is_below_pow2(4));
        assert!(!x.is_below_pow2(3));
    }

    #[test]
    fn short_string_encoding() {
        assert_eq!(
            Felt::from_short_string("SN_GOERLI").unwrap(),
            felt("0x534e5f474f45524c49")
        );
        assert_eq!(Felt::from_short_string("").unwrap(), Felt::zero());
        assert_eq!(
            Felt::from_short_string(&"a".repeat(32)),
            Err(FieldError::ShortStringTooLong(32))
        );
        assert_eq!(
            Felt::from_short_string("caf\u{e9}"),
            Err(FieldError::NonAsciiShortString)
        );
    }

    #[test]
    fn integer_conversions() {
        assert_eq!(Felt::from(u64::MAX).to_u64(), Some(u64::MAX));
        assert_eq!(Felt::from(u128::MAX).to_u128(), Some(u128::MAX));
        assert_eq!(Felt::from(u128::MAX).to_u64(), None);
        assert_eq!((-Felt::one()).to_u128(), None);
    }

    #[test]
    fn serde_uses_hex_strings() {
        let x = Felt::from(255u64);
        let json = serde_json::to_string(&x).unwrap();
        assert_eq!(json, "\"0xff\"");
        let back: Felt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, x);
        assert!(serde_json::from_str::<Felt>("\"0xnothex\"").is_err());
    }

    #[test]
    fn ordering_follows_the_integer_value() {
        assert!(Felt::from(1u64) < Felt::from(2u64));
        assert!(Felt::from(u64::MAX) < felt("0x10000000000000000"));
    }

    #[test]
    fn scalar_rejects_values_at_or_above_curve_order() {
        let n = felt("0x800000000000010ffffffffffffffffb781126dcae7b2321e66a241adc64d2f");
        assert_eq!(Scalar::from_felt(&n), Err(ArithmeticError::InvalidScalar));
        assert_eq!(Scalar::from_felt_mod_order(&n), Scalar::zero());
        let below = n - Felt::one();
        let s = Scalar::from_felt(&below).unwrap();
        assert_eq!(s + Scalar::one(), Scalar::zero());
        assert_eq!(s.to_felt(), below);
    }

    #[test]
    fn scalar_inverse_roundtrips() {
        let s = Scalar::from(987_654_321u64);
        assert_eq!(s * s.inverse().unwrap(), Scalar::one());
    }
}
