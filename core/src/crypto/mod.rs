//! # Cryptographic Primitives
//!
//! Everything security-related in the client flows through here: field
//! arithmetic, the STARK curve, Pedersen hashing, keys and signatures.
//!
//! Unlike most chains, this network did not pick an off-the-shelf curve.
//! The STARK curve lives over a 252-bit prime chosen for proof systems, not
//! for signatures, so there is no audited crate to wrap. What we can do is
//! keep the surface small:
//!
//! - [`field`]: fixed-width Montgomery arithmetic via `ark-ff`.
//! - [`constants`]: the generator, shift point and Pedersen points, loaded
//!   once per process or injected explicitly.
//! - [`curve`]: point arithmetic and scalar multiplication.
//! - [`hash`]: Pedersen and the keccak-derived selectors.
//! - [`keys`] / [`signatures`]: ECDSA as the account contracts verify it.
//!
//! Every value here is checked against published reference vectors in the
//! unit tests. If you touch the math, those tests are the contract.

pub mod constants;
pub mod curve;
pub mod field;
pub mod hash;
pub mod keys;
pub mod signatures;

pub use constants::{ConstantsError, CurveConstants};
pub use curve::{AffinePoint, CurvePoint, StarkCurve};
pub use field::{ArithmeticError, Felt, FieldError, Scalar};
pub use hash::{selector_from_name, starknet_keccak};
pub use keys::{KeyError, PrivateKey, PublicKey, StarkKeypair};
pub use signatures::{sign, sign_with_nonce, verify, NonceSource, RandomNonce, Rfc6979, Signature};
