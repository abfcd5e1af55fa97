//! # Hashing
//!
//! Two hash families matter on a STARK-based network:
//!
//! - **Pedersen**: the curve-based hash that transaction hashes and contract
//!   addresses are built from. It has to match the network bit for bit; one
//!   wrong constant and every signature this crate produces is garbage.
//! - **starknet_keccak**: keccak-256 truncated to 250 bits. Turns entry
//!   point names (`"increment"`, `"__execute__"`) into selectors.
//!
//! ## Pedersen, concretely
//!
//! ```text
//! pedersen_pair(a, b) = x( S + a_low·P1 + a_high·P2 + b_low·P3 + b_high·P4 )
//! ```
//!
//! where `low` is bits 0..248 and `high` bits 248..252 of the input. Longer
//! sequences are folded left starting from zero and closed off with the
//! length, so the empty sequence hashes to `pedersen_pair(0, 0)`, the shift
//! point's x-coordinate, and `[a, b]` can never collide with `[a, b, 0]`.

use sha3::{Digest, Keccak256};

use super::curve::StarkCurve;
use super::field::Felt;

/// Contract addresses live below `2^251 - 256`.
pub const L2_ADDRESS_UPPER_BOUND_HEX: &str =
    "0x7ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff00";

/// Prefix mixed into contract address derivation.
pub const CONTRACT_ADDRESS_PREFIX: &str = "STARKNET_CONTRACT_ADDRESS";

/// Entry points whose selector is defined as zero rather than a keccak.
const DEFAULT_ENTRY_POINT_NAMES: [&str; 2] = ["__default__", "__l1_default__"];

impl StarkCurve {
    /// Pedersen hash of exactly two field elements.
    pub fn pedersen_pair(&self, a: &Felt, b: &Felt) -> Felt {
        let [p1, p2, p3, p4] = self.constants().points();
        let (a_low, a_high) = split_low_high(a);
        let (b_low, b_high) = split_low_high(b);

        let point = self
            .constants()
            .shift_point()
            .add(&p1.mul(&a_low))
            .add(&p2.mul(&a_high))
            .add(&p3.mul(&b_low))
            .add(&p4.mul(&b_high));

        // The shift point keeps the sum away from infinity for any input
        // below P; fall back to zero rather than panic if a custom table
        // manages it anyway.
        point.x().unwrap_or_default()
    }

    /// Pedersen hash of an ordered sequence ("hash on elements").
    pub fn pedersen_hash(&self, elements: &[Felt]) -> Felt {
        let folded = elements
            .iter()
            .fold(Felt::zero(), |acc, e| self.pedersen_pair(&acc, e));
        self.pedersen_pair(&folded, &Felt::from(elements.len()))
    }

    /// Address of a contract deployed from `class_hash` with the given salt
    /// and constructor arguments.
    pub fn contract_address(
        &self,
        salt: &Felt,
        class_hash: &Felt,
        constructor_calldata: &[Felt],
        deployer_address: &Felt,
    ) -> Felt {
        // Constant ASCII under 31 bytes.
        let prefix = Felt::from_short_string(CONTRACT_ADDRESS_PREFIX).unwrap_or_default();
        let raw = self.pedersen_hash(&[
            prefix,
            *deployer_address,
            *salt,
            *class_hash,
            self.pedersen_hash(constructor_calldata),
        ]);
        let bound = Felt::from_hex(L2_ADDRESS_UPPER_BOUND_HEX).unwrap_or_default();
        // P < 2·bound, so one conditional subtraction reduces.
        if raw >= bound {
            raw - bound
        } else {
            raw
        }
    }
}

/// Splits a felt into its low 248 bits and the (at most 4) bits above.
fn split_low_high(value: &Felt) -> (Felt, Felt) {
    let mut bytes = value.to_bytes_be();
    let high = Felt::from(bytes[0] as u64);
    bytes[0] = 0;
    (Felt::from_bytes_be_mod_order(&bytes), high)
}

/// keccak-256 with the top six bits cleared, so the result is always a
/// valid felt.
pub fn starknet_keccak(data: &[u8]) -> Felt {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    bytes[0] &= 0x03;
    Felt::from_bytes_be_mod_order(&bytes)
}

/// Entry point selector for a function name.
pub fn selector_from_name(name: &str) -> Felt {
    if DEFAULT_ENTRY_POINT_NAMES.contains(&name) {
        Felt::zero()
    } else {
        starknet_keccak(name.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::constants::CurveConstants;
    use std::sync::Arc;

    fn curve() -> StarkCurve {
        StarkCurve::new(Arc::new(CurveConstants::embedded().unwrap()))
    }

    fn felt(s: &str) -> Felt {
        Felt::from_hex(s).unwrap()
    }

    #[test]
    fn pedersen_pair_reference_vector() {
        let h = curve().pedersen_pair(
            &felt("0x3d937c035c878245caf64531a5756109c53068da139362728feb561405371cb"),
            &felt("0x208a0a10250e382e1e4bbe2880906c2791bf6275695e02fbbc6aeff9cd8b31a"),
        );
        assert_eq!(
            h,
            felt("0x30e480bed5fe53fa909cc0f8c4d99b8f9f2c016be4c41e13a4848797979c662")
        );
    }

    #[test]
    fn empty_sequence_hashes_to_shift_point_x() {
        let c = curve();
        let shift_x = c.constants().shift_point().x().unwrap();
        assert_eq!(c.pedersen_hash(&[]), shift_x);
        assert_eq!(c.pedersen_pair(&Felt::zero(), &Felt::zero()), shift_x);
    }

    #[test]
    fn hash_on_elements_reference_vectors() {
        let c = curve();
        assert_eq!(
            c.pedersen_hash(&[Felt::from(1u64)]),
            felt("0x78d74f61aeaa8286418fd34b3a12a610445eba11d00ecc82ecac2542d55f7a4")
        );
        assert_eq!(
            c.pedersen_hash(&[Felt::from(1u64), Felt::from(2u64), Felt::from(3u64)]),
            felt("0xf9d95fbf356fbeda26538c92f7040abe51bf142350f73c9ee5ba7c660bae71")
        );
    }

    #[test]
    fn distinct_single_inputs_do_not_collide() {
        let c = curve();
        assert_ne!(
            c.pedersen_hash(&[Felt::from(1u64)]),
            c.pedersen_hash(&[Felt::from(2u64)])
        );
    }

    #[test]
    fn hashing_is_order_sensitive() {
        let c = curve();
        let a = Felt::from(7u64);
        let b = Felt::from(9u64);
        assert_ne!(c.pedersen_pair(&a, &b), c.pedersen_pair(&b, &a));
        assert_ne!(c.pedersen_hash(&[a, b]), c.pedersen_hash(&[b, a]));
    }

    #[test]
    fn length_suffix_separates_trailing_zeros() {
        let c = curve();
        let a = Felt::from(5u64);
        assert_ne!(c.pedersen_hash(&[a]), c.pedersen_hash(&[a, Felt::zero()]));
    }

    #[test]
    fn high_bits_are_hashed() {
        // Inputs that differ only above bit 248 must still differ.
        let c = curve();
        let low = Felt::from(1u64);
        let high = low + Felt::from(2u64).pow_u64(250);
        assert_ne!(c.pedersen_pair(&low, &Felt::zero()), c.pedersen_pair(&high, &Felt::zero()));
    }

    #[test]
    fn injected_constants_change_the_hash() {
        // With P1 = G and every other input zero, pedersen_pair(a, 0) is the
        // x-coordinate of S + a·G.
        let embedded = CurveConstants::embedded().unwrap();
        let g = *embedded.generator();
        let [_, p2, p3, p4] = *embedded.points();
        let custom = CurveConstants::new(g, *embedded.shift_point(), [g, p2, p3, p4]).unwrap();
        let c = StarkCurve::new(Arc::new(custom));

        let a = Felt::from(12_345u64);
        let expected = embedded.shift_point().add(&g.mul(&a)).x().unwrap();
        assert_eq!(c.pedersen_pair(&a, &Felt::zero()), expected);
        assert_ne!(c.pedersen_pair(&a, &Felt::zero()), curve().pedersen_pair(&a, &Felt::zero()));
    }

    #[test]
    fn selector_reference_vectors() {
        assert_eq!(
            selector_from_name("transfer"),
            felt("0x83afd3f4caedc6eebf44246fe54e38c95e3179a5ec9ea81740eca5b482d12e")
        );
        assert_eq!(
            selector_from_name("__execute__"),
            felt("0x15d40a3d6ca2ac30f4031e42be28da9b056fef9bb7357ac5e85627ee876e5ad")
        );
        assert_eq!(
            selector_from_name("increment"),
            felt("0x7a44dde9fea32737a5cf3f9683b3235138654aa2d189f6fe44af37a61dc60d")
        );
        assert_eq!(selector_from_name("__default__"), Felt::zero());
    }

    #[test]
    fn starknet_keccak_fits_in_250_bits() {
        for name in ["a", "get_count", "some_much_longer_entry_point_name"] {
            assert!(starknet_keccak(name.as_bytes()).is_below_pow2(250));
        }
    }

    #[test]
    fn contract_address_is_below_the_bound() {
        let c = curve();
        let addr = c.contract_address(
            &Felt::from(42u64),
            &felt("0x1234"),
            &[Felt::from(1u64), Felt::from(2u64)],
            &Felt::zero(),
        );
        assert!(addr < felt(L2_ADDRESS_UPPER_BOUND_HEX));
        // Salt changes the address.
        let other = c.contract_address(
            &Felt::from(43u64),
            &felt("0x1234"),
            &[Felt::from(1u64), Felt::from(2u64)],
            &Felt::zero(),
        );
        assert_ne!(addr, other);
    }
}
