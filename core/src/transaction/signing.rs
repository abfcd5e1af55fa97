//! Transaction signing and signature checks.
//!
//! Signing is a separate step from building because the key may not be
//! around at construction time, and because fee estimation signs a
//! different (query-version) transaction than the one finally submitted.

use super::builder::InvokeTransaction;
use super::types::TransactionError;
use crate::crypto::curve::StarkCurve;
use crate::crypto::keys::{PublicKey, StarkKeypair};
use crate::crypto::signatures::{self, NonceSource};

/// Signs `tx` with `keypair`, consuming the unsigned transaction.
///
/// A transaction that already carries a signature is refused with
/// [`TransactionError::AlreadySigned`]; build a fresh one instead. The hash
/// never covers the signature, so signing an identical unsigned transaction
/// with the same deterministic nonce source reproduces the same signature.
///
/// # Example
///
/// ```rust,no_run
/// use starkline_core::crypto::{Felt, Rfc6979, StarkKeypair};
/// use starkline_core::transaction::{sign_transaction, InvokeTransactionBuilder};
///
/// let keypair = StarkKeypair::generate().unwrap();
/// let chain_id = Felt::from_short_string("SN_GOERLI").unwrap();
/// let tx = InvokeTransactionBuilder::new(Felt::from(1u64), chain_id).build();
///
/// let signed = sign_transaction(tx, &keypair, &mut Rfc6979).unwrap();
/// assert!(signed.is_signed());
/// ```
pub fn sign_transaction<N: NonceSource + ?Sized>(
    tx: InvokeTransaction,
    keypair: &StarkKeypair,
    nonces: &mut N,
) -> Result<InvokeTransaction, TransactionError> {
    if tx.is_signed() {
        return Err(TransactionError::AlreadySigned);
    }
    let hash = tx.hash(keypair.curve());
    let signature = keypair.sign_with(&hash, nonces)?;
    Ok(tx.with_signature(signature))
}

/// `true` if `tx` carries a valid signature by `public_key`.
///
/// Unsigned transactions simply fail.
pub fn verify_transaction(curve: &StarkCurve, tx: &InvokeTransaction, public_key: &PublicKey) -> bool {
    match tx.signature() {
        Some(signature) => signatures::verify(curve, public_key, &tx.hash(curve), signature),
        None => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
