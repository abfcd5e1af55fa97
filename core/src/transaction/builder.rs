//! Transaction construction via the builder pattern.
//!
//! The [`InvokeTransactionBuilder`] assembles an unsigned
//! [`InvokeTransaction`]: who sends it, which chain it is for, what it calls,
//! its nonce and its fee cap. Signing happens in [`super::signing`], which
//! keeps construction testable without key material.
//!
//! ## Hash preimage
//!
//! ```text
//! pedersen_hash([ "invoke", version, sender_address, 0,
//!                 pedersen_hash(execute_calldata), max_fee, chain_id, nonce ])
//! ```
//!
//! The zero sits where older protocol versions put an entry point selector;
//! invoke transactions always target `__execute__` now, so it is fixed.
//!
//! ## `__execute__` calldata
//!
//! Several calls travel as one flat felt array:
//!
//! ```text
//! [ n, (to, selector, data_offset, data_len) × n, total_len, data… ]
//! ```

use serde::{Deserialize, Serialize};

use super::types::Call;
use crate::config::TRANSACTION_VERSION;
use crate::crypto::curve::StarkCurve;
use crate::crypto::field::Felt;
use crate::crypto::signatures::Signature;

/// `"invoke"` as a short string.
const INVOKE_PREFIX_FELT: u64 = 0x696e_766f_6b65;

/// Version tag of a fee-query transaction: `2^128 + TRANSACTION_VERSION`.
pub fn query_version() -> Felt {
    let two_pow_128 = Felt::from(u128::MAX) + Felt::one();
    two_pow_128 + Felt::from(TRANSACTION_VERSION)
}

// ---------------------------------------------------------------------------
// InvokeTransaction
// ---------------------------------------------------------------------------

/// An account transaction executing one or more calls.
///
/// Fields are read-only: values come out of [`InvokeTransactionBuilder`]
/// unsigned, and [`super::signing::sign_transaction`] consumes one and hands
/// back the signed copy. Changing anything after that means building a new
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeTransaction {
    sender_address: Felt,
    calls: Vec<Call>,
    nonce: Felt,
    max_fee: Felt,
    version: Felt,
    chain_id: Felt,
    signature: Option<Signature>,
}

impl InvokeTransaction {
    pub fn sender_address(&self) -> Felt {
        self.sender_address
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn nonce(&self) -> Felt {
        self.nonce
    }

    pub fn max_fee(&self) -> Felt {
        self.max_fee
    }

    pub fn version(&self) -> Felt {
        self.version
    }

    pub fn chain_id(&self) -> Felt {
        self.chain_id
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Only the signing step attaches signatures.
    pub(super) fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Flattens `calls` into the `__execute__` argument layout.
    pub fn execute_calldata(&self) -> Vec<Felt> {
        encode_execute_calldata(&self.calls)
    }

    /// The transaction hash: what gets signed, and what the gateway reports
    /// status against.
    pub fn hash(&self, curve: &StarkCurve) -> Felt {
        curve.pedersen_hash(&[
            Felt::from(INVOKE_PREFIX_FELT),
            self.version,
            self.sender_address,
            Felt::zero(),
            curve.pedersen_hash(&self.execute_calldata()),
            self.max_fee,
            self.chain_id,
            self.nonce,
        ])
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Query transactions exist only for fee simulation and can never be
    /// accepted as real ones.
    pub fn is_query(&self) -> bool {
        self.version == query_version()
    }

    /// Signature as the flat felt array account contracts receive.
    pub fn signature_felts(&self) -> Vec<Felt> {
        self.signature.map(|sig| sig.to_vec()).unwrap_or_default()
    }
}

/// See the module docs for the layout.
pub fn encode_execute_calldata(calls: &[Call]) -> Vec<Felt> {
    let total_len: usize = calls.iter().map(|c| c.calldata.len()).sum();
    let mut out = Vec::with_capacity(2 + 4 * calls.len() + total_len);

    out.push(Felt::from(calls.len()));
    let mut offset = 0usize;
    for call in calls {
        out.push(call.contract_address);
        out.push(call.entry_point_selector);
        out.push(Felt::from(offset));
        out.push(Felt::from(call.calldata.len()));
        offset += call.calldata.len();
    }
    out.push(Felt::from(total_len));
    for call in calls {
        out.extend_from_slice(&call.calldata);
    }
    out
}

// ---------------------------------------------------------------------------
// InvokeTransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for unsigned [`InvokeTransaction`]s.
///
/// # Usage
///
/// ```rust,no_run
/// use starkline_core::crypto::Felt;
/// use starkline_core::transaction::{Call, InvokeTransactionBuilder};
///
/// let account = Felt::from_hex("0x1234").unwrap();
/// let counter = Felt::from_hex("0x5678").unwrap();
/// let chain_id = Felt::from_short_string("SN_GOERLI").unwrap();
///
/// let tx = InvokeTransactionBuilder::new(account, chain_id)
///     .call(Call::by_name(counter, "increment", vec![]))
///     .nonce(Felt::from(3u64))
///     .max_fee(Felt::from(115u64))
///     .build();
/// ```
///
/// Defaults: no calls, nonce 0, max fee 0, version
/// [`TRANSACTION_VERSION`].
#[derive(Debug, Clone)]
pub struct InvokeTransactionBuilder {
    sender_address: Felt,
    chain_id: Felt,
    calls: Vec<Call>,
    nonce: Felt,
    max_fee: Felt,
    version: Felt,
}

impl InvokeTransactionBuilder {
    pub fn new(sender_address: Felt, chain_id: Felt) -> Self {
        Self {
            sender_address,
            chain_id,
            calls: Vec::new(),
            nonce: Felt::zero(),
            max_fee: Felt::zero(),
            version: Felt::from(TRANSACTION_VERSION),
        }
    }

    /// Appends one call. Order is preserved and is part of the hash.
    pub fn call(mut self, call: Call) -> Self {
        self.calls.push(call);
        self
    }

    pub fn calls(mut self, calls: impl IntoIterator<Item = Call>) -> Self {
        self.calls.extend(calls);
        self
    }

    pub fn nonce(mut self, nonce: Felt) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn max_fee(mut self, max_fee: Felt) -> Self {
        self.max_fee = max_fee;
        self
    }

    /// Marks the transaction as a fee query (see [`query_version`]).
    pub fn for_fee_query(mut self) -> Self {
        self.version = query_version();
        self
    }

    pub fn build(self) -> InvokeTransaction {
        InvokeTransaction {
            sender_address: self.sender_address,
            calls: self.calls,
            nonce: self.nonce,
            max_fee: self.max_fee,
            version: self.version,
            chain_id: self.chain_id,
            signature: None,
        }
    }
}
