//! # Gateway
//!
//! The network boundary. Everything this crate knows about the sequencer
//! goes through the [`Gateway`] trait: submitting transactions, asking what
//! they cost, asking where they are, reading contract state.
//!
//! How bytes actually reach the sequencer (HTTP, JSON-RPC, a test double) is
//! somebody else's problem. What matters here is that every failure comes
//! back as one of a closed set of [`GatewayError`] variants, so callers can
//! match exhaustively instead of grepping error strings.
//!
//! [`InMemoryGateway`](memory::InMemoryGateway) is a complete in-process
//! implementation: it checks signatures, nonces and fees, executes calls
//! against real contract storage, and lets tests script status sequences and
//! inject transport failures.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::field::Felt;
use crate::transaction::{Call, FeeEstimate, InvokeTransaction, TransactionReceipt, TxStatus};

pub use memory::{ContractClass, EntryPointFn, FeeSchedule, InMemoryGateway};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything a gateway can say no with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("max fee {max_fee} is below the required {required}")]
    FeeTooLow { max_fee: Felt, required: Felt },

    #[error("invalid nonce: expected {expected}, got {got}")]
    NonceMismatch { expected: Felt, got: Felt },

    #[error("invalid transaction signature")]
    InvalidSignature,

    #[error("entry point {selector} not found on contract {contract}")]
    EntryPointNotFound { contract: Felt, selector: Felt },

    #[error("no contract deployed at {0}")]
    ContractNotFound(Felt),

    #[error("transaction {0} not found")]
    TransactionNotFound(Felt),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Transport failures say nothing about the transaction itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Transport(_))
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Which state a read-only call runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockId {
    #[default]
    Latest,
    Pending,
    Number(u64),
    Hash(Felt),
}

/// A compiled contract, as far as deployment cares.
///
/// Compiling and hashing contract classes is tooling's job; by the time an
/// artifact gets here its class hash is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractArtifact {
    pub class_hash: Felt,
    #[serde(default)]
    pub program: serde_json::Value,
}

impl ContractArtifact {
    pub fn new(class_hash: Felt) -> Self {
        Self {
            class_hash,
            program: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResponse {
    pub transaction_hash: Felt,
    pub contract_address: Felt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Deploy,
    Invoke,
}

/// What the gateway remembers about a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_hash: Felt,
    pub kind: TransactionKind,
    /// The deployed contract for deploys, the sending account for invokes.
    pub contract_address: Felt,
    pub status: TxStatus,
    pub max_fee: Felt,
    pub nonce: Option<Felt>,
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// The sequencer, as seen from a client.
///
/// Implementations must be shareable across tasks; accounts and pollers
/// hold them behind an `Arc`.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Chain this gateway serves. Transactions signed for another chain
    /// are rejected.
    fn chain_id(&self) -> Felt;

    async fn deploy(
        &self,
        artifact: &ContractArtifact,
        constructor_calldata: &[Felt],
        salt: Felt,
    ) -> Result<DeployResponse, GatewayError>;

    async fn get_transaction_status(&self, transaction_hash: Felt) -> Result<TxStatus, GatewayError>;

    async fn get_transaction(&self, transaction_hash: Felt) -> Result<TransactionRecord, GatewayError>;

    /// Read-only execution. Never changes state.
    async fn call(&self, call: &Call, block: BlockId) -> Result<Vec<Felt>, GatewayError>;

    /// Simulates a signed query transaction and reports its cost.
    async fn estimate_fee(&self, transaction: &InvokeTransaction) -> Result<FeeEstimate, GatewayError>;

    async fn invoke(&self, transaction: &InvokeTransaction) -> Result<TransactionReceipt, GatewayError>;

    /// The next nonce the chain will accept from `address`.
    async fn get_nonce(&self, address: Felt) -> Result<Felt, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_transport() {
        assert!(GatewayError::Transport("reset".into()).is_transport());
        assert!(!GatewayError::InvalidSignature.is_transport());
        assert!(!GatewayError::Rejected("nope".into()).is_transport());
    }

    #[test]
    fn block_id_defaults_to_latest() {
        assert_eq!(BlockId::default(), BlockId::Latest);
        assert_eq!(serde_json::to_string(&BlockId::Latest).unwrap(), "\"latest\"");
        assert_eq!(
            serde_json::to_string(&BlockId::Number(7)).unwrap(),
            r#"{"number":7}"#
        );
    }

    #[test]
    fn artifact_program_is_optional() {
        let artifact: ContractArtifact = serde_json::from_str(r#"{"class_hash":"0x1a"}"#).unwrap();
        assert_eq!(artifact, ContractArtifact::new(Felt::from(0x1au64)));
    }

    #[test]
    fn transaction_kind_wire_names() {
        assert_eq!(serde_json::to_string(&TransactionKind::Invoke).unwrap(), "\"INVOKE\"");
    }
}
