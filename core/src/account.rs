//! # Account
//!
//! An account turns "I want to call these entry points" into a signed,
//! fee-capped, submitted transaction.
//!
//! ```text
//! calls ──► estimate_fee ──► (caller adds headroom) ──► execute ──► receipt
//!               │                                          │
//!          query tx, max_fee 0                    nonce reconcile, sign, invoke
//! ```
//!
//! ## Nonces
//!
//! The chain's nonce is authoritative, but it lags: a transaction we just
//! submitted may not be reflected by the next `get_nonce`. So the account
//! also remembers the nonce after its last accepted submission and, before
//! every submission, uses whichever of the two is larger. If the gateway
//! still says `NonceMismatch`, the local memory is wrong and is dropped; the
//! error goes back to the caller, who decides whether to retry. We never
//! retry on our own, since blind resubmission is how transactions get
//! paid for twice.
//!
//! ## Fees
//!
//! No default margin. `estimate_fee` reports what the sequencer expects and
//! the caller picks the cap, typically with
//! [`FeeEstimate::max_fee_with_margin`]. Any cap at or above the real fee is
//! submitted as is.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::crypto::field::Felt;
use crate::crypto::keys::{PublicKey, StarkKeypair};
use crate::crypto::signatures::Rfc6979;
use crate::gateway::{BlockId, Gateway, GatewayError};
use crate::transaction::{
    sign_transaction, Call, FeeEstimate, InvokeTransaction, InvokeTransactionBuilder,
    TransactionError, TransactionReceipt,
};

/// An account contract on chain plus the key that controls it.
pub struct Account {
    gateway: Arc<dyn Gateway>,
    keypair: StarkKeypair,
    address: Felt,
    chain_id: Felt,
    /// Nonce to use after our last accepted submission, if any.
    next_nonce: Mutex<Option<Felt>>,
    /// Serializes submissions so two concurrent `execute`s never pick the
    /// same nonce.
    submit_lock: tokio::sync::Mutex<()>,
}

impl Account {
    /// Signs for whatever chain `gateway` serves.
    pub fn new(gateway: Arc<dyn Gateway>, address: Felt, keypair: StarkKeypair) -> Self {
        let chain_id = gateway.chain_id();
        Self::with_chain_id(gateway, address, keypair, chain_id)
    }

    /// Signs for an explicit chain id, e.g. one loaded from
    /// [`ClientConfig`](crate::config::ClientConfig).
    pub fn with_chain_id(
        gateway: Arc<dyn Gateway>,
        address: Felt,
        keypair: StarkKeypair,
        chain_id: Felt,
    ) -> Self {
        Self {
            gateway,
            keypair,
            address,
            chain_id,
            next_nonce: Mutex::new(None),
            submit_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn address(&self) -> Felt {
        self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        self.keypair.public_key()
    }

    pub fn chain_id(&self) -> Felt {
        self.chain_id
    }

    /// The nonce the next submission would use.
    pub async fn nonce(&self) -> Result<Felt, TransactionError> {
        let chain = self
            .gateway
            .get_nonce(self.address)
            .await
            .map_err(|e| TransactionError::SubmissionFailed(e.to_string()))?;
        let local = *self.next_nonce.lock();
        Ok(match local {
            Some(local) => chain.max(local),
            None => chain,
        })
    }

    fn build(&self, calls: &[Call], nonce: Felt, max_fee: Felt) -> InvokeTransactionBuilder {
        InvokeTransactionBuilder::new(self.address, self.chain_id)
            .calls(calls.iter().cloned())
            .nonce(nonce)
            .max_fee(max_fee)
    }

    fn sign(&self, tx: InvokeTransaction) -> Result<InvokeTransaction, TransactionError> {
        sign_transaction(tx, &self.keypair, &mut Rfc6979)
    }

    /// Asks the gateway what executing `calls` would cost.
    ///
    /// Simulates a query-version transaction with `max_fee = 0`; nothing is
    /// submitted and the local nonce is left alone.
    pub async fn estimate_fee(&self, calls: &[Call]) -> Result<FeeEstimate, TransactionError> {
        let nonce = self
            .nonce()
            .await
            .map_err(|e| TransactionError::SimulationFailed(e.to_string()))?;
        let tx = self.sign(self.build(calls, nonce, Felt::zero()).for_fee_query().build())?;

        let estimate = self
            .gateway
            .estimate_fee(&tx)
            .await
            .map_err(|e| TransactionError::SimulationFailed(e.to_string()))?;
        debug!(
            account = %self.address,
            calls = calls.len(),
            amount = estimate.amount,
            "fee estimated"
        );
        Ok(estimate)
    }

    /// Signs and submits `calls` with fee cap `max_fee`.
    ///
    /// Gateway rejections come back as [`TransactionError::FeeTooLow`],
    /// [`TransactionError::NonceMismatch`] or
    /// [`TransactionError::SubmissionFailed`]. None of them are retried here.
    pub async fn execute(
        &self,
        max_fee: Felt,
        calls: &[Call],
    ) -> Result<TransactionReceipt, TransactionError> {
        let _guard = self.submit_lock.lock().await;

        let nonce = self.nonce().await?;
        let tx = self.sign(self.build(calls, nonce, max_fee).build())?;

        match self.gateway.invoke(&tx).await {
            Ok(receipt) => {
                *self.next_nonce.lock() = Some(nonce + Felt::one());
                info!(
                    account = %self.address,
                    tx_hash = %receipt.transaction_hash,
                    nonce = %nonce,
                    "transaction submitted"
                );
                Ok(receipt)
            }
            Err(GatewayError::NonceMismatch { expected, got }) => {
                *self.next_nonce.lock() = None;
                warn!(
                    account = %self.address,
                    expected = %expected,
                    got = %got,
                    "nonce mismatch, local nonce cleared"
                );
                Err(TransactionError::NonceMismatch { expected, got })
            }
            Err(GatewayError::FeeTooLow { max_fee, required }) => {
                Err(TransactionError::FeeTooLow { max_fee, required })
            }
            Err(other) => {
                warn!(account = %self.address, error = %other, "submission failed");
                Err(TransactionError::SubmissionFailed(other.to_string()))
            }
        }
    }

    /// Read-only call against the latest state. No signing, no nonce.
    pub async fn call(&self, call: &Call) -> Result<Vec<Felt>, GatewayError> {
        self.call_at(call, BlockId::Latest).await
    }

    pub async fn call_at(&self, call: &Call, block: BlockId) -> Result<Vec<Felt>, GatewayError> {
        self.gateway.call(call, block).await
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("public_key", self.keypair.public_key())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::curve::StarkCurve;
    use crate::crypto::keys::PrivateKey;
    use crate::gateway::{ContractArtifact, ContractClass, FeeSchedule, InMemoryGateway};

    const COUNTER_CLASS: u64 = 0xc0c0;

    async fn setup() -> (Arc<InMemoryGateway>, Account, Felt) {
        let curve = StarkCurve::shared().unwrap();
        let chain = Felt::from_short_string("SN_GOERLI").unwrap();
        let gateway = Arc::new(
            InMemoryGateway::new(curve.clone(), chain).with_fee_schedule(FeeSchedule::flat(100)),
        );
        gateway.declare(ContractClass::counter(Felt::from(COUNTER_CLASS)));
        let counter = gateway
            .deploy(&ContractArtifact::new(Felt::from(COUNTER_CLASS)), &[], Felt::zero())
            .await
            .unwrap()
            .contract_address;

        let keypair = StarkKeypair::new(curve, PrivateKey::from_hex("0xa11ce").unwrap());
        let address = gateway.create_account(*keypair.public_key());
        let account = Account::new(gateway.clone(), address, keypair);
        (gateway, account, counter)
    }

    #[tokio::test]
    async fn estimate_then_execute_with_margin() {
        let (_gateway, account, counter) = setup().await;
        let calls = [Call::by_name(counter, "increment", vec![])];
        let estimate = account.estimate_fee(&calls).await.unwrap();
        assert_eq!(estimate.amount, 100);

        let max_fee = Felt::from(estimate.max_fee_with_margin(15));
        assert_eq!(max_fee, Felt::from(115u64));
        account.execute(max_fee, &calls).await.unwrap();

        let count = account.call(&Call::by_name(counter, "get_count", vec![])).await.unwrap();
        assert_eq!(count, vec![Felt::one()]);
    }

    #[tokio::test]
    async fn estimate_does_not_consume_nonce() {
        let (_gateway, account, counter) = setup().await;
        let calls = [Call::by_name(counter, "increment", vec![])];
        account.estimate_fee(&calls).await.unwrap();
        assert_eq!(account.nonce().await.unwrap(), Felt::zero());
    }

    #[tokio::test]
    async fn estimate_surfaces_simulation_failure() {
        let (_gateway, account, counter) = setup().await;
        let err = account
            .estimate_fee(&[Call::by_name(counter, "no_such_entry_point", vec![])])
            .await
            .unwrap_err();
        assert!(matches!(err, TransactionError::SimulationFailed(_)));
    }

    #[tokio::test]
    async fn consecutive_executes_advance_nonce() {
        let (gateway, account, counter) = setup().await;
        let calls = [Call::by_name(counter, "increment", vec![])];
        for _ in 0..3 {
            account.execute(Felt::from(100u64), &calls).await.unwrap();
        }
        assert_eq!(gateway.get_nonce(account.address()).await.unwrap(), Felt::from(3u64));
        assert_eq!(account.nonce().await.unwrap(), Felt::from(3u64));
    }

    #[tokio::test]
    async fn low_fee_is_rejected() {
        let (_gateway, account, counter) = setup().await;
        let calls = [Call::by_name(counter, "increment", vec![])];
        let err = account.execute(Felt::from(99u64), &calls).await.unwrap_err();
        assert_eq!(
            err,
            TransactionError::FeeTooLow {
                max_fee: Felt::from(99u64),
                required: Felt::from(100u64)
            }
        );
    }

    #[tokio::test]
    async fn stale_local_nonce_surfaces_mismatch_then_recovers() {
        let (gateway, account, counter) = setup().await;
        let calls = [Call::by_name(counter, "increment", vec![])];
        account.execute(Felt::from(100u64), &calls).await.unwrap();

        // The chain forgets our transaction; the local tracker still says 1.
        gateway.set_nonce(account.address(), Felt::zero());
        let public_before = *account.public_key();
        let err = account.execute(Felt::from(100u64), &calls).await.unwrap_err();
        assert_eq!(
            err,
            TransactionError::NonceMismatch {
                expected: Felt::zero(),
                got: Felt::one()
            }
        );
        assert_eq!(*account.public_key(), public_before);

        // Local tracker was dropped, so a plain retry uses the chain's nonce.
        account.execute(Felt::from(100u64), &calls).await.unwrap();
    }

    #[tokio::test]
    async fn transport_failure_is_submission_failure() {
        let (gateway, account, counter) = setup().await;
        gateway.fail_next_requests(1);
        let err = account
            .execute(Felt::from(100u64), &[Call::by_name(counter, "increment", vec![])])
            .await
            .unwrap_err();
        assert!(matches!(err, TransactionError::SubmissionFailed(_)));
    }

    #[tokio::test]
    async fn call_is_idempotent() {
        let (_gateway, account, counter) = setup().await;
        let get = Call::by_name(counter, "get_count", vec![]);
        let first = account.call(&get).await.unwrap();
        let second = account.call(&get).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(account.nonce().await.unwrap(), Felt::zero());
    }
}
