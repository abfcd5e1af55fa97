//! In-process gateway.
//!
//! A small but honest sequencer: it keeps contract storage, account public
//! keys and nonces in memory, and applies the same checks a real one does
//! before accepting a transaction:
//!
//! 1. chain id matches, and the transaction is not a fee query
//! 2. the sender is a known account and the signature verifies
//! 3. the nonce is exactly the account's next nonce
//! 4. `max_fee` covers the fee the schedule charges
//! 5. every call hits a deployed contract and an existing entry point
//!
//! Calls execute atomically against scratch copies of storage; a failing
//! entry point leaves state untouched.
//!
//! Status reporting is scripted. Each accepted transaction gets a queue of
//! statuses (by default `RECEIVED` then `ACCEPTED_ON_L2`), one per status
//! query, and the last one sticks. Tests can script any hash, including
//! ones never submitted, and can make the next `n` requests fail with a
//! transport error.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{
    BlockId, ContractArtifact, DeployResponse, Gateway, GatewayError, TransactionKind,
    TransactionRecord,
};
use crate::crypto::curve::StarkCurve;
use crate::crypto::field::Felt;
use crate::crypto::hash::selector_from_name;
use crate::crypto::keys::PublicKey;
use crate::transaction::{
    verify_transaction, Call, FeeEstimate, InvokeTransaction, TransactionReceipt, TxStatus,
};

/// Class hash the gateway uses for accounts it creates itself.
pub const ACCOUNT_CLASS_HASH: u64 = 0xacc0_0000;

/// `"deploy"` as a short string.
const DEPLOY_PREFIX_FELT: u64 = 0x6465_706c_6f79;

/// Contract storage: felt keys to felt values, zero when unset.
pub type ContractStorage = HashMap<Felt, Felt>;

/// An entry point implementation. Gets the contract's storage and the raw
/// calldata, returns the raw result or a revert reason.
pub type EntryPointFn =
    Arc<dyn Fn(&mut ContractStorage, &[Felt]) -> Result<Vec<Felt>, String> + Send + Sync>;

// ---------------------------------------------------------------------------
// Contract classes
// ---------------------------------------------------------------------------

/// Executable stand-in for a declared contract class.
#[derive(Clone)]
pub struct ContractClass {
    class_hash: Felt,
    constructor: Option<EntryPointFn>,
    entry_points: HashMap<Felt, EntryPointFn>,
}

impl ContractClass {
    pub fn new(class_hash: Felt) -> Self {
        Self {
            class_hash,
            constructor: None,
            entry_points: HashMap::new(),
        }
    }

    pub fn class_hash(&self) -> Felt {
        self.class_hash
    }

    pub fn with_constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ContractStorage, &[Felt]) -> Result<Vec<Felt>, String> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(f));
        self
    }

    pub fn with_entry_point<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&mut ContractStorage, &[Felt]) -> Result<Vec<Felt>, String> + Send + Sync + 'static,
    {
        self.entry_points.insert(selector_from_name(name), Arc::new(f));
        self
    }

    /// The classic counter: `constructor(initial?)`, `increment(by?)`,
    /// `get_count() -> [count]`.
    pub fn counter(class_hash: Felt) -> Self {
        let slot = selector_from_name("count");
        Self::new(class_hash)
            .with_constructor(move |storage, calldata| {
                let initial = calldata.first().copied().unwrap_or_default();
                storage.insert(slot, initial);
                Ok(vec![])
            })
            .with_entry_point("increment", move |storage, calldata| {
                let by = calldata.first().copied().unwrap_or_else(Felt::one);
                let entry = storage.entry(slot).or_default();
                *entry += by;
                Ok(vec![])
            })
            .with_entry_point("get_count", move |storage, _| {
                Ok(vec![storage.get(&slot).copied().unwrap_or_default()])
            })
    }

    fn entry_point(&self, selector: &Felt) -> Option<&EntryPointFn> {
        self.entry_points.get(selector)
    }
}

impl fmt::Debug for ContractClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractClass")
            .field("class_hash", &self.class_hash)
            .field("entry_points", &self.entry_points.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

/// How the gateway prices a transaction: a flat base plus a per-call cost,
/// in gas, times the gas price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    pub gas_price: u128,
    pub base_gas: u128,
    pub gas_per_call: u128,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            gas_price: 1_000_000_000,
            base_gas: 1_000,
            gas_per_call: 500,
        }
    }
}

impl FeeSchedule {
    /// A schedule charging exactly `amount` for any transaction.
    pub fn flat(amount: u128) -> Self {
        Self {
            gas_price: 1,
            base_gas: amount,
            gas_per_call: 0,
        }
    }

    pub fn estimate(&self, call_count: usize) -> FeeEstimate {
        let gas = self
            .base_gas
            .saturating_add(self.gas_per_call.saturating_mul(call_count as u128));
        FeeEstimate::new(gas, self.gas_price, "wei")
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

struct DeployedContract {
    class_hash: Felt,
    storage: ContractStorage,
}

struct AccountEntry {
    public_key: PublicKey,
    nonce: Felt,
}

struct TrackedTransaction {
    record: TransactionRecord,
}

#[derive(Default)]
struct State {
    classes: HashMap<Felt, ContractClass>,
    contracts: HashMap<Felt, DeployedContract>,
    accounts: HashMap<Felt, AccountEntry>,
    transactions: HashMap<Felt, TrackedTransaction>,
    status_scripts: HashMap<Felt, VecDeque<TxStatus>>,
    last_status: HashMap<Felt, TxStatus>,
    status_queries: HashMap<Felt, u32>,
    pending_transport_failures: u32,
}

/// The in-process gateway. Cheap to share behind an `Arc`; all state sits
/// behind one lock.
pub struct InMemoryGateway {
    curve: StarkCurve,
    chain_id: Felt,
    fees: FeeSchedule,
    default_script: Vec<TxStatus>,
    state: Mutex<State>,
}

impl InMemoryGateway {
    pub fn new(curve: StarkCurve, chain_id: Felt) -> Self {
        Self {
            curve,
            chain_id,
            fees: FeeSchedule::default(),
            default_script: vec![TxStatus::Received, TxStatus::AcceptedOnL2],
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_fee_schedule(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    /// Statuses every newly accepted transaction reports, in order.
    /// An empty script reports `RECEIVED` forever.
    pub fn with_default_script(mut self, script: Vec<TxStatus>) -> Self {
        self.default_script = script;
        self
    }

    pub fn curve(&self) -> &StarkCurve {
        &self.curve
    }

    pub fn fee_schedule(&self) -> &FeeSchedule {
        &self.fees
    }

    // -- setup --------------------------------------------------------------

    pub fn declare(&self, class: ContractClass) {
        self.state.lock().classes.insert(class.class_hash, class);
    }

    /// Registers an account contract at `address` controlled by `public_key`.
    pub fn register_account(&self, address: Felt, public_key: PublicKey) {
        let mut state = self.state.lock();
        state.accounts.insert(
            address,
            AccountEntry {
                public_key,
                nonce: Felt::zero(),
            },
        );
        info!(address = %address, "account registered");
    }

    /// Creates an account for `public_key` at its counterfactual address and
    /// returns that address.
    pub fn create_account(&self, public_key: PublicKey) -> Felt {
        let x = public_key.x();
        let address =
            self.curve
                .contract_address(&x, &Felt::from(ACCOUNT_CLASS_HASH), &[x], &Felt::zero());
        self.register_account(address, public_key);
        address
    }

    /// Overrides an account's nonce, e.g. to simulate another client or a
    /// dropped transaction.
    pub fn set_nonce(&self, address: Felt, nonce: Felt) {
        if let Some(account) = self.state.lock().accounts.get_mut(&address) {
            account.nonce = nonce;
        }
    }

    /// Replaces whatever `transaction_hash` would report next.
    pub fn script_status(&self, transaction_hash: Felt, statuses: Vec<TxStatus>) {
        let mut state = self.state.lock();
        state.status_scripts.insert(transaction_hash, statuses.into());
    }

    /// Makes the next `count` requests of any kind fail with
    /// [`GatewayError::Transport`].
    pub fn fail_next_requests(&self, count: u32) {
        self.state.lock().pending_transport_failures = count;
    }

    /// Status queries answered (or failed) for `transaction_hash` so far.
    pub fn status_queries(&self, transaction_hash: Felt) -> u32 {
        self.state
            .lock()
            .status_queries
            .get(&transaction_hash)
            .copied()
            .unwrap_or(0)
    }

    pub fn storage_at(&self, contract: Felt, key: Felt) -> Option<Felt> {
        let state = self.state.lock();
        let deployed = state.contracts.get(&contract)?;
        Some(deployed.storage.get(&key).copied().unwrap_or_default())
    }

    // -- internals ----------------------------------------------------------

    fn take_transport_failure(state: &mut State) -> Result<(), GatewayError> {
        if state.pending_transport_failures > 0 {
            state.pending_transport_failures -= 1;
            warn!("injected transport failure");
            return Err(GatewayError::Transport("connection reset (injected)".into()));
        }
        Ok(())
    }

    /// Checks everything about an invoke except nonce and fee.
    fn validate_invoke(&self, state: &State, tx: &InvokeTransaction) -> Result<(), GatewayError> {
        if tx.chain_id() != self.chain_id {
            return Err(GatewayError::Rejected(format!(
                "transaction signed for chain {}, gateway serves {}",
                tx.chain_id(), self.chain_id
            )));
        }
        let account = state
            .accounts
            .get(&tx.sender_address())
            .ok_or(GatewayError::ContractNotFound(tx.sender_address()))?;
        if !verify_transaction(&self.curve, tx, &account.public_key) {
            return Err(GatewayError::InvalidSignature);
        }
        Ok(())
    }

    fn check_nonce(state: &State, tx: &InvokeTransaction) -> Result<(), GatewayError> {
        let expected = state
            .accounts
            .get(&tx.sender_address())
            .map(|a| a.nonce)
            .unwrap_or_default();
        if tx.nonce() != expected {
            return Err(GatewayError::NonceMismatch {
                expected,
                got: tx.nonce(),
            });
        }
        Ok(())
    }

    /// Runs `calls` against scratch copies of the touched storage.
    fn execute(
        state: &State,
        calls: &[Call],
    ) -> Result<(HashMap<Felt, ContractStorage>, Vec<Vec<Felt>>), GatewayError> {
        let mut scratch: HashMap<Felt, ContractStorage> = HashMap::new();
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let deployed = state
                .contracts
                .get(&call.contract_address)
                .ok_or(GatewayError::ContractNotFound(call.contract_address))?;
            let class = state
                .classes
                .get(&deployed.class_hash)
                .ok_or(GatewayError::ContractNotFound(call.contract_address))?;
            let entry_point = class.entry_point(&call.entry_point_selector).ok_or(
                GatewayError::EntryPointNotFound {
                    contract: call.contract_address,
                    selector: call.entry_point_selector,
                },
            )?;
            let storage = scratch
                .entry(call.contract_address)
                .or_insert_with(|| deployed.storage.clone());
            let output = entry_point(storage, &call.calldata).map_err(GatewayError::Rejected)?;
            results.push(output);
        }
        Ok((scratch, results))
    }

    fn record(&self, state: &mut State, record: TransactionRecord) {
        let hash = record.transaction_hash;
        state
            .status_scripts
            .entry(hash)
            .or_insert_with(|| self.default_script.iter().copied().collect());
        state.transactions.insert(hash, TrackedTransaction { record });
    }
}

#[async_trait]
impl Gateway for InMemoryGateway {
    fn chain_id(&self) -> Felt {
        self.chain_id
    }

    async fn deploy(
        &self,
        artifact: &ContractArtifact,
        constructor_calldata: &[Felt],
        salt: Felt,
    ) -> Result<DeployResponse, GatewayError> {
        let mut state = self.state.lock();
        Self::take_transport_failure(&mut state)?;

        let class = state
            .classes
            .get(&artifact.class_hash)
            .cloned()
            .ok_or_else(|| {
                GatewayError::Rejected(format!("class {} is not declared", artifact.class_hash))
            })?;
        let address = self.curve.contract_address(
            &salt,
            &artifact.class_hash,
            constructor_calldata,
            &Felt::zero(),
        );
        if state.contracts.contains_key(&address) {
            return Err(GatewayError::Rejected(format!(
                "contract already deployed at {}",
                address
            )));
        }

        let mut storage = ContractStorage::new();
        if let Some(constructor) = &class.constructor {
            constructor(&mut storage, constructor_calldata).map_err(GatewayError::Rejected)?;
        }
        state.contracts.insert(
            address,
            DeployedContract {
                class_hash: artifact.class_hash,
                storage,
            },
        );

        let transaction_hash = self.curve.pedersen_hash(&[
            Felt::from(DEPLOY_PREFIX_FELT),
            address,
            self.curve.pedersen_hash(constructor_calldata),
            self.chain_id,
        ]);
        self.record(
            &mut state,
            TransactionRecord {
                transaction_hash,
                kind: TransactionKind::Deploy,
                contract_address: address,
                status: TxStatus::NotReceived,
                max_fee: Felt::zero(),
                nonce: None,
            },
        );
        info!(address = %address, tx_hash = %transaction_hash, "contract deployed");

        Ok(DeployResponse {
            transaction_hash,
            contract_address: address,
        })
    }

    async fn get_transaction_status(&self, transaction_hash: Felt) -> Result<TxStatus, GatewayError> {
        let mut state = self.state.lock();
        *state.status_queries.entry(transaction_hash).or_default() += 1;
        Self::take_transport_failure(&mut state)?;

        let next = state
            .status_scripts
            .get_mut(&transaction_hash)
            .and_then(|script| script.pop_front());
        let status = match next {
            Some(status) => status,
            None => match state.last_status.get(&transaction_hash) {
                Some(status) => *status,
                None if state.transactions.contains_key(&transaction_hash) => TxStatus::Received,
                None => TxStatus::NotReceived,
            },
        };
        state.last_status.insert(transaction_hash, status);
        if let Some(tracked) = state.transactions.get_mut(&transaction_hash) {
            tracked.record.status = status;
        }
        debug!(tx_hash = %transaction_hash, status = %status, "status query");
        Ok(status)
    }

    async fn get_transaction(&self, transaction_hash: Felt) -> Result<TransactionRecord, GatewayError> {
        let mut state = self.state.lock();
        Self::take_transport_failure(&mut state)?;
        state
            .transactions
            .get(&transaction_hash)
            .map(|t| t.record.clone())
            .ok_or(GatewayError::TransactionNotFound(transaction_hash))
    }

    async fn call(&self, call: &Call, block: BlockId) -> Result<Vec<Felt>, GatewayError> {
        let mut state = self.state.lock();
        Self::take_transport_failure(&mut state)?;
        // Only the latest state is kept; every block id reads it.
        debug!(contract = %call.contract_address, ?block, "read-only call");
        let (_, mut results) = Self::execute(&state, std::slice::from_ref(call))?;
        Ok(results.pop().unwrap_or_default())
    }

    async fn estimate_fee(&self, tx: &InvokeTransaction) -> Result<FeeEstimate, GatewayError> {
        let mut state = self.state.lock();
        Self::take_transport_failure(&mut state)?;
        self.validate_invoke(&state, tx)?;
        Self::check_nonce(&state, tx)?;
        Self::execute(&state, tx.calls())?;
        let estimate = self.fees.estimate(tx.calls().len());
        debug!(amount = estimate.amount, calls = tx.calls().len(), "fee estimated");
        Ok(estimate)
    }

    async fn invoke(&self, tx: &InvokeTransaction) -> Result<TransactionReceipt, GatewayError> {
        let mut state = self.state.lock();
        Self::take_transport_failure(&mut state)?;
        if tx.is_query() {
            return Err(GatewayError::Rejected(
                "query transactions cannot be executed".into(),
            ));
        }
        self.validate_invoke(&state, tx)?;
        Self::check_nonce(&state, tx)?;

        let required = Felt::from(self.fees.estimate(tx.calls().len()).amount);
        if tx.max_fee() < required {
            return Err(GatewayError::FeeTooLow {
                max_fee: tx.max_fee(),
                required,
            });
        }

        let (scratch, _) = Self::execute(&state, tx.calls())?;
        for (address, storage) in scratch {
            if let Some(deployed) = state.contracts.get_mut(&address) {
                deployed.storage = storage;
            }
        }
        if let Some(account) = state.accounts.get_mut(&tx.sender_address()) {
            account.nonce += Felt::one();
        }

        let transaction_hash = tx.hash(&self.curve);
        self.record(
            &mut state,
            TransactionRecord {
                transaction_hash,
                kind: TransactionKind::Invoke,
                contract_address: tx.sender_address(),
                status: TxStatus::NotReceived,
                max_fee: tx.max_fee(),
                nonce: Some(tx.nonce()),
            },
        );
        info!(tx_hash = %transaction_hash, sender = %tx.sender_address(), nonce = %tx.nonce(), "invoke accepted");

        Ok(TransactionReceipt { transaction_hash })
    }

    async fn get_nonce(&self, address: Felt) -> Result<Felt, GatewayError> {
        let mut state = self.state.lock();
        Self::take_transport_failure(&mut state)?;
        state
            .accounts
            .get(&address)
            .map(|a| a.nonce)
            .ok_or(GatewayError::ContractNotFound(address))
    }
}
