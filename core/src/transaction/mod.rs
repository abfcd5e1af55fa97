//! # Transaction Module
//!
//! Construction and signing of account transactions, plus the status,
//! fee and error types that come back from the network.
//!
//! ## Architecture
//!
//! ```text
//! types.rs    Call, TxStatus, FeeEstimate, TransactionReceipt, TransactionError
//! builder.rs  InvokeTransaction, its hash and __execute__ encoding, the builder
//! signing.rs  Signing and verifying whole transactions
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build**: [`InvokeTransactionBuilder`] assembles calls, nonce, fee cap.
//! 2. **Hash**: [`InvokeTransaction::hash`] folds it into one felt with Pedersen.
//! 3. **Sign**: [`sign_transaction`] attaches `(r, s)`.
//! 4. **Submit**: a [`Gateway`](crate::gateway::Gateway) accepts it and hands back the hash.
//! 5. **Track**: the [`TxPoller`](crate::poller::TxPoller) follows its [`TxStatus`].
//!
//! ## Design Decisions
//!
//! - Amounts and fees are felts on the wire and `u128` in fee estimates. No
//!   floating point anywhere near money.
//! - Fee estimation signs a query-version transaction, so an estimate's
//!   signature can never be replayed as a real submission.

pub mod builder;
pub mod signing;
pub mod types;

pub use builder::{encode_execute_calldata, query_version, InvokeTransaction, InvokeTransactionBuilder};
pub use signing::{sign_transaction, verify_transaction};
pub use types::{Call, FeeEstimate, TransactionError, TransactionReceipt, TxStatus};
