//! Core type definitions for account transactions.
//!
//! These are the nouns every other module speaks: the calls an account
//! wants to make, the lifecycle a transaction moves through once submitted,
//! what the sequencer thinks it will cost, and the errors that can come back.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::field::Felt;
use crate::crypto::hash::selector_from_name;
use crate::crypto::keys::KeyError;

// ---------------------------------------------------------------------------
// Call
// ---------------------------------------------------------------------------

/// One contract invocation: target, entry point, raw felt arguments.
///
/// Built by the caller, consumed by an account, never mutated in between.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Call {
    pub contract_address: Felt,
    pub entry_point_selector: Felt,
    pub calldata: Vec<Felt>,
}

impl Call {
    pub fn new(contract_address: Felt, entry_point_selector: Felt, calldata: Vec<Felt>) -> Self {
        Self {
            contract_address,
            entry_point_selector,
            calldata,
        }
    }

    /// Addresses the entry point by name, e.g. `"increment"`.
    pub fn by_name(contract_address: Felt, entry_point: &str, calldata: Vec<Felt>) -> Self {
        Self::new(contract_address, selector_from_name(entry_point), calldata)
    }
}

// ---------------------------------------------------------------------------
// TxStatus
// ---------------------------------------------------------------------------

/// Where a submitted transaction is in its life.
///
/// ```text
/// NOT_RECEIVED → PENDING → RECEIVED → ACCEPTED_ON_L2 → ACCEPTED_ON_L1
///                    \________\______________\
///                                             → REJECTED
/// ```
///
/// `ACCEPTED_ON_L1` and `REJECTED` are terminal. Ordering questions go
/// through [`TxStatus::has_reached`], never through string comparison:
/// a chain that jumps straight to L1 has also, for our purposes, reached L2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    #[serde(rename = "NOT_RECEIVED")]
    NotReceived,
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RECEIVED")]
    Received,
    #[serde(rename = "ACCEPTED_ON_L2")]
    AcceptedOnL2,
    #[serde(rename = "ACCEPTED_ON_L1")]
    AcceptedOnL1,
    #[serde(rename = "REJECTED")]
    Rejected,
}

impl TxStatus {
    /// Position on the success path. `REJECTED` is off the path entirely.
    pub fn lifecycle_rank(&self) -> Option<u8> {
        match self {
            Self::NotReceived => Some(0),
            Self::Pending => Some(1),
            Self::Received => Some(2),
            Self::AcceptedOnL2 => Some(3),
            Self::AcceptedOnL1 => Some(4),
            Self::Rejected => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AcceptedOnL1 | Self::Rejected)
    }

    /// `true` if this status is at or past `target` on the lifecycle.
    pub fn has_reached(&self, target: TxStatus) -> bool {
        match (self.lifecycle_rank(), target.lifecycle_rank()) {
            (Some(current), Some(wanted)) => current >= wanted,
            (None, None) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotReceived => "NOT_RECEIVED",
            Self::Pending => "PENDING",
            Self::Received => "RECEIVED",
            Self::AcceptedOnL2 => "ACCEPTED_ON_L2",
            Self::AcceptedOnL1 => "ACCEPTED_ON_L1",
            Self::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_RECEIVED" => Ok(Self::NotReceived),
            "PENDING" => Ok(Self::Pending),
            "RECEIVED" => Ok(Self::Received),
            "ACCEPTED_ON_L2" => Ok(Self::AcceptedOnL2),
            "ACCEPTED_ON_L1" => Ok(Self::AcceptedOnL1),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// FeeEstimate
// ---------------------------------------------------------------------------

/// What the sequencer expects a transaction to cost.
///
/// `amount` is the overall fee (`gas_usage × gas_price`) in the smallest
/// unit of `unit`. Ephemeral: estimates go stale as gas prices move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub amount: u128,
    pub gas_price: u128,
    pub gas_usage: u128,
    pub unit: String,
}

impl FeeEstimate {
    pub fn new(gas_usage: u128, gas_price: u128, unit: impl Into<String>) -> Self {
        Self {
            amount: gas_usage.saturating_mul(gas_price),
            gas_price,
            gas_usage,
            unit: unit.into(),
        }
    }

    /// `amount` plus `percent` percent headroom, rounded up so the margin
    /// never comes out smaller than asked for.
    ///
    /// There is deliberately no default; a 15% margin on 100 gives 115.
    pub fn max_fee_with_margin(&self, percent: u32) -> u128 {
        let scaled = self.amount.saturating_mul(100 + percent as u128);
        scaled / 100 + u128::from(scaled % 100 != 0)
    }

    pub fn amount_felt(&self) -> Felt {
        Felt::from(self.amount)
    }
}

// ---------------------------------------------------------------------------
// TransactionReceipt
// ---------------------------------------------------------------------------

/// Returned by a successful submission. Finality is the poller's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: Felt,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why an account operation failed.
///
/// `NonceMismatch` is the one worth retrying, after the nonce has been
/// refetched. Nothing here is retried automatically: blindly resubmitting
/// a transaction is how you pay for it twice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("max fee {max_fee} is below the required {required}")]
    FeeTooLow { max_fee: Felt, required: Felt },

    #[error("nonce mismatch: chain expects {expected}, transaction used {got}")]
    NonceMismatch { expected: Felt, got: Felt },

    #[error("submission failed: {0}")]
    SubmissionFailed(String),

    #[error("fee simulation failed: {0}")]
    SimulationFailed(String),

    #[error("signing failed: {0}")]
    Signing(#[from] KeyError),

    #[error("transaction is already signed")]
    AlreadySigned,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TxStatus; 6] = [
        TxStatus::NotReceived,
        TxStatus::Pending,
        TxStatus::Received,
        TxStatus::AcceptedOnL2,
        TxStatus::AcceptedOnL1,
        TxStatus::Rejected,
    ];

    #[test]
    fn l1_acceptance_satisfies_l2_target() {
        assert!(TxStatus::AcceptedOnL1.has_reached(TxStatus::AcceptedOnL2));
        assert!(TxStatus::AcceptedOnL2.has_reached(TxStatus::AcceptedOnL2));
        assert!(!TxStatus::Received.has_reached(TxStatus::AcceptedOnL2));
        assert!(!TxStatus::Pending.has_reached(TxStatus::Received));
    }

    #[test]
    fn rejected_is_off_the_success_path() {
        for status in ALL {
            if status != TxStatus::Rejected {
                assert!(!TxStatus::Rejected.has_reached(status));
                assert!(!status.has_reached(TxStatus::Rejected));
            }
        }
        assert!(TxStatus::Rejected.has_reached(TxStatus::Rejected));
    }

    #[test]
    fn only_l1_and_rejected_are_terminal() {
        let terminal: Vec<_> = ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![&TxStatus::AcceptedOnL1, &TxStatus::Rejected]);
    }

    #[test]
    fn status_wire_names() {
        for status in ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
            assert_eq!(status.as_str().parse::<TxStatus>().unwrap(), status);
        }
        assert!("accepted".parse::<TxStatus>().is_err());
    }

    #[test]
    fn call_by_name_uses_selector() {
        let call = Call::by_name(Felt::from(1u64), "increment", vec![]);
        assert_eq!(call.entry_point_selector, selector_from_name("increment"));
    }

    #[test]
    fn fee_margin_is_integer_and_rounds_up() {
        let estimate = FeeEstimate::new(100, 1, "wei");
        assert_eq!(estimate.amount, 100);
        assert_eq!(estimate.max_fee_with_margin(15), 115);
        assert_eq!(estimate.max_fee_with_margin(0), 100);
        assert_eq!(FeeEstimate::new(7, 1, "wei").max_fee_with_margin(50), 11);
    }

    #[test]
    fn fee_estimate_amount_is_usage_times_price() {
        let estimate = FeeEstimate::new(2_000, 3_500_000_000, "wei");
        assert_eq!(estimate.amount, 7_000_000_000_000);
        assert_eq!(estimate.amount_felt(), Felt::from(7_000_000_000_000u64));
    }
}
