//! # Transaction Poller
//!
//! Follows a submitted transaction until it reaches a target status, gets
//! rejected, runs out of attempts, or the caller loses interest.
//!
//! ## State machine
//!
//! ```text
//!            ┌──────────── cancelled? ──► PollCancelled
//!            ▼
//!   ┌──► query status, racing the cancel signal
//!   │        │
//!   │        ├── REJECTED ──────────────► TransactionRejected
//!   │        │
//!   │        ├── reached target ───────► Ok(attempts, status)
//!   │        │
//!   │        └── not yet / transport error
//!   │                │
//!   │         attempts left? ── no ────► PollTimeout(last status)
//!   │                │ yes
//!   └──── sleep(interval), racing the cancel signal
//! ```
//!
//! A query that is still in flight when cancellation arrives is abandoned
//! and does not count as an attempt.
//!
//! Every query counts against `max_attempts`, including ones that fail at
//! the transport layer. A flaky network therefore shortens the budget
//! instead of stretching the loop forever. There is no sleep after the
//! final attempt: a timeout is reported as soon as it is known.
//!
//! "Reached" means at or past the target on the lifecycle ordering, so
//! waiting for `ACCEPTED_ON_L2` also succeeds on `ACCEPTED_ON_L1`.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::PollConfig;
use crate::crypto::field::Felt;
use crate::gateway::Gateway;
use crate::transaction::TxStatus;

// ---------------------------------------------------------------------------
// Errors & outcome
// ---------------------------------------------------------------------------

/// Terminal outcomes of a poll that did not reach its target. The caller
/// decides whether to poll again with a fresh budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("transaction {transaction_hash} rejected after {attempts} status queries")]
    TransactionRejected { transaction_hash: Felt, attempts: u32 },

    #[error("gave up after {attempts} status queries (last status: {last_status:?})")]
    PollTimeout {
        attempts: u32,
        last_status: Option<TxStatus>,
    },

    #[error("polling cancelled after {attempts} status queries")]
    PollCancelled { attempts: u32 },
}

/// A successful poll: how many queries it took and what the last one said.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub attempts: u32,
    pub status: TxStatus,
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Lets a caller abort a poll early.
///
/// Wraps the receiving end of a `watch` channel, the same shutdown idiom the
/// rest of a tokio service uses: send `true` to cancel. Dropping the sender
/// without sending anything does not cancel.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

/// The sending half of a [`CancelSignal`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // No receivers left means nobody is polling; nothing to cancel.
        let _ = self.tx.send(true);
    }
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    pub fn channel() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal::new(rx))
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolves once cancellation is requested; never, otherwise.
    async fn cancelled(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without cancelling.
                return std::future::pending().await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TxPoller
// ---------------------------------------------------------------------------

/// Polls a [`Gateway`] for transaction status.
pub struct TxPoller {
    gateway: Arc<dyn Gateway>,
    config: PollConfig,
}

impl TxPoller {
    /// A poller with the default budget (5 s interval, 150 attempts).
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_config(gateway, PollConfig::default())
    }

    pub fn with_config(gateway: Arc<dyn Gateway>, config: PollConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Polls with this poller's configured interval and budget.
    pub async fn wait_for(
        &self,
        transaction_hash: Felt,
        target: TxStatus,
        cancel: CancelSignal,
    ) -> Result<PollOutcome, PollError> {
        self.poll(
            transaction_hash,
            target,
            self.config.interval,
            self.config.max_attempts,
            cancel,
        )
        .await
    }

    /// Queries `transaction_hash` at most `max_attempts` times, `interval`
    /// apart, until it reaches `target`.
    pub async fn poll(
        &self,
        transaction_hash: Felt,
        target: TxStatus,
        interval: Duration,
        max_attempts: u32,
        mut cancel: CancelSignal,
    ) -> Result<PollOutcome, PollError> {
        let mut last_status = None;

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                info!(tx_hash = %transaction_hash, attempts = attempt - 1, "polling cancelled");
                return Err(PollError::PollCancelled {
                    attempts: attempt - 1,
                });
            }

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(tx_hash = %transaction_hash, attempts = attempt - 1, "polling cancelled during request");
                    return Err(PollError::PollCancelled {
                        attempts: attempt - 1,
                    });
                }
                response = self.gateway.get_transaction_status(transaction_hash) => response,
            };

            match response {
                Ok(TxStatus::Rejected) => {
                    warn!(tx_hash = %transaction_hash, attempt, "transaction rejected");
                    return Err(PollError::TransactionRejected {
                        transaction_hash,
                        attempts: attempt,
                    });
                }
                Ok(status) => {
                    debug!(tx_hash = %transaction_hash, attempt, status = %status, "status observed");
                    last_status = Some(status);
                    if status.has_reached(target) {
                        info!(
                            tx_hash = %transaction_hash,
                            attempts = attempt,
                            status = %status,
                            "target status reached"
                        );
                        return Ok(PollOutcome {
                            attempts: attempt,
                            status,
                        });
                    }
                }
                Err(e) => {
                    warn!(tx_hash = %transaction_hash, attempt, error = %e, "status query failed");
                }
            }

            if attempt < max_attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!(tx_hash = %transaction_hash, attempts = attempt, "polling cancelled during sleep");
                        return Err(PollError::PollCancelled { attempts: attempt });
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }

        warn!(
            tx_hash = %transaction_hash,
            attempts = max_attempts,
            last_status = ?last_status,
            "polling budget exhausted"
        );
        Err(PollError::PollTimeout {
            attempts: max_attempts,
            last_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::curve::StarkCurve;
    use crate::gateway::{
        BlockId, ContractArtifact, DeployResponse, GatewayError, InMemoryGateway, TransactionRecord,
    };
    use crate::transaction::{Call, FeeEstimate, InvokeTransaction, TransactionReceipt};

    fn gateway() -> Arc<InMemoryGateway> {
        Arc::new(InMemoryGateway::new(
            StarkCurve::shared().unwrap(),
            Felt::from_short_string("SN_GOERLI").unwrap(),
        ))
    }

    const HASH: u64 = 0xfeed;

    #[tokio::test(start_paused = true)]
    async fn reaches_target_on_third_query() {
        let gw = gateway();
        let hash = Felt::from(HASH);
        gw.script_status(
            hash,
            vec![TxStatus::Pending, TxStatus::Pending, TxStatus::AcceptedOnL2],
        );
        let poller = TxPoller::new(gw.clone());
        let outcome = poller
            .poll(hash, TxStatus::AcceptedOnL2, Duration::from_secs(1), 10, CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            PollOutcome {
                attempts: 3,
                status: TxStatus::AcceptedOnL2
            }
        );
        assert_eq!(gw.status_queries(hash), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_times_out_without_querying() {
        let gw = gateway();
        let poller = TxPoller::new(gw.clone());
        let err = poller
            .poll(Felt::from(HASH), TxStatus::Received, Duration::from_secs(1), 0, CancelSignal::never())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PollError::PollTimeout {
                attempts: 0,
                last_status: None
            }
        );
        assert_eq!(gw.status_queries(Felt::from(HASH)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_consume_attempts() {
        let gw = gateway();
        let hash = Felt::from(HASH);
        gw.script_status(hash, vec![TxStatus::AcceptedOnL2]);
        gw.fail_next_requests(2);
        let poller = TxPoller::new(gw.clone());
        let err = poller
            .poll(hash, TxStatus::AcceptedOnL2, Duration::from_secs(1), 2, CancelSignal::never())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PollError::PollTimeout {
                attempts: 2,
                last_status: None
            }
        );

        // With budget to spare the third query gets through.
        gw.fail_next_requests(2);
        let outcome = poller
            .poll(hash, TxStatus::AcceptedOnL2, Duration::from_secs(1), 3, CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn already_cancelled_makes_no_queries() {
        let gw = gateway();
        let (handle, signal) = CancelSignal::channel();
        handle.cancel();
        let poller = TxPoller::new(gw.clone());
        let err = poller
            .poll(Felt::from(HASH), TxStatus::AcceptedOnL2, Duration::from_secs(1), 5, signal)
            .await
            .unwrap_err();
        assert_eq!(err, PollError::PollCancelled { attempts: 0 });
        assert_eq!(gw.status_queries(Felt::from(HASH)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_handle_does_not_cancel() {
        let gw = gateway();
        let hash = Felt::from(HASH);
        gw.script_status(hash, vec![TxStatus::Pending, TxStatus::AcceptedOnL1]);
        let (handle, signal) = CancelSignal::channel();
        drop(handle);
        let outcome = TxPoller::new(gw)
            .poll(hash, TxStatus::AcceptedOnL2, Duration::from_secs(1), 5, signal)
            .await
            .unwrap();
        assert_eq!(outcome.status, TxStatus::AcceptedOnL1);
        assert_eq!(outcome.attempts, 2);
    }

    /// A gateway whose requests never complete.
    struct Unresponsive;

    #[async_trait::async_trait]
    impl Gateway for Unresponsive {
        fn chain_id(&self) -> Felt {
            Felt::zero()
        }

        async fn deploy(
            &self,
            _: &ContractArtifact,
            _: &[Felt],
            _: Felt,
        ) -> Result<DeployResponse, GatewayError> {
            std::future::pending().await
        }

        async fn get_transaction_status(&self, _: Felt) -> Result<TxStatus, GatewayError> {
            std::future::pending().await
        }

        async fn get_transaction(&self, _: Felt) -> Result<TransactionRecord, GatewayError> {
            std::future::pending().await
        }

        async fn call(&self, _: &Call, _: BlockId) -> Result<Vec<Felt>, GatewayError> {
            std::future::pending().await
        }

        async fn estimate_fee(&self, _: &InvokeTransaction) -> Result<FeeEstimate, GatewayError> {
            std::future::pending().await
        }

        async fn invoke(&self, _: &InvokeTransaction) -> Result<TransactionReceipt, GatewayError> {
            std::future::pending().await
        }

        async fn get_nonce(&self, _: Felt) -> Result<Felt, GatewayError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_a_hung_request() {
        let (handle, signal) = CancelSignal::channel();
        let poller = TxPoller::new(Arc::new(Unresponsive));
        let task = tokio::spawn(async move {
            poller
                .poll(Felt::from(HASH), TxStatus::AcceptedOnL2, Duration::from_secs(1), 5, signal)
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("poll returned after cancel")
            .unwrap();
        assert_eq!(result, Err(PollError::PollCancelled { attempts: 0 }));
    }

    #[test]
    fn never_is_never_cancelled() {
        assert!(!CancelSignal::never().is_cancelled());
        assert!(!CancelSignal::default().is_cancelled());
    }
}
