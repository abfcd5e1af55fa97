//! End-to-end walk through the client against an in-process sequencer.
//!
//! Declares and deploys a counter, creates an account, estimates the cost of
//! an `increment`, submits it with 15% headroom, waits for L2 acceptance and
//! reads the counter back.
//!
//! Run with:
//!   RUST_LOG=starkline_core=debug cargo run --example demo

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use starkline_core::account::Account;
use starkline_core::config::ClientConfig;
use starkline_core::crypto::{Felt, PrivateKey, StarkCurve, StarkKeypair};
use starkline_core::gateway::{ContractArtifact, ContractClass, Gateway, InMemoryGateway};
use starkline_core::poller::{CancelSignal, TxPoller};
use starkline_core::transaction::{Call, TxStatus};

const COUNTER_CLASS_HASH: &str = "0x2c0ffee";
const FEE_MARGIN_PERCENT: u32 = 15;

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = ClientConfig::from_json(
        r#"{ "chain_id": "SN_GOERLI", "poll": { "interval_ms": 200, "max_attempts": 20 } }"#,
    )?;
    let chain_id = config.chain_id_felt()?;

    let curve = StarkCurve::shared()?;
    let gateway = Arc::new(
        InMemoryGateway::new(curve.clone(), chain_id).with_default_script(vec![
            TxStatus::Received,
            TxStatus::Pending,
            TxStatus::AcceptedOnL2,
        ]),
    );

    // -- contract -------------------------------------------------------------

    let class_hash = Felt::from_hex(COUNTER_CLASS_HASH)?;
    gateway.declare(ContractClass::counter(class_hash));
    let deployed = gateway
        .deploy(&ContractArtifact::new(class_hash), &[Felt::from(41u64)], Felt::from(7u64))
        .await?;
    info!(address = %deployed.contract_address, "counter deployed");

    // -- account --------------------------------------------------------------

    let keypair = StarkKeypair::new(curve, PrivateKey::generate());
    let address = gateway.create_account(*keypair.public_key());
    let account = Account::with_chain_id(gateway.clone(), address, keypair, chain_id);
    info!(address = %account.address(), public_key = %account.public_key(), "account ready");

    // -- estimate, execute ----------------------------------------------------

    let calls = [Call::by_name(deployed.contract_address, "increment", vec![])];
    let estimate = account.estimate_fee(&calls).await?;
    let max_fee = Felt::from(estimate.max_fee_with_margin(FEE_MARGIN_PERCENT));
    info!(estimate = estimate.amount, max_fee = %max_fee, "fee estimated");

    let receipt = account.execute(max_fee, &calls).await?;

    // -- wait -----------------------------------------------------------------

    let poller = TxPoller::with_config(gateway.clone(), config.poll);
    let outcome = poller
        .wait_for(receipt.transaction_hash, TxStatus::AcceptedOnL2, CancelSignal::never())
        .await?;
    info!(attempts = outcome.attempts, status = %outcome.status, "transaction settled");

    let count = account
        .call(&Call::by_name(deployed.contract_address, "get_count", vec![]))
        .await?;
    if let Some(count) = count.first() {
        info!(count = %count, "counter read back");
    }

    Ok(())
}
