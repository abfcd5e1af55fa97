// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Starkline Core
//!
//! The client half of a STARK-based layer-2 network: everything a wallet,
//! a deploy script or a bot needs to talk to the sequencer without trusting
//! anyone else to do the math.
//!
//! Starkline does its own arithmetic. Felts are reduced modulo
//! `P = 2^251 + 17·2^192 + 1`, keys live on the STARK curve, transactions
//! are hashed with Pedersen and signed with deterministic ECDSA. The network
//! itself stays behind a trait.
//!
//! ## Architecture
//!
//! - **crypto**: field elements, the curve, Pedersen, keys and signatures.
//! - **transaction**: calls, invoke transactions, their hash and signature.
//! - **gateway**: the [`Gateway`](gateway::Gateway) trait and an in-memory sequencer.
//! - **account**: nonce tracking, fee estimation, execution.
//! - **poller**: waiting for a transaction to land, with a bounded budget.
//! - **config**: chain parameters, curve constants, polling defaults.
//!
//! ## Ground rules
//!
//! 1. Field values never leave `[0, P)`. Constructors reduce or refuse.
//! 2. Nothing here retries a submission on its own.
//! 3. Every wait is bounded and cancellable.

pub mod account;
pub mod config;
pub mod crypto;
pub mod gateway;
pub mod poller;
pub mod transaction;
