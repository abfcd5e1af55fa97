//! # Client Configuration & Constants
//!
//! Every magic number this client needs lives here. Most of them are fixed by
//! the network, not by us: get the field prime or the transaction prefix
//! wrong and the sequencer will politely reject everything you send.
//!
//! The one piece of runtime configuration, [`ClientConfig`], is deliberately
//! small: which chain to sign for and how patiently to poll.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::field::{Felt, FieldError};

// ---------------------------------------------------------------------------
// Field & Curve
// ---------------------------------------------------------------------------

/// The base field prime `P = 2^251 + 17·2^192 + 1`.
pub const FIELD_PRIME_HEX: &str =
    "0x800000000000011000000000000000000000000000000000000000000000001";

/// Order `N` of the curve's generator.
pub const CURVE_ORDER_HEX: &str =
    "0x800000000000010ffffffffffffffffb781126dcae7b2321e66a241adc64d2f";

/// Message hashes, `r` and `w` must all fit in this many bits.
pub const ECDSA_BITS: u32 = 251;

/// How many fresh signing nonces we try before giving up on a message.
/// Each retry has a roughly 2^-250 chance of being needed at all.
pub const MAX_SIGNING_ATTEMPTS: u32 = 16;

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Version stamped into every invoke transaction we sign.
pub const TRANSACTION_VERSION: u64 = 1;

/// Version used for fee simulation: `2^128 + TRANSACTION_VERSION`. A
/// signature over a query transaction can never be replayed as a real one.
pub const QUERY_VERSION_HEX: &str = "0x100000000000000000000000000000001";

/// Short-string prefix of the invoke transaction hash preimage.
pub const INVOKE_PREFIX: &str = "invoke";

/// Entry point every account contract exposes for multicalls.
pub const EXECUTE_ENTRY_POINT: &str = "__execute__";

// ---------------------------------------------------------------------------
// Chains
// ---------------------------------------------------------------------------

pub const CHAIN_ID_MAINNET: &str = "SN_MAIN";
pub const CHAIN_ID_GOERLI: &str = "SN_GOERLI";

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

/// Five seconds is roughly how often a block-producing sequencer has
/// anything new to tell us.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// 150 attempts at 5 s is a bit over twelve minutes: enough for L2
/// acceptance on a congested testnet, nowhere near enough for L1.
pub const DEFAULT_POLL_ATTEMPTS: u32 = 150;

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid chain id: {0}")]
    InvalidChainId(#[from] FieldError),

    #[error("poll.max_attempts must be at least 1")]
    ZeroAttempts,
}

/// How a poller paces itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Sleep between status queries.
    #[serde(rename = "interval_ms", with = "duration_millis")]
    pub interval: Duration,
    /// Upper bound on status queries, transport failures included.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }
}

/// Client-side settings loadable from JSON.
///
/// ```json
/// { "chain_id": "SN_GOERLI", "poll": { "interval_ms": 5000, "max_attempts": 150 } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Chain name as a short string, e.g. `SN_GOERLI`.
    pub chain_id: String,
    #[serde(default)]
    pub poll: PollConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chain_id: CHAIN_ID_GOERLI.to_string(),
            poll: PollConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        self.chain_id_felt()?;
        Ok(())
    }

    /// The chain id as it appears in transaction hashes.
    pub fn chain_id_felt(&self) -> Result<Felt, FieldError> {
        Felt::from_short_string(&self.chain_id)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prime_and_order_parse() {
        let p_minus_one = Felt::zero() - Felt::one();
        assert_eq!(p_minus_one + Felt::one(), Felt::zero());
        // P itself is not a felt; N is.
        assert!(Felt::from_hex(FIELD_PRIME_HEX).is_err());
        assert!(Felt::from_hex(CURVE_ORDER_HEX).is_ok());
    }

    #[test]
    fn test_query_version_offsets_transaction_version() {
        let query = Felt::from_hex(QUERY_VERSION_HEX).unwrap();
        let offset = Felt::from(1u128 << 64) * Felt::from(1u128 << 64);
        assert_eq!(query, offset + Felt::from(TRANSACTION_VERSION));
    }

    #[test]
    fn test_chain_ids_encode_as_short_strings() {
        assert_eq!(
            Felt::from_short_string(CHAIN_ID_GOERLI).unwrap().to_hex(),
            "0x534e5f474f45524c49"
        );
        assert_eq!(
            Felt::from_short_string(CHAIN_ID_MAINNET).unwrap().to_hex(),
            "0x534e5f4d41494e"
        );
    }

    #[test]
    fn test_default_poll_budget() {
        let poll = PollConfig::default();
        assert_eq!(poll.interval, Duration::from_secs(5));
        assert_eq!(poll.max_attempts, 150);
    }

    #[test]
    fn test_client_config_from_json() {
        let config = ClientConfig::from_json(
            r#"{ "chain_id": "SN_MAIN", "poll": { "interval_ms": 250, "max_attempts": 4 } }"#,
        )
        .unwrap();
        assert_eq!(config.chain_id, CHAIN_ID_MAINNET);
        assert_eq!(config.poll.interval, Duration::from_millis(250));
        assert_eq!(config.poll.max_attempts, 4);
    }

    #[test]
    fn test_client_config_poll_defaults_when_omitted() {
        let config = ClientConfig::from_json(r#"{ "chain_id": "SN_GOERLI" }"#).unwrap();
        assert_eq!(config.poll, PollConfig::default());
    }

    #[test]
    fn test_client_config_rejects_zero_attempts() {
        let err = ClientConfig::from_json(
            r#"{ "chain_id": "SN_GOERLI", "poll": { "interval_ms": 1, "max_attempts": 0 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ZeroAttempts));
    }

    #[test]
    fn test_client_config_rejects_unencodable_chain_id() {
        let err = ClientConfig::from_json(
            r#"{ "chain_id": "A_CHAIN_NAME_THAT_IS_FAR_TOO_LONG_TO_FIT" }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidChainId(_)));
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = ClientConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("interval_ms"));
        assert_eq!(ClientConfig::from_json(&json).unwrap(), config);
    }
}
