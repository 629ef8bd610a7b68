//! Chain-facing types and the client seam the rest of the bot consumes.
//!
//! The quest chain is a Sui-style object-coin network: balances live in
//! discrete coin objects that fragment as they are spent and must be merged
//! before being used as a single transaction input. Everything here treats
//! the chain as a black box behind [`ChainClient`]; the bundled
//! [`rpc::RpcChainClient`] speaks JSON-RPC, and tests substitute
//! [`mock::MockChain`].

pub(crate) mod consolidate;
#[cfg(test)]
pub(crate) mod mock;
pub(crate) mod poller;
pub(crate) mod rpc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::identity::Identity;

/// Fully qualified type tag of the chain's native gas coin. Fixed by the
/// protocol, not by deployment configuration.
const NATIVE_GAS_COIN: &str = "0x2::mgo::MGO";

/// A `0x`-prefixed 32-byte account address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub(crate) struct ChainAddress(String);

impl ChainAddress {
    pub(crate) fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChainAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fully qualified coin type tag, e.g. `0x2::mgo::MGO`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct CoinType(String);

impl CoinType {
    pub(crate) fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub(crate) fn native_gas() -> Self {
        Self(NATIVE_GAS_COIN.to_string())
    }

    pub(crate) fn is_native_gas(&self) -> bool {
        self.0 == NATIVE_GAS_COIN
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CoinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The coins the quest economy moves through. Playbooks are written against
/// these symbolic tags; configuration resolves them to concrete type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QuestCoin {
    Mgo,
    Mai,
    Usdt,
}

impl QuestCoin {
    /// Wire tag used by the faucet grant endpoint.
    pub(crate) fn tag(self) -> &'static str {
        match self {
            Self::Mgo => "mgo",
            Self::Mai => "mai",
            Self::Usdt => "usdt",
        }
    }
}

/// One spendable coin object owned by an address.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Coin {
    #[serde(rename = "coinObjectId")]
    pub(crate) object_id: String,
    #[serde(deserialize_with = "de_u64_lenient")]
    pub(crate) balance: u64,
}

/// Total balance of one coin type, summed over all holdings at fetch time.
/// Never cached across mutating actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Balance {
    pub(crate) coin_type: CoinType,
    pub(crate) total: u128,
}

/// Transaction digest returned by the chain after execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TxDigest(pub(crate) String);

impl std::fmt::Display for TxDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A call against a fixed on-chain package, the unit every economic action
/// submits exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProgramCall {
    pub(crate) package: String,
    pub(crate) module: String,
    pub(crate) function: String,
    pub(crate) type_args: Vec<String>,
    pub(crate) args: Vec<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ChainError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("RPC endpoint returned status {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("RPC error (code {code}): {message}")]
    Rpc { code: i64, message: String },
    #[error("RPC response missing expected field: {0}")]
    MalformedResponse(&'static str),
    #[error("failed to decode transaction bytes: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("transaction {digest} failed on chain: {status}")]
    ExecutionFailed { digest: String, status: String },
}

/// Blockchain client seam. Balances and coin listings are reads; the
/// remaining operations construct, sign, and execute a single transaction.
#[async_trait]
pub(crate) trait ChainClient: Send + Sync {
    async fn get_all_balances(&self, owner: &ChainAddress) -> Result<Vec<Balance>, ChainError>;

    async fn get_coins(
        &self,
        owner: &ChainAddress,
        coin_type: &CoinType,
    ) -> Result<Vec<Coin>, ChainError>;

    /// Merges `sources` into `primary` in one transaction.
    async fn merge_coins(
        &self,
        signer: &Identity,
        coin_type: &CoinType,
        primary: &Coin,
        sources: &[Coin],
    ) -> Result<TxDigest, ChainError>;

    /// Signs and executes one program call.
    async fn execute_call(
        &self,
        signer: &Identity,
        call: &ProgramCall,
    ) -> Result<TxDigest, ChainError>;

    /// Read-only simulation of a program call; returns the raw inspection
    /// payload for logging or estimation.
    async fn dev_inspect(
        &self,
        sender: &ChainAddress,
        call: &ProgramCall,
    ) -> Result<serde_json::Value, ChainError>;
}

/// Chain RPCs encode u64 amounts as decimal strings; accept both forms.
fn de_u64_lenient<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Number(value) => Ok(value),
        Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_gas_coin_is_recognized() {
        assert!(CoinType::native_gas().is_native_gas());
        assert!(!CoinType::new("0xabc::mai::MAI").is_native_gas());
    }

    #[test]
    fn coin_balance_accepts_string_and_number() {
        let from_string: Coin =
            serde_json::from_str(r#"{"coinObjectId": "0x1", "balance": "42"}"#).unwrap();
        let from_number: Coin =
            serde_json::from_str(r#"{"coinObjectId": "0x1", "balance": 42}"#).unwrap();
        assert_eq!(from_string.balance, 42);
        assert_eq!(from_number.balance, 42);
    }

    #[test]
    fn coin_balance_rejects_garbage() {
        let result: Result<Coin, _> =
            serde_json::from_str(r#"{"coinObjectId": "0x1", "balance": "many"}"#);
        assert!(result.is_err());
    }
}
