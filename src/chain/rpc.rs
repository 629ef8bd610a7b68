//! JSON-RPC implementation of [`ChainClient`].
//!
//! Mutating operations go through the node's transaction builder: an
//! `unsafe_*` call returns BCS transaction bytes, which are signed locally
//! and submitted via `mgo_executeTransactionBlock` with local-execution
//! confirmation, so balance reads issued afterwards see the effects.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

use super::{Balance, ChainAddress, ChainClient, ChainError, Coin, CoinType, ProgramCall, TxDigest};
use crate::identity::Identity;
use async_trait::async_trait;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) struct RpcChainClient {
    client: Client,
    rpc_url: Url,
    gas_budget: u64,
}

#[derive(Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinPage {
    data: Vec<Coin>,
    #[serde(default)]
    has_next_page: bool,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceEntry {
    coin_type: String,
    total_balance: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBytes {
    tx_bytes: String,
}

#[derive(Deserialize)]
struct ExecuteResponse {
    digest: String,
    effects: Option<TxEffects>,
}

#[derive(Deserialize)]
struct TxEffects {
    status: TxStatus,
}

#[derive(Deserialize)]
struct TxStatus {
    status: String,
    error: Option<String>,
}

impl RpcChainClient {
    pub(crate) fn new(rpc_url: Url, gas_budget: u64) -> Result<Self, ChainError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            rpc_url,
            gas_budget,
        })
    }

    async fn rpc_call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(self.rpc_url.clone())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ChainError::Http { status, body });
        }

        let envelope: RpcEnvelope<T> = response.json().await?;

        if let Some(error) = envelope.error {
            return Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        envelope
            .result
            .ok_or(ChainError::MalformedResponse("result"))
    }

    /// Builds the move-call transaction for `call` and returns its unsigned
    /// BCS bytes, base64-encoded.
    async fn build_call_bytes(
        &self,
        sender: &ChainAddress,
        call: &ProgramCall,
    ) -> Result<String, ChainError> {
        let built: TransactionBytes = self
            .rpc_call(
                "unsafe_moveCall",
                json!([
                    sender.as_str(),
                    call.package,
                    call.module,
                    call.function,
                    call.type_args,
                    call.args,
                    Value::Null,
                    self.gas_budget.to_string(),
                ]),
            )
            .await?;
        Ok(built.tx_bytes)
    }

    async fn sign_and_execute(
        &self,
        signer: &Identity,
        tx_bytes_b64: &str,
    ) -> Result<TxDigest, ChainError> {
        let tx_bytes = BASE64.decode(tx_bytes_b64)?;
        let signature = signer.sign_transaction(&tx_bytes);

        let executed: ExecuteResponse = self
            .rpc_call(
                "mgo_executeTransactionBlock",
                json!([
                    tx_bytes_b64,
                    [signature],
                    { "showEffects": true },
                    "WaitForLocalExecution",
                ]),
            )
            .await?;

        if let Some(effects) = &executed.effects {
            if effects.status.status != "success" {
                let status = effects
                    .status
                    .error
                    .clone()
                    .unwrap_or_else(|| effects.status.status.clone());
                return Err(ChainError::ExecutionFailed {
                    digest: executed.digest,
                    status,
                });
            }
        }

        Ok(TxDigest(executed.digest))
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn get_all_balances(&self, owner: &ChainAddress) -> Result<Vec<Balance>, ChainError> {
        let entries: Vec<BalanceEntry> = self
            .rpc_call("mgox_getAllBalances", json!([owner.as_str()]))
            .await?;

        entries
            .into_iter()
            .map(|entry| {
                let total = entry
                    .total_balance
                    .parse()
                    .map_err(|_| ChainError::MalformedResponse("totalBalance"))?;
                Ok(Balance {
                    coin_type: CoinType::new(entry.coin_type),
                    total,
                })
            })
            .collect()
    }

    async fn get_coins(
        &self,
        owner: &ChainAddress,
        coin_type: &CoinType,
    ) -> Result<Vec<Coin>, ChainError> {
        let mut coins = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page: CoinPage = self
                .rpc_call(
                    "mgox_getCoins",
                    json!([owner.as_str(), coin_type.as_str(), cursor, Value::Null]),
                )
                .await?;

            coins.extend(page.data);

            if !page.has_next_page {
                return Ok(coins);
            }
            cursor = page.next_cursor;
        }
    }

    async fn merge_coins(
        &self,
        signer: &Identity,
        _coin_type: &CoinType,
        primary: &Coin,
        sources: &[Coin],
    ) -> Result<TxDigest, ChainError> {
        let source_ids: Vec<&str> = sources.iter().map(|coin| coin.object_id.as_str()).collect();

        let built: TransactionBytes = self
            .rpc_call(
                "unsafe_mergeCoins",
                json!([
                    signer.address().as_str(),
                    primary.object_id,
                    source_ids,
                    Value::Null,
                    self.gas_budget.to_string(),
                ]),
            )
            .await?;

        self.sign_and_execute(signer, &built.tx_bytes).await
    }

    async fn execute_call(
        &self,
        signer: &Identity,
        call: &ProgramCall,
    ) -> Result<TxDigest, ChainError> {
        let tx_bytes = self.build_call_bytes(signer.address(), call).await?;
        self.sign_and_execute(signer, &tx_bytes).await
    }

    async fn dev_inspect(
        &self,
        sender: &ChainAddress,
        call: &ProgramCall,
    ) -> Result<Value, ChainError> {
        let tx_bytes = self.build_call_bytes(sender, call).await?;
        self.rpc_call(
            "mgo_devInspectTransactionBlock",
            json!([sender.as_str(), tx_bytes]),
        )
        .await
    }
}
