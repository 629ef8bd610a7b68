//! Economic actions against the quest chain.
//!
//! Every action follows the same shape: wait for a spendable holding of the
//! source coin, consolidate it, sweep the entire consolidated balance into
//! one program call, then refresh balances. Errors propagate unchanged; the
//! orchestrator owns recovery. The one exception is the daily check-in,
//! whose failure is expected (already checked in) and only logged.

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::chain::consolidate::consolidate;
use crate::chain::poller::{BalanceWaitError, PollingConfig, await_non_empty_balance};
use crate::chain::{ChainClient, ChainError, Coin, CoinType, ProgramCall, TxDigest};
use crate::config::ProgramCtx;
use crate::identity::Identity;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ActionError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Balance(#[from] BalanceWaitError),
    #[error("no spendable {coin_type} holding after consolidation")]
    InsufficientBalance { coin_type: CoinType },
}

pub(crate) struct ActionExecutor<'a, C: ChainClient + ?Sized> {
    chain: &'a C,
    identity: &'a Identity,
    programs: &'a ProgramCtx,
    polling: &'a PollingConfig,
    cancel: &'a CancellationToken,
}

impl<'a, C: ChainClient + ?Sized> ActionExecutor<'a, C> {
    pub(crate) fn new(
        chain: &'a C,
        identity: &'a Identity,
        programs: &'a ProgramCtx,
        polling: &'a PollingConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            chain,
            identity,
            programs,
            polling,
            cancel,
        }
    }

    pub(crate) async fn swap(
        &self,
        from: &CoinType,
        to: &CoinType,
    ) -> Result<TxDigest, ActionError> {
        let input = self.ensure_funds(from).await?;
        let call = ProgramCall {
            package: self.programs.swap_package.clone(),
            module: "router".to_string(),
            function: "swap_exact_input".to_string(),
            type_args: vec![from.as_str().to_string(), to.as_str().to_string()],
            args: vec![json!(input.object_id), json!(input.balance.to_string())],
        };

        let digest = self.chain.execute_call(self.identity, &call).await?;
        info!(%from, %to, amount = input.balance, %digest, "swap executed");
        self.refresh_balances().await?;
        Ok(digest)
    }

    pub(crate) async fn exchange(
        &self,
        from: &CoinType,
        to: &CoinType,
    ) -> Result<TxDigest, ActionError> {
        let input = self.ensure_funds(from).await?;
        let call = ProgramCall {
            package: self.programs.exchange_package.clone(),
            module: "exchange".to_string(),
            function: "exchange_all".to_string(),
            type_args: vec![from.as_str().to_string(), to.as_str().to_string()],
            args: vec![json!(input.object_id), json!(input.balance.to_string())],
        };

        let simulation = self
            .chain
            .dev_inspect(self.identity.address(), &call)
            .await?;
        debug!(%from, %to, %simulation, "exchange simulated");

        let digest = self.chain.execute_call(self.identity, &call).await?;
        info!(%from, %to, amount = input.balance, %digest, "exchange executed");
        self.refresh_balances().await?;
        Ok(digest)
    }

    pub(crate) async fn bridge(&self, coin: &CoinType) -> Result<TxDigest, ActionError> {
        let input = self.ensure_funds(coin).await?;
        let call = ProgramCall {
            package: self.programs.bridge_package.clone(),
            module: "bridge".to_string(),
            function: "send_token".to_string(),
            type_args: vec![coin.as_str().to_string()],
            args: vec![
                json!(input.object_id),
                json!(input.balance.to_string()),
                json!(self.programs.dest_chain),
            ],
        };

        let digest = self.chain.execute_call(self.identity, &call).await?;
        info!(
            %coin,
            amount = input.balance,
            dest_chain = self.programs.dest_chain,
            %digest,
            "bridge executed"
        );
        self.refresh_balances().await?;
        Ok(digest)
    }

    /// Daily check-in. Rejection means the account already checked in today,
    /// so failures are logged and swallowed rather than propagated.
    pub(crate) async fn check_in(&self) -> Result<Option<TxDigest>, ActionError> {
        let call = ProgramCall {
            package: self.programs.checkin_package.clone(),
            module: "daily".to_string(),
            function: "check_in".to_string(),
            type_args: Vec::new(),
            args: Vec::new(),
        };

        match self.chain.execute_call(self.identity, &call).await {
            Ok(digest) => {
                info!(%digest, "daily check-in executed");
                self.refresh_balances().await?;
                Ok(Some(digest))
            }
            Err(error) => {
                info!(%error, "check-in not accepted, already checked in today");
                Ok(None)
            }
        }
    }

    /// Waits for a non-empty holding, consolidates it, and returns the coin
    /// to spend. Insufficient balance means the holding set is empty after
    /// consolidation, not that any single fetch looked empty.
    async fn ensure_funds(&self, coin_type: &CoinType) -> Result<Coin, ActionError> {
        await_non_empty_balance(
            self.chain,
            self.identity.address(),
            coin_type,
            self.polling,
            self.cancel,
        )
        .await?;
        consolidate(self.chain, self.identity, coin_type).await?;

        let coins = self
            .chain
            .get_coins(self.identity.address(), coin_type)
            .await?;
        coins
            .into_iter()
            .find(|coin| coin.balance > 0)
            .ok_or_else(|| ActionError::InsufficientBalance {
                coin_type: coin_type.clone(),
            })
    }

    async fn refresh_balances(&self) -> Result<(), ChainError> {
        let balances = self.chain.get_all_balances(self.identity.address()).await?;
        debug!(coin_types = balances.len(), "balances refreshed");
        Ok(())
    }
}
