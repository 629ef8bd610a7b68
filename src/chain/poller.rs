//! Waits for a coin balance to become spendable.
//!
//! Faucet grants and swap outputs land eventually, not immediately, so every
//! action first polls the holding set of its source coin. Each iteration
//! fetches the holdings fresh from the chain; there is no client-side cache
//! to go stale. Transport errors surface immediately so the orchestrator's
//! restart path can deal with them.

use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Balance, ChainAddress, ChainClient, ChainError, CoinType};

#[derive(Debug, Clone)]
pub(crate) struct PollingConfig {
    pub(crate) interval: Duration,
    /// `None` keeps polling forever. Unattended runs should set a cap so a
    /// dry faucet turns into a restart instead of a hung account.
    pub(crate) max_attempts: Option<u64>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum BalanceWaitError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("no {coin_type} balance appeared after {attempts} polls")]
    Exhausted { coin_type: CoinType, attempts: u64 },
    #[error("balance wait for {coin_type} cancelled")]
    Cancelled { coin_type: CoinType },
}

/// Polls until `owner` holds a non-zero balance of `coin_type` and returns
/// it. Never returns a zero balance.
#[tracing::instrument(skip(chain, config, cancel), level = tracing::Level::DEBUG)]
pub(crate) async fn await_non_empty_balance<C: ChainClient + ?Sized>(
    chain: &C,
    owner: &ChainAddress,
    coin_type: &CoinType,
    config: &PollingConfig,
    cancel: &CancellationToken,
) -> Result<Balance, BalanceWaitError> {
    let mut attempts: u64 = 0;

    loop {
        let coins = chain.get_coins(owner, coin_type).await?;
        let total: u128 = coins.iter().map(|coin| u128::from(coin.balance)).sum();

        if total > 0 {
            debug!(%coin_type, total, "balance available");
            return Ok(Balance {
                coin_type: coin_type.clone(),
                total,
            });
        }

        attempts += 1;
        if let Some(max_attempts) = config.max_attempts {
            if attempts >= max_attempts {
                return Err(BalanceWaitError::Exhausted {
                    coin_type: coin_type.clone(),
                    attempts,
                });
            }
        }

        debug!(%coin_type, attempts, "balance still empty, waiting");
        tokio::select! {
            () = cancel.cancelled() => {
                return Err(BalanceWaitError::Cancelled {
                    coin_type: coin_type.clone(),
                });
            }
            () = sleep(config.interval) => {}
        }
    }
}
