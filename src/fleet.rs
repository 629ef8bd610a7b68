//! Spawns and supervises one orchestrator per account.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::{ApiError, QuestApi};
use crate::chain::ChainError;
use crate::chain::rpc::RpcChainClient;
use crate::config::Ctx;
use crate::identity::{Identity, IdentityError};
use crate::orchestrator::Orchestrator;

#[derive(Debug, thiserror::Error)]
pub(crate) enum FleetError {
    #[error("no accounts configured; add at least one account secret")]
    NoAccounts,
    #[error(
        "proxy list length ({proxies}) does not match account count ({accounts}); \
         configure one proxy per account or none"
    )]
    ProxyCountMismatch { accounts: usize, proxies: usize },
    #[error("account {index}: {source}")]
    InvalidAccount {
        index: usize,
        #[source]
        source: IdentityError,
    },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Runs one orchestrator per configured account until all are cancelled.
/// Accounts are fully independent; a failing account restarts itself and
/// never takes the fleet down. Configuration problems fail fast, before any
/// orchestration unit starts.
pub(crate) async fn run_fleet(
    ctx: Arc<Ctx>,
    cancel: CancellationToken,
) -> Result<(), FleetError> {
    if ctx.accounts.is_empty() {
        return Err(FleetError::NoAccounts);
    }
    if !ctx.proxies.is_empty() && ctx.proxies.len() != ctx.accounts.len() {
        return Err(FleetError::ProxyCountMismatch {
            accounts: ctx.accounts.len(),
            proxies: ctx.proxies.len(),
        });
    }

    let mut orchestrators = Vec::with_capacity(ctx.accounts.len());
    for (index, secret) in ctx.accounts.iter().enumerate() {
        let identity = Identity::from_secret_hex(secret)
            .map_err(|source| FleetError::InvalidAccount { index, source })?;
        let api = QuestApi::new(ctx.api_base_url.clone(), ctx.proxies.get(index))?;
        let chain = Arc::new(RpcChainClient::new(
            ctx.rpc_url.clone(),
            ctx.programs.gas_budget,
        )?);

        orchestrators.push(Orchestrator::new(
            index,
            identity,
            api,
            chain,
            Arc::clone(&ctx),
            cancel.child_token(),
        ));
    }

    let mut units = JoinSet::new();
    for orchestrator in orchestrators {
        units.spawn(orchestrator.run());
    }
    info!(accounts = units.len(), "fleet started");

    while let Some(joined) = units.join_next().await {
        if let Err(join_error) = joined {
            error!(%join_error, "account unit panicked");
        }
    }

    info!("fleet drained");
    Ok(())
}
