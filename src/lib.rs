//! Multi-account quest runner for the Mango test network.
//!
//! For each configured account the bot authenticates against the task API,
//! discovers outstanding reward tasks, performs the on-chain actions that
//! satisfy them, reports completed steps, and settles until the next daily
//! pass. Task status is authoritative on the server; nothing is persisted
//! locally.

use std::sync::Arc;

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod actions;
mod advance;
mod api;
mod chain;
pub mod config;
mod fleet;
mod identity;
mod orchestrator;

use crate::config::Ctx;
use crate::fleet::FleetError;

/// Starts the fleet and runs until it finishes (by design: never, absent an
/// error) or a shutdown signal arrives. Shutdown is cooperative: every sleep
/// and network wait in the account units is cancellable.
pub async fn launch(ctx: Ctx) -> anyhow::Result<()> {
    let ctx = Arc::new(ctx);
    let cancel = CancellationToken::new();
    let mut fleet_task = tokio::spawn(fleet::run_fleet(Arc::clone(&ctx), cancel.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal, cancelling account units");
            cancel.cancel();
        }
        result = &mut fleet_task => {
            report_fleet_result(result)?;
            info!("shutdown complete");
            return Ok(());
        }
    }

    report_fleet_result(fleet_task.await)?;
    info!("shutdown complete");
    Ok(())
}

fn report_fleet_result(
    result: Result<Result<(), FleetError>, JoinError>,
) -> anyhow::Result<()> {
    match result {
        Ok(Ok(())) => {
            info!("fleet completed");
            Ok(())
        }
        Ok(Err(fleet_error)) => {
            error!("fleet failed: {fleet_error}");
            Err(fleet_error.into())
        }
        Err(join_error) => {
            error!("fleet task panicked: {join_error}");
            Err(join_error.into())
        }
    }
}
