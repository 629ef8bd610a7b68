//! Task advancement: playbooks and step reporting.
//!
//! Which actions satisfy which task is fixed configuration, not derived at
//! runtime: one playbook per task kind, written against symbolic coins so the
//! table stays `const`. A kind without a playbook (server-added tasks this
//! build does not know) is skipped entirely.

use tracing::{debug, info};

use crate::actions::{ActionError, ActionExecutor};
use crate::api::{ApiError, QuestApi, Session, Task, TaskKind};
use crate::chain::{ChainClient, QuestCoin};
use crate::config::{ProgramCtx, TaskEndpoint};

/// One entry in a task playbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Swap { from: QuestCoin, to: QuestCoin },
    Exchange { from: QuestCoin, to: QuestCoin },
    Bridge { coin: QuestCoin },
    CheckIn,
    Faucet { grant: QuestCoin },
}

// The coin flow across playbooks is acyclic in task order: faucet grants
// fund the swap, the swap's USDT feeds the exchange, and the bridge sweeps
// the exchange output.
const FAUCET_ACTIONS: &[Action] = &[
    Action::Faucet {
        grant: QuestCoin::Mgo,
    },
    Action::Faucet {
        grant: QuestCoin::Mai,
    },
    Action::CheckIn,
];

const SWAP_ACTIONS: &[Action] = &[Action::Swap {
    from: QuestCoin::Mai,
    to: QuestCoin::Usdt,
}];

const EXCHANGE_ACTIONS: &[Action] = &[
    Action::Exchange {
        from: QuestCoin::Usdt,
        to: QuestCoin::Mgo,
    },
    Action::Bridge {
        coin: QuestCoin::Mgo,
    },
];

// Discord membership is verified server-side; the bot only reports steps.
const DISCORD_ACTIONS: &[Action] = &[];

pub(crate) fn playbook(kind: TaskKind) -> Option<&'static [Action]> {
    match kind {
        TaskKind::Faucet => Some(FAUCET_ACTIONS),
        TaskKind::Swap => Some(SWAP_ACTIONS),
        TaskKind::Exchange => Some(EXCHANGE_ACTIONS),
        TaskKind::Discord => Some(DISCORD_ACTIONS),
        TaskKind::Other => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum AdvanceError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Action(#[from] ActionError),
}

pub(crate) struct TaskAdvancer<'a, C: ChainClient + ?Sized> {
    api: &'a QuestApi,
    session: &'a Session,
    executor: &'a ActionExecutor<'a, C>,
    programs: &'a ProgramCtx,
}

impl<'a, C: ChainClient + ?Sized> TaskAdvancer<'a, C> {
    pub(crate) fn new(
        api: &'a QuestApi,
        session: &'a Session,
        executor: &'a ActionExecutor<'a, C>,
        programs: &'a ProgramCtx,
    ) -> Self {
        Self {
            api,
            session,
            executor,
            programs,
        }
    }

    /// Runs the playbook for `task` if it has pending steps, reports every
    /// step observed pending (ascending by sort index), and re-fetches the
    /// task so callers see authoritative status. Returns the refreshed task,
    /// or `None` when there was nothing to do.
    #[tracing::instrument(skip_all, fields(kind = %endpoint.kind, task_id = task.id))]
    pub(crate) async fn advance(
        &self,
        endpoint: &TaskEndpoint,
        task: &Task,
    ) -> Result<Option<Task>, AdvanceError> {
        let pending = task.pending_step_ids();
        if pending.is_empty() {
            debug!(task = %task.title, "task already complete");
            return Ok(None);
        }

        let Some(actions) = playbook(endpoint.kind) else {
            debug!("no playbook for task kind, skipping");
            return Ok(None);
        };

        info!(task = %task.title, pending = pending.len(), "advancing task");
        for action in actions {
            self.run(action).await?;
        }

        // Reporting is the unit of forward progress: once a step is reported
        // it is never rolled back, and re-reporting a step the server still
        // shows pending is a legitimate idempotent retry.
        for step_id in &pending {
            self.api.add_step(self.session, task.id, *step_id).await?;
            info!(step = step_id, "step reported");
        }

        let refreshed = self.api.task_detail(self.session, endpoint).await?;
        Ok(Some(refreshed))
    }

    async fn run(&self, action: &Action) -> Result<(), AdvanceError> {
        match *action {
            Action::Swap { from, to } => {
                self.executor
                    .swap(&self.programs.coin(from), &self.programs.coin(to))
                    .await?;
            }
            Action::Exchange { from, to } => {
                self.executor
                    .exchange(&self.programs.coin(from), &self.programs.coin(to))
                    .await?;
            }
            Action::Bridge { coin } => {
                self.executor.bridge(&self.programs.coin(coin)).await?;
            }
            Action::CheckIn => {
                self.executor.check_in().await?;
            }
            Action::Faucet { grant } => {
                self.api
                    .faucet(self.session, &self.programs.faucet_chain, grant.tag())
                    .await?;
                info!(grant = grant.tag(), "faucet grant requested");
            }
        }
        Ok(())
    }
}
