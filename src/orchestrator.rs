//! Per-account orchestration state machine.
//!
//! One orchestrator owns one account: its identity, API client, and session.
//! The machine is an explicit enum rather than a recursive retry so restarts
//! cost no stack, and the per-pass context (session, profile) travels inside
//! the state variants instead of mutable fields. Any error in any phase
//! lands in `Failed`, which logs, waits briefly, and restarts the whole pass
//! from a fresh login. There is no terminal success state; only cancellation
//! ends the loop.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::actions::ActionExecutor;
use crate::advance::{AdvanceError, TaskAdvancer};
use crate::api::{ApiError, QuestApi, Session, UserProfile};
use crate::chain::{ChainClient, ChainError};
use crate::config::Ctx;
use crate::identity::Identity;

#[derive(Debug, thiserror::Error)]
pub(crate) enum OrchestrationError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Advance(#[from] AdvanceError),
}

#[derive(Debug)]
pub(crate) enum Phase {
    Authenticating,
    FetchingProfile {
        session: Session,
    },
    AdvancingTasks {
        session: Session,
        profile: UserProfile,
    },
    Settling,
    Failed {
        error: OrchestrationError,
    },
}

pub(crate) struct Orchestrator<C> {
    index: usize,
    identity: Identity,
    api: QuestApi,
    chain: Arc<C>,
    ctx: Arc<Ctx>,
    cancel: CancellationToken,
}

impl<C: ChainClient> Orchestrator<C> {
    pub(crate) fn new(
        index: usize,
        identity: Identity,
        api: QuestApi,
        chain: Arc<C>,
        ctx: Arc<Ctx>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            index,
            identity,
            api,
            chain,
            ctx,
            cancel,
        }
    }

    /// Drives the state machine until cancelled.
    #[tracing::instrument(
        skip(self),
        fields(account = self.index, address = %self.identity.address())
    )]
    pub(crate) async fn run(self) {
        info!("orchestrator started");

        let mut phase = Phase::Authenticating;
        loop {
            if self.cancel.is_cancelled() {
                info!("orchestrator stopped");
                return;
            }
            phase = self.step(phase).await;
        }
    }

    /// One state transition. Kept separate from [`run`] so tests can walk
    /// the machine phase by phase.
    pub(crate) async fn step(&self, phase: Phase) -> Phase {
        match phase {
            Phase::Authenticating => match self.api.login(&self.identity).await {
                Ok(session) => {
                    info!("login succeeded");
                    Phase::FetchingProfile { session }
                }
                Err(error) => Phase::Failed {
                    error: error.into(),
                },
            },
            Phase::FetchingProfile { session } => match self.fetch_profile(&session).await {
                Ok(profile) => Phase::AdvancingTasks { session, profile },
                Err(error) => Phase::Failed { error },
            },
            Phase::AdvancingTasks { session, profile } => {
                info!(user = %profile.title, "advancing tasks");
                match self.advance_all(&session).await {
                    Ok(()) => Phase::Settling,
                    Err(error) => Phase::Failed { error },
                }
            }
            Phase::Settling => {
                debug!("pass complete, settling until the next one");
                self.wait(self.ctx.settle_interval).await;
                Phase::Authenticating
            }
            Phase::Failed { error } => {
                error!(%error, "pass failed, restarting after delay");
                self.wait(self.ctx.retry_delay).await;
                Phase::Authenticating
            }
        }
    }

    async fn fetch_profile(&self, session: &Session) -> Result<UserProfile, OrchestrationError> {
        let profile = self.api.get_user(session).await?;
        let balances = self.chain.get_all_balances(self.identity.address()).await?;
        info!(
            user = %profile.title,
            status = profile.status,
            coin_types = balances.len(),
            "profile fetched"
        );
        Ok(profile)
    }

    /// Advances every configured task in table order, pacing between them.
    async fn advance_all(&self, session: &Session) -> Result<(), OrchestrationError> {
        let executor = ActionExecutor::new(
            self.chain.as_ref(),
            &self.identity,
            &self.ctx.programs,
            &self.ctx.polling,
            &self.cancel,
        );
        let advancer = TaskAdvancer::new(&self.api, session, &executor, &self.ctx.programs);

        for endpoint in &self.ctx.tasks {
            let task = self.api.task_detail(session, endpoint).await?;
            advancer.advance(endpoint, &task).await?;
            self.wait(self.ctx.pace_delay).await;
        }

        Ok(())
    }

    /// Cancellable sleep with jitter, so a fleet of accounts does not hit
    /// the remote service in lockstep.
    async fn wait(&self, base: Duration) {
        let max_jitter_ms =
            u64::try_from(self.ctx.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if max_jitter_ms > 0 {
            Duration::from_millis(rand::thread_rng().gen_range(0..max_jitter_ms))
        } else {
            Duration::ZERO
        };

        tokio::select! {
            () = self.cancel.cancelled() => {}
            () = sleep(base + jitter) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::chain::mock::MockChain;
    use crate::config::tests::create_test_ctx;

    const TEST_SECRET: &str =
        "0x0101010101010101010101010101010101010101010101010101010101010101";

    fn orchestrator(server: &MockServer) -> Orchestrator<MockChain> {
        let ctx = Arc::new(create_test_ctx());
        Orchestrator::new(
            0,
            Identity::from_secret_hex(TEST_SECRET).unwrap(),
            QuestApi::new(server.base_url().parse().unwrap(), None).unwrap(),
            Arc::new(MockChain::new()),
            ctx,
            CancellationToken::new(),
        )
    }

    fn mock_login_success(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(POST).path("/login");
            then.status(200)
                .json_body(json!({"code": 0, "msg": "success", "data": {"token": "tok123"}}));
        })
    }

    fn mock_user(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(GET).path("/user");
            then.status(200).json_body(json!({
                "code": 0,
                "msg": "success",
                "data": {"status": 1, "title": "quester-7"}
            }));
        })
    }

    fn mock_completed_tasks(server: &MockServer) -> httpmock::Mock<'_> {
        server.mock(|when, then| {
            when.method(POST).path("/taskDetail");
            then.status(200).json_body(json!({
                "code": 0,
                "msg": "success",
                "data": {
                    "id": 1,
                    "title": "done task",
                    "step": [{"sort": 0, "label": "step", "status": "1"}]
                }
            }));
        })
    }

    #[tokio::test]
    async fn rejected_login_fails_without_fetching_the_profile() {
        let server = MockServer::start();
        let orchestrator = orchestrator(&server);

        server.mock(|when, then| {
            when.method(POST).path("/login");
            then.status(200)
                .json_body(json!({"code": 1, "msg": "bad signature", "data": null}));
        });
        let user = mock_user(&server);

        let phase = orchestrator.step(Phase::Authenticating).await;
        let Phase::Failed { error } = phase else {
            panic!("expected Failed, got {phase:?}");
        };
        assert!(matches!(
            error,
            OrchestrationError::Api(ApiError::Api { code: 1, .. })
        ));

        // Failure restarts the machine from a fresh login.
        let next = orchestrator.step(Phase::Failed { error }).await;
        assert!(matches!(next, Phase::Authenticating));
        assert_eq!(user.hits(), 0);
    }

    #[tokio::test]
    async fn happy_pass_walks_every_phase_in_order() {
        let server = MockServer::start();
        let orchestrator = orchestrator(&server);

        let login = mock_login_success(&server);
        let user = mock_user(&server);
        let tasks = mock_completed_tasks(&server);

        let phase = orchestrator.step(Phase::Authenticating).await;
        assert!(matches!(phase, Phase::FetchingProfile { .. }));

        let phase = orchestrator.step(phase).await;
        let Phase::AdvancingTasks { ref profile, .. } = phase else {
            panic!("expected AdvancingTasks, got {phase:?}");
        };
        assert_eq!(profile.title, "quester-7");

        let phase = orchestrator.step(phase).await;
        assert!(matches!(phase, Phase::Settling));

        let phase = orchestrator.step(phase).await;
        assert!(matches!(phase, Phase::Authenticating));

        login.assert();
        user.assert();
        assert_eq!(tasks.hits(), 4);
    }

    #[tokio::test]
    async fn each_pass_logs_in_with_a_fresh_session() {
        let server = MockServer::start();
        let orchestrator = orchestrator(&server);

        let login = mock_login_success(&server);
        mock_user(&server);
        mock_completed_tasks(&server);

        let mut phase = Phase::Authenticating;
        // Two full passes: Authenticating -> Fetching -> Advancing ->
        // Settling -> Authenticating, twice around.
        for _ in 0..8 {
            phase = orchestrator.step(phase).await;
        }
        assert!(matches!(phase, Phase::Authenticating));

        assert_eq!(login.hits(), 2);
    }

    #[tokio::test]
    async fn transport_failure_during_profile_fetch_restarts_the_pass() {
        let server = MockServer::start();
        let orchestrator = orchestrator(&server);

        mock_login_success(&server);
        server.mock(|when, then| {
            when.method(GET).path("/user");
            then.status(500).body("boom");
        });

        let phase = orchestrator.step(Phase::Authenticating).await;
        let phase = orchestrator.step(phase).await;

        let Phase::Failed { error } = phase else {
            panic!("expected Failed, got {phase:?}");
        };
        assert!(matches!(
            error,
            OrchestrationError::Api(ApiError::Http { .. })
        ));
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let server = MockServer::start();
        let ctx = Arc::new(create_test_ctx());
        let cancel = CancellationToken::new();
        let orchestrator = Orchestrator::new(
            0,
            Identity::from_secret_hex(TEST_SECRET).unwrap(),
            QuestApi::new(server.base_url().parse().unwrap(), None).unwrap(),
            Arc::new(MockChain::new()),
            ctx,
            cancel.clone(),
        );

        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), orchestrator.run())
            .await
            .expect("run should return promptly once cancelled");
    }
}
