//! Authenticated HTTP client for the task-tracking API.
//!
//! Login is challenge-response: the client signs `"<prefix>:<sign_time_ms>"`
//! with the account key and trades the signature for a bearer token. The
//! token lives in a [`Session`] owned by one orchestration pass; a rejected
//! token is not refreshed in place, the whole pass restarts with a fresh
//! login.

use chrono::Utc;
use reqwest::{Client, Proxy, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

use super::types::{LoginData, Task, UserProfile};
use crate::config::TaskEndpoint;
use crate::identity::Identity;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const LOGIN_CHALLENGE_PREFIX: &str = "quest-login";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ApiError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("task API returned status {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("task API error (code {code}): {msg}")]
    Api { code: i64, msg: String },
    #[error("task API response for {context} carried no data")]
    MissingData { context: &'static str },
}

/// Bearer token from one successful login. Owned by a single orchestration
/// pass and never reused across passes.
pub(crate) struct Session {
    token: String,
}

impl Session {
    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    #[cfg(test)]
    pub(crate) fn for_testing(token: &str) -> Self {
        Self {
            token: token.to_string(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Tokens stay out of logs.
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self, context: &'static str) -> Result<T, ApiError> {
        if self.code != 0 {
            return Err(ApiError::Api {
                code: self.code,
                msg: self.msg,
            });
        }
        self.data.ok_or(ApiError::MissingData { context })
    }

    fn into_ack(self) -> Result<(), ApiError> {
        if self.code != 0 {
            return Err(ApiError::Api {
                code: self.code,
                msg: self.msg,
            });
        }
        Ok(())
    }
}

pub(crate) struct QuestApi {
    client: Client,
    base_url: Url,
}

impl QuestApi {
    /// Builds a client for one account, routed through its assigned proxy
    /// when one is configured.
    pub(crate) fn new(base_url: Url, proxy: Option<&Url>) -> Result<Self, ApiError> {
        let mut builder = Client::builder().timeout(REQUEST_TIMEOUT);
        if let Some(proxy_url) = proxy {
            builder = builder.proxy(Proxy::all(proxy_url.as_str())?);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
        })
    }

    pub(crate) async fn login(&self, identity: &Identity) -> Result<Session, ApiError> {
        let sign_time = Utc::now().timestamp_millis();
        let message = format!("{LOGIN_CHALLENGE_PREFIX}:{sign_time}");

        let body = json!({
            "address": identity.address(),
            "signature": identity.sign_hex(message.as_bytes()),
            "signTime": sign_time,
        });

        let response = self
            .client
            .post(self.endpoint("/login"))
            .json(&body)
            .send()
            .await?;
        let envelope: Envelope<LoginData> = Self::check_status(response).await?;
        let data = envelope.into_data("login")?;

        Ok(Session { token: data.token })
    }

    pub(crate) async fn get_user(&self, session: &Session) -> Result<UserProfile, ApiError> {
        let response = self
            .client
            .get(self.endpoint("/user"))
            .header("token", session.token())
            .send()
            .await?;
        let envelope: Envelope<UserProfile> = Self::check_status(response).await?;
        envelope.into_data("user profile")
    }

    pub(crate) async fn task_detail(
        &self,
        session: &Session,
        endpoint: &TaskEndpoint,
    ) -> Result<Task, ApiError> {
        let body = json!({
            "taskId": endpoint.id,
            "type": endpoint.task_type,
        });
        let envelope: Envelope<Task> = self.post("/taskDetail", session, &body).await?;
        envelope.into_data("task detail")
    }

    pub(crate) async fn add_step(
        &self,
        session: &Session,
        task_id: u64,
        step_id: u32,
    ) -> Result<(), ApiError> {
        let body = json!({
            "taskId": task_id,
            "stepId": step_id,
        });
        let envelope: Envelope<serde_json::Value> = self.post("/addStep", session, &body).await?;
        envelope.into_ack()
    }

    pub(crate) async fn faucet(
        &self,
        session: &Session,
        chain: &str,
        grant: &str,
    ) -> Result<(), ApiError> {
        let body = json!({
            "chain": chain,
            "type": grant,
        });
        let envelope: Envelope<serde_json::Value> = self.post("/faucet", session, &body).await?;
        envelope.into_ack()
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        session: &Session,
        body: &serde_json::Value,
    ) -> Result<Envelope<T>, ApiError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .header("token", session.token())
            .json(body)
            .send()
            .await?;
        Self::check_status(response).await
    }

    async fn check_status<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::Http { status, body });
        }

        Ok(response.json().await?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }
}
