//! DTOs for the task-tracking API.
//!
//! Every response is wrapped in a `{code, msg, data}` envelope (handled in
//! [`super::client`]). Step status is authoritative server-side; nothing here
//! computes status locally.

use serde::Deserialize;

/// The task kinds this bot knows how to advance. The server may add more;
/// unrecognized kinds deserialize to [`TaskKind::Other`] and are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TaskKind {
    Faucet,
    Swap,
    Exchange,
    Discord,
    Other,
}

impl TaskKind {
    pub(crate) fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "faucet" => Self::Faucet,
            "swap" => Self::Swap,
            "exchange" => Self::Exchange,
            "discord" => Self::Discord,
            _ => Self::Other,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Faucet => "faucet",
            Self::Swap => "swap",
            Self::Exchange => "exchange",
            Self::Discord => "discord",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A server-tracked multi-step reward objective.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Task {
    pub(crate) id: u64,
    #[serde(default)]
    pub(crate) title: String,
    #[serde(rename = "step", default)]
    pub(crate) steps: Vec<TaskStep>,
}

impl Task {
    /// Sort indices of the steps still pending, ascending. Reporting happens
    /// in exactly this order.
    pub(crate) fn pending_step_ids(&self) -> Vec<u32> {
        let mut pending: Vec<u32> = self
            .steps
            .iter()
            .filter(|step| step.status == StepStatus::Pending)
            .map(|step| step.sort)
            .collect();
        pending.sort_unstable();
        pending
    }

    pub(crate) fn has_pending_steps(&self) -> bool {
        self.steps
            .iter()
            .any(|step| step.status == StepStatus::Pending)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TaskStep {
    pub(crate) sort: u32,
    #[serde(default)]
    pub(crate) label: String,
    pub(crate) status: StepStatus,
}

/// Wire status: `"0"` pending, `"1"` done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub(crate) enum StepStatus {
    #[serde(rename = "0")]
    Pending,
    #[serde(rename = "1")]
    Done,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserProfile {
    #[serde(default)]
    pub(crate) status: i64,
    #[serde(default)]
    pub(crate) title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginData {
    pub(crate) token: String,
}
