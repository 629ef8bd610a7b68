//! Configuration: CLI entry, TOML files, and the assembled runtime context.
//!
//! Non-secret settings (endpoints, intervals, program addresses, task table)
//! live in the plaintext config TOML; account secret keys and their optional
//! proxies live in a separate secrets TOML. Both are loaded once at startup
//! and assembled into an immutable [`Ctx`] shared read-only by every account.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use url::Url;

use crate::api::TaskKind;
use crate::chain::poller::PollingConfig;
use crate::chain::{CoinType, QuestCoin};

#[derive(Parser, Debug)]
pub struct Env {
    /// Path to plaintext TOML configuration file
    #[clap(long)]
    pub config: PathBuf,
    /// Path to TOML secrets file with account keys and optional proxies
    #[clap(long)]
    pub secrets: PathBuf,
}

/// Non-secret settings deserialized from the plaintext config TOML.
#[derive(Deserialize)]
struct Config {
    api_base_url: Url,
    rpc_url: Url,
    log_level: Option<LogLevel>,
    settle_interval_secs: Option<u64>,
    retry_delay_secs: Option<u64>,
    pace_delay_secs: Option<u64>,
    max_jitter_secs: Option<u64>,
    poller: Option<PollerSection>,
    programs: Option<ProgramsSection>,
    tasks: Option<Vec<TaskSection>>,
}

#[derive(Deserialize)]
struct PollerSection {
    interval_secs: Option<u64>,
    max_attempts: Option<u64>,
}

#[derive(Deserialize)]
struct ProgramsSection {
    swap_package: Option<String>,
    exchange_package: Option<String>,
    bridge_package: Option<String>,
    checkin_package: Option<String>,
    mai_coin: Option<String>,
    usdt_coin: Option<String>,
    dest_chain: Option<u64>,
    faucet_chain: Option<String>,
    gas_budget: Option<u64>,
}

#[derive(Deserialize)]
struct TaskSection {
    kind: String,
    id: u64,
    #[serde(default = "default_task_type")]
    task_type: u32,
}

fn default_task_type() -> u32 {
    1
}

/// Secret credentials deserialized from the secrets TOML.
#[derive(Deserialize)]
struct Secrets {
    accounts: Vec<String>,
    #[serde(default)]
    proxies: Vec<Url>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML")]
    Toml(#[from] toml::de::Error),
}

/// Runtime context assembled from config and secrets. Read-only shared state,
/// initialized before any account unit starts.
#[derive(Debug, Clone)]
pub struct Ctx {
    pub log_level: LogLevel,
    pub(crate) api_base_url: Url,
    pub(crate) rpc_url: Url,
    pub(crate) accounts: Vec<String>,
    pub(crate) proxies: Vec<Url>,
    /// Long pause between full task-advancement passes for one account.
    pub(crate) settle_interval: Duration,
    /// Short pause before restarting a failed pass.
    pub(crate) retry_delay: Duration,
    /// Pause between task advances within one pass.
    pub(crate) pace_delay: Duration,
    pub(crate) max_jitter: Duration,
    pub(crate) polling: PollingConfig,
    pub(crate) programs: ProgramCtx,
    pub(crate) tasks: Vec<TaskEndpoint>,
}

impl Ctx {
    pub fn load(env: &Env) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(&std::fs::read_to_string(&env.config)?)?;
        let secrets: Secrets = toml::from_str(&std::fs::read_to_string(&env.secrets)?)?;
        Ok(Self::assemble(config, secrets))
    }

    fn assemble(config: Config, secrets: Secrets) -> Self {
        let poller = config.poller.unwrap_or(PollerSection {
            interval_secs: None,
            max_attempts: None,
        });

        Self {
            log_level: config.log_level.unwrap_or(LogLevel::Info),
            api_base_url: config.api_base_url,
            rpc_url: config.rpc_url,
            accounts: secrets.accounts,
            proxies: secrets.proxies,
            settle_interval: Duration::from_secs(
                config.settle_interval_secs.unwrap_or(24 * 60 * 60),
            ),
            retry_delay: Duration::from_secs(config.retry_delay_secs.unwrap_or(5)),
            pace_delay: Duration::from_secs(config.pace_delay_secs.unwrap_or(1)),
            max_jitter: Duration::from_secs(config.max_jitter_secs.unwrap_or(5)),
            polling: PollingConfig {
                interval: Duration::from_secs(poller.interval_secs.unwrap_or(5)),
                // Unattended runs cap the wait so a dry faucet becomes a
                // restart instead of a hung account.
                max_attempts: Some(poller.max_attempts.unwrap_or(120)),
            },
            programs: ProgramCtx::from_section(config.programs),
            tasks: config
                .tasks
                .map(|sections| sections.iter().map(TaskEndpoint::from_section).collect())
                .unwrap_or_else(TaskEndpoint::default_table),
        }
    }
}

/// Fixed on-chain program addresses and coin type tags for the quest economy.
#[derive(Debug, Clone)]
pub(crate) struct ProgramCtx {
    pub(crate) swap_package: String,
    pub(crate) exchange_package: String,
    pub(crate) bridge_package: String,
    pub(crate) checkin_package: String,
    pub(crate) mai: CoinType,
    pub(crate) usdt: CoinType,
    pub(crate) dest_chain: u64,
    pub(crate) faucet_chain: String,
    pub(crate) gas_budget: u64,
}

impl ProgramCtx {
    fn from_section(section: Option<ProgramsSection>) -> Self {
        let defaults = Self::default();
        let Some(section) = section else {
            return defaults;
        };

        Self {
            swap_package: section.swap_package.unwrap_or(defaults.swap_package),
            exchange_package: section
                .exchange_package
                .unwrap_or(defaults.exchange_package),
            bridge_package: section.bridge_package.unwrap_or(defaults.bridge_package),
            checkin_package: section.checkin_package.unwrap_or(defaults.checkin_package),
            mai: section.mai_coin.map(CoinType::new).unwrap_or(defaults.mai),
            usdt: section.usdt_coin.map(CoinType::new).unwrap_or(defaults.usdt),
            dest_chain: section.dest_chain.unwrap_or(defaults.dest_chain),
            faucet_chain: section.faucet_chain.unwrap_or(defaults.faucet_chain),
            gas_budget: section.gas_budget.unwrap_or(defaults.gas_budget),
        }
    }

    pub(crate) fn coin(&self, coin: QuestCoin) -> CoinType {
        match coin {
            QuestCoin::Mgo => CoinType::native_gas(),
            QuestCoin::Mai => self.mai.clone(),
            QuestCoin::Usdt => self.usdt.clone(),
        }
    }
}

impl Default for ProgramCtx {
    fn default() -> Self {
        Self {
            swap_package: "0x7b22b4bcf4bdfbbf3cbb9c549d9bb1b9a04a2c147d01f19cff4c3b425ea25059"
                .to_string(),
            exchange_package: "0x2c8d603bc51326b8c13cef9dd07eb08ae348eb229a7b4885f2c9bd6e8113b02f"
                .to_string(),
            bridge_package: "0x91f49ec3c3eb1a19606b2f948c2c2c0289ca7b95930e10a2a0137af62d5e26e9"
                .to_string(),
            checkin_package: "0x5a37d1facab42dba9f340b267a6e848391ef5536defbcc3ec7599b16c88cd218"
                .to_string(),
            mai: CoinType::new(
                "0x97ab45f1f6a7d0dd1a6691a43ca69d60441dca0a9aabd557a0c5e32eff1b8f74::mai::MAI",
            ),
            usdt: CoinType::new(
                "0x41a7f9fecfbe479296fab22a40b35528bc0793da758928d0f9d5e1e0f5ee0b36::usdt::USDT",
            ),
            dest_chain: 97,
            faucet_chain: "mgo_testnet".to_string(),
            gas_budget: 50_000_000,
        }
    }
}

/// One row of the task table: which server-side task a kind maps to.
#[derive(Debug, Clone)]
pub(crate) struct TaskEndpoint {
    pub(crate) kind: TaskKind,
    pub(crate) id: u64,
    pub(crate) task_type: u32,
}

impl TaskEndpoint {
    fn from_section(section: &TaskSection) -> Self {
        let kind = TaskKind::parse(&section.kind);
        if kind == TaskKind::Other {
            tracing::warn!(
                kind = %section.kind,
                "unrecognized task kind in config, it will be skipped"
            );
        }
        Self {
            kind,
            id: section.id,
            task_type: section.task_type,
        }
    }

    /// Default task table, in advancement order: the faucet funds everything
    /// downstream, and swap must run before exchange before discord.
    fn default_table() -> Vec<Self> {
        [
            (TaskKind::Faucet, 1),
            (TaskKind::Swap, 2),
            (TaskKind::Exchange, 3),
            (TaskKind::Discord, 4),
        ]
        .into_iter()
        .map(|(kind, id)| Self {
            kind,
            id,
            task_type: 1,
        })
        .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<&LogLevel> for Level {
    fn from(log_level: &LogLevel) -> Self {
        match log_level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

pub fn setup_tracing(log_level: &LogLevel) {
    let level: Level = log_level.into();
    let default_filter = format!("mango_quest={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}
