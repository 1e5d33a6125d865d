//! Command-line and environment surface of the relay binary.

use std::collections::BTreeSet;

use anyhow::{bail, Result};
use clap::Parser;
use tau_fault_report::{validate_telegram_bot_token, TELEGRAM_DEFAULT_API_BASE};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "tau-fault-relay",
    about = "Relays front-end error reports to bot operators as file attachments"
)]
pub struct RelayCli {
    #[arg(
        long = "relay-bind",
        env = "TAU_FAULT_RELAY_BIND",
        default_value = "127.0.0.1:8088",
        help = "Socket address the relay listens on"
    )]
    pub bind: String,

    #[arg(
        long = "relay-shared-secret",
        env = "TAU_FAULT_RELAY_SHARED_SECRET",
        hide_env_values = true,
        help = "Bearer secret every POST /log request must present"
    )]
    pub shared_secret: String,

    #[arg(
        long = "relay-report-bot-token",
        env = "TAU_FAULT_RELAY_REPORT_BOT_TOKEN",
        hide_env_values = true,
        help = "Token of the bot that delivers relay reports"
    )]
    pub report_bot_token: String,

    #[arg(
        long = "relay-operator-id",
        env = "TAU_FAULT_RELAY_OPERATOR_IDS",
        value_delimiter = ',',
        help = "Operator chat ids that receive relay reports"
    )]
    pub operator_ids: Vec<i64>,

    #[arg(
        long = "relay-telegram-api-base",
        env = "TAU_FAULT_RELAY_TELEGRAM_API_BASE",
        default_value = TELEGRAM_DEFAULT_API_BASE,
        help = "Base URL of the Telegram Bot API"
    )]
    pub telegram_api_base: String,

    #[arg(
        long = "relay-timeout-ms",
        env = "TAU_FAULT_RELAY_TIMEOUT_MS",
        default_value_t = 10_000,
        help = "HTTP timeout for Bot API requests"
    )]
    pub request_timeout_ms: u64,
}

#[derive(Clone, PartialEq, Eq)]
/// Validated relay settings.
pub struct RelayConfig {
    pub bind: String,
    pub shared_secret: String,
    pub report_bot_token: String,
    pub operator_ids: BTreeSet<i64>,
    pub telegram_api_base: String,
    pub request_timeout_ms: u64,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("bind", &self.bind)
            .field("shared_secret", &"<redacted>")
            .field("report_bot_token", &"<redacted>")
            .field("operator_ids", &self.operator_ids)
            .field("telegram_api_base", &self.telegram_api_base)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl TryFrom<RelayCli> for RelayConfig {
    type Error = anyhow::Error;

    fn try_from(cli: RelayCli) -> Result<Self> {
        let shared_secret = cli.shared_secret.trim().to_string();
        if shared_secret.is_empty() {
            bail!("--relay-shared-secret cannot be empty");
        }
        let report_bot_token = cli.report_bot_token.trim().to_string();
        validate_telegram_bot_token(&report_bot_token)?;
        if cli.request_timeout_ms == 0 {
            bail!("--relay-timeout-ms must be greater than 0");
        }
        let operator_ids = cli.operator_ids.into_iter().collect::<BTreeSet<_>>();
        if operator_ids.is_empty() {
            tracing::warn!("relay started without operators; reports will be dropped");
        }
        Ok(Self {
            bind: cli.bind.trim().to_string(),
            shared_secret,
            report_bot_token,
            operator_ids,
            telegram_api_base: cli.telegram_api_base.trim().to_string(),
            request_timeout_ms: cli.request_timeout_ms,
        })
    }
}
