//! Fault reporter configuration and its CLI/env surface.

use std::collections::BTreeSet;

use clap::{ArgAction, Args};
use thiserror::Error;

use crate::fault_report_telegram::TELEGRAM_DEFAULT_API_BASE;

pub const DEFAULT_ERROR_REPORT_FILENAME: &str = "error_report.txt";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Error, PartialEq, Eq)]
/// Enumerates supported `FaultReportError` values.
pub enum FaultReportError {
    #[error("a fault hook is already registered on this dispatcher")]
    AlreadyRegistered,
    #[error("invalid fault report config: {0}")]
    InvalidConfig(String),
}

#[derive(Clone, PartialEq, Eq)]
/// Public struct `FaultReportConfig` used across Tau components.
pub struct FaultReportConfig {
    pub notify_user_on_error: bool,
    pub operator_ids: BTreeSet<i64>,
    pub report_bot_token: Option<String>,
    pub report_filename: String,
    pub telegram_api_base: String,
    pub request_timeout_ms: u64,
}

impl std::fmt::Debug for FaultReportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultReportConfig")
            .field("notify_user_on_error", &self.notify_user_on_error)
            .field("operator_ids", &self.operator_ids)
            .field(
                "report_bot_token",
                &self.report_bot_token.as_ref().map(|_| "<redacted>"),
            )
            .field("report_filename", &self.report_filename)
            .field("telegram_api_base", &self.telegram_api_base)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

impl Default for FaultReportConfig {
    fn default() -> Self {
        Self {
            notify_user_on_error: true,
            operator_ids: BTreeSet::new(),
            report_bot_token: None,
            report_filename: DEFAULT_ERROR_REPORT_FILENAME.to_string(),
            telegram_api_base: TELEGRAM_DEFAULT_API_BASE.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl FaultReportConfig {
    pub fn validate(&self) -> Result<(), FaultReportError> {
        if self.report_filename.trim().is_empty() {
            return Err(FaultReportError::InvalidConfig(
                "report filename cannot be empty".to_string(),
            ));
        }
        if self.report_filename.contains(['/', '\\']) {
            return Err(FaultReportError::InvalidConfig(format!(
                "report filename '{}' must not contain path separators",
                self.report_filename
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(FaultReportError::InvalidConfig(
                "request timeout must be greater than 0".to_string(),
            ));
        }
        if self.telegram_api_base.trim().is_empty() {
            return Err(FaultReportError::InvalidConfig(
                "telegram api base cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
/// CLI/env flags that build a [`FaultReportConfig`].
pub struct FaultReportArgs {
    #[arg(
        long = "fault-report-notify-user",
        env = "TAU_FAULT_REPORT_NOTIFY_USER",
        default_value_t = true,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        help = "Send the originating chat a short apology when an event handler fails"
    )]
    pub notify_user_on_error: bool,

    #[arg(
        long = "fault-report-operator-id",
        env = "TAU_FAULT_REPORT_OPERATOR_IDS",
        value_delimiter = ',',
        help = "Operator chat ids that receive diagnostic report files"
    )]
    pub operator_ids: Vec<i64>,

    #[arg(
        long = "fault-report-bot-token",
        env = "TAU_FAULT_REPORT_BOT_TOKEN",
        hide_env_values = true,
        help = "Optional token of a dedicated reporting bot; the primary bot is used when unset or invalid"
    )]
    pub report_bot_token: Option<String>,

    #[arg(
        long = "fault-report-filename",
        env = "TAU_FAULT_REPORT_FILENAME",
        default_value = DEFAULT_ERROR_REPORT_FILENAME,
        help = "File name of the diagnostic attachment"
    )]
    pub report_filename: String,

    #[arg(
        long = "fault-report-telegram-api-base",
        env = "TAU_FAULT_REPORT_TELEGRAM_API_BASE",
        default_value = TELEGRAM_DEFAULT_API_BASE,
        help = "Base URL of the Telegram Bot API used by the reporting bot"
    )]
    pub telegram_api_base: String,

    #[arg(
        long = "fault-report-timeout-ms",
        env = "TAU_FAULT_REPORT_TIMEOUT_MS",
        default_value_t = DEFAULT_REQUEST_TIMEOUT_MS,
        help = "HTTP timeout for reporting bot requests"
    )]
    pub request_timeout_ms: u64,
}

impl TryFrom<FaultReportArgs> for FaultReportConfig {
    type Error = FaultReportError;

    fn try_from(args: FaultReportArgs) -> Result<Self, Self::Error> {
        let config = Self {
            notify_user_on_error: args.notify_user_on_error,
            operator_ids: args.operator_ids.into_iter().collect(),
            report_bot_token: args
                .report_bot_token
                .map(|token| token.trim().to_string())
                .filter(|token| !token.is_empty()),
            report_filename: args.report_filename.trim().to_string(),
            telegram_api_base: args.telegram_api_base.trim().to_string(),
            request_timeout_ms: args.request_timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }
}
