//! Operator delivery channel selection.
//!
//! A dedicated reporting bot isolates operator traffic from the user-facing
//! bot. The choice is made once during setup; a credential that cannot be
//! turned into a client is logged and the primary bot is used for the rest of
//! the process lifetime.

use std::sync::Arc;

use anyhow::Result;

use crate::fault_report_telegram::{TelegramBotClient, TelegramBotClientConfig};
use crate::fault_report_transport::BotApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `ReportChannelMode` values.
pub enum ReportChannelMode {
    Dedicated,
    Primary,
}

impl ReportChannelMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dedicated => "dedicated",
            Self::Primary => "primary",
        }
    }
}

#[derive(Clone)]
/// Public struct `ReportChannel` used across Tau components.
pub struct ReportChannel {
    dedicated: Option<Arc<dyn BotApi>>,
}

impl std::fmt::Debug for ReportChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportChannel")
            .field("mode", &self.mode().as_str())
            .finish()
    }
}

impl ReportChannel {
    pub fn primary_only() -> Self {
        Self { dedicated: None }
    }

    pub fn dedicated(client: Arc<dyn BotApi>) -> Self {
        Self {
            dedicated: Some(client),
        }
    }

    /// Builds the dedicated client when a credential is configured.
    pub fn select<F>(dedicated_token: Option<&str>, build: F) -> Self
    where
        F: FnOnce(&str) -> Result<Arc<dyn BotApi>>,
    {
        let Some(token) = dedicated_token
            .map(str::trim)
            .filter(|value| !value.is_empty())
        else {
            tracing::info!("no dedicated report bot configured; operator reports use the primary bot");
            return Self::primary_only();
        };
        match build(token) {
            Ok(client) => {
                tracing::info!("dedicated report bot initialized");
                Self::dedicated(client)
            }
            Err(error) => {
                tracing::error!(
                    error = %format!("{error:#}"),
                    "failed to initialize dedicated report bot; falling back to the primary bot"
                );
                Self::primary_only()
            }
        }
    }

    /// Selects a Telegram reporting bot against `api_base`.
    pub fn select_telegram(
        dedicated_token: Option<&str>,
        api_base: &str,
        request_timeout_ms: u64,
    ) -> Self {
        Self::select(dedicated_token, |token| {
            let client = TelegramBotClient::new(TelegramBotClientConfig {
                api_base: api_base.to_string(),
                token: token.to_string(),
                request_timeout_ms,
            })?;
            Ok(Arc::new(client) as Arc<dyn BotApi>)
        })
    }

    pub fn mode(&self) -> ReportChannelMode {
        if self.dedicated.is_some() {
            ReportChannelMode::Dedicated
        } else {
            ReportChannelMode::Primary
        }
    }

    pub fn is_dedicated(&self) -> bool {
        self.dedicated.is_some()
    }

    /// Client used for every operator-facing send.
    pub fn operator_client<'a>(&'a self, primary: &'a Arc<dyn BotApi>) -> &'a Arc<dyn BotApi> {
        self.dedicated.as_ref().unwrap_or(primary)
    }
}
