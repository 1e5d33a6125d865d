//! Cached bot display name used in operator report captions.

use std::sync::OnceLock;

use crate::fault_report_transport::BotApi;

pub const UNKNOWN_BOT_NAME: &str = "unknown_bot";

#[derive(Debug, Default)]
/// Resolves the hosting bot's name once per process.
///
/// Concurrent first calls may each query the platform; the first stored
/// value wins and is returned from then on. Failures cache
/// [`UNKNOWN_BOT_NAME`] so a broken `getMe` is not retried on every fault.
pub struct IdentityResolver {
    cached: OnceLock<String>,
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self) -> Option<&str> {
        self.cached.get().map(String::as_str)
    }

    pub async fn resolve_bot_name(&self, client: &dyn BotApi) -> String {
        if let Some(name) = self.cached.get() {
            return name.clone();
        }
        let resolved = match client.get_me().await {
            Ok(identity) => identity
                .handle()
                .map(str::to_string)
                .unwrap_or_else(|| UNKNOWN_BOT_NAME.to_string()),
            Err(error) => {
                tracing::error!(
                    error = %error,
                    reason_code = error.reason_code(),
                    "failed to resolve bot identity for fault report caption"
                );
                UNKNOWN_BOT_NAME.to_string()
            }
        };
        self.cached.get_or_init(|| resolved).clone()
    }
}
