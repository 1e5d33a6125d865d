//! Bot platform transport seam used by the fault reporting pipeline.
//!
//! The pipeline only needs three platform calls: identity lookup, a short
//! text message and a named document upload. Implementations classify
//! failures into [`BotApiError`] so callers can tell rate limits apart from
//! generic transport faults.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Identity of the bot account behind a [`BotApi`] client.
pub struct BotIdentity {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
}

impl BotIdentity {
    /// Returns the `@`-addressable username, if the account has one.
    pub fn handle(&self) -> Option<&str> {
        self.username
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// In-memory file attachment shared by every recipient of one report.
pub struct ReportDocument {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ReportDocument {
    pub fn from_text(file_name: &str, text: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            bytes: text.as_bytes().to_vec(),
        }
    }

    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

#[derive(Debug, Error)]
/// Enumerates supported `BotApiError` values.
pub enum BotApiError {
    #[error("rate limited by bot api, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("bot api transport error: {0}")]
    Transport(String),
    #[error("bot api rejected {method} with status {status}: {description}")]
    Rejected {
        method: &'static str,
        status: u16,
        description: String,
    },
    #[error("invalid bot api response: {0}")]
    InvalidResponse(String),
}

impl BotApiError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "delivery_rate_limited",
            Self::Transport(_) => "delivery_transport_error",
            Self::Rejected { .. } => "delivery_request_rejected",
            Self::InvalidResponse(_) => "delivery_invalid_response",
        }
    }
}

#[async_trait]
/// Platform calls required by the fault reporter.
pub trait BotApi: Send + Sync {
    async fn get_me(&self) -> Result<BotIdentity, BotApiError>;

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), BotApiError>;

    async fn send_document(
        &self,
        chat_id: i64,
        document: &ReportDocument,
        caption: &str,
    ) -> Result<(), BotApiError>;
}
