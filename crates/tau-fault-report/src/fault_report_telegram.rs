//! Telegram Bot API client implementing [`BotApi`].
//!
//! Requests go to `<api_base>/bot<token>/<method>`. Responses are decoded from
//! the Bot API envelope (`ok`, `result`, `error_code`, `description`,
//! `parameters.retry_after`) and HTTP 429 is surfaced as
//! [`BotApiError::RateLimited`] without sleeping or retrying.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::fault_report_transport::{BotApi, BotApiError, BotIdentity, ReportDocument};

pub const TELEGRAM_DEFAULT_API_BASE: &str = "https://api.telegram.org";
const TELEGRAM_DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const REPORT_DOCUMENT_MIME: &str = "text/plain; charset=utf-8";

#[derive(Clone)]
/// Public struct `TelegramBotClientConfig` used across Tau components.
pub struct TelegramBotClientConfig {
    pub api_base: String,
    pub token: String,
    pub request_timeout_ms: u64,
}

impl Default for TelegramBotClientConfig {
    fn default() -> Self {
        Self {
            api_base: TELEGRAM_DEFAULT_API_BASE.to_string(),
            token: String::new(),
            request_timeout_ms: TELEGRAM_DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TelegramEnvelope<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<u16>,
    description: Option<String>,
    parameters: Option<TelegramResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct TelegramResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    #[serde(default)]
    first_name: String,
    username: Option<String>,
}

#[derive(Clone)]
/// Public struct `TelegramBotClient` used across Tau components.
pub struct TelegramBotClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl std::fmt::Debug for TelegramBotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBotClient")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl TelegramBotClient {
    /// Builds a client after validating the token shape `<digits>:<secret>`.
    pub fn new(config: TelegramBotClientConfig) -> Result<Self> {
        let token = config.token.trim().to_string();
        validate_telegram_bot_token(&token)?;
        if config.request_timeout_ms == 0 {
            bail!("telegram bot client requires request timeout > 0");
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("failed to build telegram bot api http client")?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BotApiError> {
        let response = request
            .send()
            .await
            .map_err(|error| BotApiError::Transport(redact_token(&error.to_string(), &self.token)))?;
        let status = response.status();
        let header_retry_after = parse_retry_after_secs(response.headers());
        let body_raw = response
            .text()
            .await
            .map_err(|error| BotApiError::Transport(redact_token(&error.to_string(), &self.token)))?;
        decode_telegram_response(method, status, header_retry_after, &body_raw)
    }
}

#[async_trait]
impl BotApi for TelegramBotClient {
    async fn get_me(&self) -> Result<BotIdentity, BotApiError> {
        let user: TelegramUser = self
            .call("getMe", self.http.get(self.endpoint("getMe")))
            .await?;
        Ok(BotIdentity {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
        })
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), BotApiError> {
        let request = self.http.post(self.endpoint("sendMessage")).json(&json!({
            "chat_id": chat_id,
            "text": text,
        }));
        self.call::<Value>("sendMessage", request).await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        document: &ReportDocument,
        caption: &str,
    ) -> Result<(), BotApiError> {
        let part = Part::bytes(document.bytes.clone())
            .file_name(document.file_name.clone())
            .mime_str(REPORT_DOCUMENT_MIME)
            .map_err(|error| BotApiError::Transport(error.to_string()))?;
        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("document", part);
        if !caption.trim().is_empty() {
            form = form.text("caption", caption.to_string());
        }
        let request = self
            .http
            .post(self.endpoint("sendDocument"))
            .multipart(form);
        self.call::<Value>("sendDocument", request).await?;
        Ok(())
    }
}

/// Rejects tokens that cannot be a Bot API token, before any network call.
pub fn validate_telegram_bot_token(token: &str) -> Result<()> {
    if token.is_empty() {
        bail!("telegram bot token cannot be empty");
    }
    if token.chars().any(char::is_whitespace) {
        bail!("telegram bot token cannot contain whitespace");
    }
    let Some((bot_id, secret)) = token.split_once(':') else {
        bail!("telegram bot token must have the shape '<bot_id>:<secret>'");
    };
    if bot_id.is_empty() || !bot_id.chars().all(|ch| ch.is_ascii_digit()) {
        bail!("telegram bot token id segment must be numeric");
    }
    if secret.is_empty() {
        bail!("telegram bot token secret segment cannot be empty");
    }
    Ok(())
}

fn decode_telegram_response<T: DeserializeOwned>(
    method: &'static str,
    status: StatusCode,
    header_retry_after: Option<u64>,
    body_raw: &str,
) -> Result<T, BotApiError> {
    let envelope = serde_json::from_str::<TelegramEnvelope<T>>(body_raw);
    let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
        || matches!(&envelope, Ok(envelope) if envelope.error_code == Some(429));
    if rate_limited {
        let body_retry_after = envelope
            .as_ref()
            .ok()
            .and_then(|envelope| envelope.parameters.as_ref())
            .and_then(|parameters| parameters.retry_after);
        return Err(BotApiError::RateLimited {
            retry_after_secs: body_retry_after.or(header_retry_after).unwrap_or(0),
        });
    }

    let envelope = match envelope {
        Ok(envelope) => envelope,
        Err(error) if status.is_success() => {
            return Err(BotApiError::InvalidResponse(format!(
                "{method} returned undecodable body: {error}"
            )));
        }
        Err(_) => {
            return Err(BotApiError::Rejected {
                method,
                status: status.as_u16(),
                description: truncate_detail(body_raw),
            });
        }
    };
    if !status.is_success() || !envelope.ok {
        return Err(BotApiError::Rejected {
            method,
            status: envelope.error_code.unwrap_or_else(|| status.as_u16()),
            description: envelope
                .description
                .unwrap_or_else(|| "no description".to_string()),
        });
    }
    envelope
        .result
        .ok_or_else(|| BotApiError::InvalidResponse(format!("{method} response missing result")))
}

/// Reads `Retry-After` as either delta-seconds or an HTTP date.
pub fn parse_retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    let raw = headers.get("retry-after")?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(seconds);
    }

    let retry_at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let delay_secs = retry_at.signed_duration_since(Utc::now()).num_seconds();
    if delay_secs <= 0 {
        return Some(0);
    }

    u64::try_from(delay_secs).ok()
}

fn redact_token(raw: &str, token: &str) -> String {
    if token.is_empty() {
        return raw.to_string();
    }
    raw.replace(token, "<redacted>")
}

fn truncate_detail(raw: &str) -> String {
    const LIMIT: usize = 512;
    let trimmed = raw.trim();
    if trimmed.chars().count() <= LIMIT {
        return trimmed.to_string();
    }
    let mut output = trimmed.chars().take(LIMIT).collect::<String>();
    output.push_str("...");
    output
}
