//! Relay router, bearer auth and the `/log` forwarding handler.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tau_fault_report::{
    BotApi, DocumentDispatcher, ReportDocument, TelegramBotClient, TelegramBotClientConfig,
    ERROR_REPORT_HEADER,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::relay_cli::RelayConfig;

pub const RELAY_LOG_ENDPOINT: &str = "/log";
pub const RELAY_HEALTH_ENDPOINT: &str = "/healthz";
pub const RELAY_REPORT_FILENAME: &str = "report.txt";

/// Error payload rendered as `{"error":{"type","code","message"}}`.
#[derive(Debug)]
pub struct RelayApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl RelayApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn forbidden() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "forbidden",
            "missing or invalid bearer token",
        )
    }

    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for RelayApiError {
    fn into_response(self) -> Response {
        let error_type = if self.status.is_client_error() {
            "invalid_request_error"
        } else {
            "server_error"
        };
        (
            self.status,
            Json(json!({
                "error": {
                    "type": error_type,
                    "code": self.code,
                    "message": self.message,
                }
            })),
        )
            .into_response()
    }
}

#[derive(Debug, Clone, Deserialize)]
/// Body accepted by `POST /log`.
pub struct RelayLogRequest {
    pub message: String,
    #[serde(default, alias = "botName")]
    pub bot_username: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RelayLogResponse {
    pub status: &'static str,
    pub attempted: usize,
    pub delivered: usize,
    pub rate_limited: usize,
    pub failed: usize,
}

/// Shared state behind the relay router.
pub struct RelayState {
    client: Arc<dyn BotApi>,
    operator_ids: BTreeSet<i64>,
    shared_secret: String,
    dispatcher: DocumentDispatcher,
}

impl std::fmt::Debug for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayState")
            .field("operator_ids", &self.operator_ids)
            .field("shared_secret", &"<redacted>")
            .finish()
    }
}

impl RelayState {
    pub fn new(
        client: Arc<dyn BotApi>,
        operator_ids: BTreeSet<i64>,
        shared_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            operator_ids,
            shared_secret: shared_secret.into(),
            dispatcher: DocumentDispatcher::new(),
        }
    }
}

/// Renders the relay report body.
pub fn render_relay_report(message: &str) -> String {
    format!("{ERROR_REPORT_HEADER}\n\n{message}")
}

/// Caption naming the reporting bot, or empty when no name was supplied.
pub fn render_relay_caption(bot_username: Option<&str>) -> String {
    match bot_username
        .map(|name| name.trim().trim_start_matches('@'))
        .filter(|name| !name.is_empty())
    {
        Some(name) => format!("🚨 Error detected in Mini App:\nBot: @{name}"),
        None => String::new(),
    }
}

fn bearer_token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn authorize_relay_request(state: &RelayState, headers: &HeaderMap) -> Result<(), RelayApiError> {
    match bearer_token_from_headers(headers) {
        Some(observed) if observed == state.shared_secret => Ok(()),
        _ => {
            tracing::warn!("relay request rejected: missing or invalid bearer token");
            Err(RelayApiError::forbidden())
        }
    }
}

async fn handle_relay_log(
    State(state): State<Arc<RelayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<RelayLogResponse>, RelayApiError> {
    authorize_relay_request(&state, &headers)?;
    let request = serde_json::from_slice::<RelayLogRequest>(&body).map_err(|error| {
        RelayApiError::bad_request("invalid_body", format!("invalid relay payload: {error}"))
    })?;

    let document =
        ReportDocument::from_text(RELAY_REPORT_FILENAME, &render_relay_report(&request.message));
    let caption = render_relay_caption(request.bot_username.as_deref());
    let summary = state
        .dispatcher
        .dispatch(state.client.as_ref(), &state.operator_ids, &caption, &document)
        .await;
    tracing::info!(
        attempted = summary.attempted,
        delivered = summary.delivered,
        failed = summary.failed,
        "relay report forwarded"
    );
    Ok(Json(RelayLogResponse {
        status: "ok",
        attempted: summary.attempted,
        delivered: summary.delivered,
        rate_limited: summary.rate_limited,
        failed: summary.failed,
    }))
}

async fn handle_relay_health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

pub fn build_relay_router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route(RELAY_LOG_ENDPOINT, post(handle_relay_log))
        .route(RELAY_HEALTH_ENDPOINT, get(handle_relay_health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds the relay and serves until Ctrl-C.
pub async fn run_relay_server(config: RelayConfig) -> Result<()> {
    let bind_addr = config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid --relay-bind '{}'", config.bind))?;
    let client = TelegramBotClient::new(TelegramBotClientConfig {
        api_base: config.telegram_api_base.clone(),
        token: config.report_bot_token.clone(),
        request_timeout_ms: config.request_timeout_ms,
    })
    .context("failed to initialize relay report bot")?;
    let state = Arc::new(RelayState::new(
        Arc::new(client),
        config.operator_ids.clone(),
        config.shared_secret.clone(),
    ));

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind fault relay on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound relay address")?;
    tracing::info!(
        addr = %local_addr,
        operators = config.operator_ids.len(),
        "fault relay listening"
    );
    axum::serve(listener, build_relay_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("fault relay server exited unexpectedly")
}
