//! Fault interception and operator reporting for Tau bot hosts.
//!
//! When an event handler fails, the registered [`FaultReporter`] optionally
//! apologises to the originating chat once, formats a diagnostic report and
//! fans it out as a file attachment to every configured operator. Delivery is
//! best-effort: rate limits and transport failures are logged per recipient
//! and never reach the host loop.
//!
//! ```rust,no_run
//! # async fn run() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use tau_fault_report::{
//!     install_fault_reporter, mark_user_notified, BotApi, EventDispatcher, FaultReportConfig,
//!     TelegramBotClient, TelegramBotClientConfig,
//! };
//!
//! let client: Arc<dyn BotApi> = Arc::new(TelegramBotClient::new(TelegramBotClientConfig {
//!     token: "123456:primary-token".to_string(),
//!     ..TelegramBotClientConfig::default()
//! })?);
//! let dispatcher = EventDispatcher::new(client, |event, client| async move {
//!     let _ = (event, client);
//!     mark_user_notified();
//!     anyhow::bail!("division by zero")
//! });
//! install_fault_reporter(&dispatcher, FaultReportConfig::default())?;
//! # Ok(())
//! # }
//! ```

pub mod fault_report_channel;
pub mod fault_report_config;
pub mod fault_report_context;
pub mod fault_report_dispatch;
pub mod fault_report_event;
pub mod fault_report_format;
pub mod fault_report_handler;
pub mod fault_report_host;
pub mod fault_report_identity;
pub mod fault_report_notify;
pub mod fault_report_telegram;
pub mod fault_report_transport;

#[cfg(test)]
mod test_support;

pub use fault_report_channel::*;
pub use fault_report_config::*;
pub use fault_report_context::*;
pub use fault_report_dispatch::*;
pub use fault_report_event::*;
pub use fault_report_format::*;
pub use fault_report_handler::*;
pub use fault_report_host::*;
pub use fault_report_identity::*;
pub use fault_report_notify::*;
pub use fault_report_telegram::*;
pub use fault_report_transport::*;
