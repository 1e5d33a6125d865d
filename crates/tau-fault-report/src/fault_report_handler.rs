//! Central fault handler registered as the host's global fault hook.
//!
//! Per fault the handler walks a fixed sequence: notify the user (at most once
//! per event), build the report document, resolve the bot name for the
//! caption, then fan the document out through the operator channel chosen at
//! setup. Every step logs and absorbs its own failures and the host always
//! receives "handled".

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;

use crate::fault_report_channel::{ReportChannel, ReportChannelMode};
use crate::fault_report_config::FaultReportConfig;
use crate::fault_report_context::{current_processing_context, ProcessingContext};
use crate::fault_report_dispatch::{DispatchSummary, DocumentDispatcher};
use crate::fault_report_event::BotEvent;
use crate::fault_report_format::{format_error_report, FaultRecord};
use crate::fault_report_host::{EventDispatcher, FaultHook, HostFault};
use crate::fault_report_identity::IdentityResolver;
use crate::fault_report_notify::{UserNotifier, UserNotifyOutcome};
use crate::fault_report_transport::{BotApi, ReportDocument};

/// Caption attached to every operator report document.
pub fn render_report_caption(bot_name: &str) -> String {
    format!("🚨 Bot error report\nBot: @{bot_name}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// What one pass of the fault handler did.
pub struct FaultHandlingReport {
    pub user_notice: String,
    pub bot_name: String,
    pub channel_mode: String,
    pub dispatch: DispatchSummary,
}

struct FaultReporterState {
    notifier: UserNotifier,
    identity: IdentityResolver,
    channel: ReportChannel,
    dispatcher: DocumentDispatcher,
    operator_ids: BTreeSet<i64>,
    report_filename: String,
}

#[derive(Clone)]
/// Public struct `FaultReporter` used across Tau components.
pub struct FaultReporter {
    state: Arc<FaultReporterState>,
}

impl std::fmt::Debug for FaultReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultReporter")
            .field("notify_user_on_error", &self.state.notifier.enabled())
            .field("operator_ids", &self.state.operator_ids)
            .field("channel", &self.state.channel)
            .field("report_filename", &self.state.report_filename)
            .finish()
    }
}

impl FaultReporter {
    /// Builds a reporter around an already selected operator channel.
    pub fn new(config: &FaultReportConfig, channel: ReportChannel) -> Self {
        Self {
            state: Arc::new(FaultReporterState {
                notifier: UserNotifier::new(config.notify_user_on_error),
                identity: IdentityResolver::new(),
                channel,
                dispatcher: DocumentDispatcher::new(),
                operator_ids: config.operator_ids.clone(),
                report_filename: config.report_filename.clone(),
            }),
        }
    }

    /// Validates `config` and selects the Telegram reporting channel.
    pub fn from_config(config: &FaultReportConfig) -> Result<Self> {
        config
            .validate()
            .context("failed to set up fault reporter")?;
        let channel = ReportChannel::select_telegram(
            config.report_bot_token.as_deref(),
            &config.telegram_api_base,
            config.request_timeout_ms,
        );
        Ok(Self::new(config, channel))
    }

    pub fn channel_mode(&self) -> ReportChannelMode {
        self.state.channel.mode()
    }

    /// Handles one host fault. Always reports the fault as handled.
    pub async fn handle_fault(
        &self,
        fault: &HostFault,
        event: &BotEvent,
        client: &Arc<dyn BotApi>,
    ) -> bool {
        self.report_fault(fault, event, client).await;
        true
    }

    /// Runs the full notify/format/dispatch sequence for a host fault.
    pub async fn report_fault(
        &self,
        fault: &HostFault,
        event: &BotEvent,
        client: &Arc<dyn BotApi>,
    ) -> FaultHandlingReport {
        let context = current_processing_context().unwrap_or_else(|| {
            tracing::debug!(
                update_id = event.update_id(),
                "fault reported outside an event scope; using a fresh processing context"
            );
            Arc::new(ProcessingContext::new())
        });
        let user_notice = self
            .state
            .notifier
            .notify_user(&context, client.as_ref(), event)
            .await;
        if matches!(
            user_notice,
            UserNotifyOutcome::Sent | UserNotifyOutcome::Failed
        ) {
            context.mark_notified();
        }

        let record = fault.to_record(event);
        self.report_record(&record, client, user_notice).await
    }

    /// Reports an already captured fault to the operator roster.
    pub async fn report_record(
        &self,
        record: &FaultRecord,
        client: &Arc<dyn BotApi>,
        user_notice: UserNotifyOutcome,
    ) -> FaultHandlingReport {
        let document =
            ReportDocument::from_text(&self.state.report_filename, &format_error_report(record));
        let bot_name = self
            .state
            .identity
            .resolve_bot_name(client.as_ref())
            .await;
        let caption = render_report_caption(&bot_name);
        let operator_client = self.state.channel.operator_client(client);
        let dispatch = self
            .state
            .dispatcher
            .dispatch(
                operator_client.as_ref(),
                &self.state.operator_ids,
                &caption,
                &document,
            )
            .await;
        tracing::info!(
            fault_kind = %record.kind,
            user_notice = user_notice.as_str(),
            channel = self.state.channel.mode().as_str(),
            delivered = dispatch.delivered,
            attempted = dispatch.attempted,
            "fault report processed"
        );
        FaultHandlingReport {
            user_notice: user_notice.as_str().to_string(),
            bot_name,
            channel_mode: self.state.channel.mode().as_str().to_string(),
            dispatch,
        }
    }
}

#[async_trait]
impl FaultHook for FaultReporter {
    async fn on_fault(
        &self,
        fault: &HostFault,
        event: &BotEvent,
        client: &Arc<dyn BotApi>,
    ) -> bool {
        self.handle_fault(fault, event, client).await
    }
}

/// Builds a [`FaultReporter`] from `config` and registers it on `dispatcher`.
pub fn install_fault_reporter(
    dispatcher: &EventDispatcher,
    config: FaultReportConfig,
) -> Result<FaultReporter> {
    let reporter = FaultReporter::from_config(&config)?;
    dispatcher
        .register_fault_hook(Arc::new(reporter.clone()))
        .context("failed to register fault reporter")?;
    tracing::info!(
        operators = config.operator_ids.len(),
        channel = reporter.channel_mode().as_str(),
        notify_user_on_error = config.notify_user_on_error,
        "fault reporter installed"
    );
    Ok(reporter)
}
