//! Independent per-operator delivery of report documents.
//!
//! Every recipient gets exactly one attempt. Attempts run concurrently and a
//! rate limit or transport failure for one recipient is logged and abandoned
//! without delaying the others.

use std::collections::BTreeSet;

use futures_util::future::join_all;
use serde::Serialize;

use crate::fault_report_transport::{BotApi, BotApiError, ReportDocument};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `DeliveryStatus` values.
pub enum DeliveryStatus {
    Delivered,
    RateLimited,
    Failed,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// Outcome of one recipient's send attempt.
pub struct RecipientDelivery {
    pub chat_id: i64,
    pub status: DeliveryStatus,
    pub retry_after_secs: Option<u64>,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
/// Public struct `DispatchSummary` used across Tau components.
pub struct DispatchSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub rate_limited: usize,
    pub failed: usize,
    pub deliveries: Vec<RecipientDelivery>,
}

impl DispatchSummary {
    fn record(&mut self, delivery: RecipientDelivery) {
        self.attempted = self.attempted.saturating_add(1);
        match delivery.status {
            DeliveryStatus::Delivered => self.delivered = self.delivered.saturating_add(1),
            DeliveryStatus::RateLimited => self.rate_limited = self.rate_limited.saturating_add(1),
            DeliveryStatus::Failed => self.failed = self.failed.saturating_add(1),
        }
        self.deliveries.push(delivery);
    }
}

#[derive(Debug, Clone, Copy, Default)]
/// Public struct `DocumentDispatcher` used across Tau components.
pub struct DocumentDispatcher;

impl DocumentDispatcher {
    pub fn new() -> Self {
        Self
    }

    pub async fn dispatch(
        &self,
        client: &dyn BotApi,
        recipients: &BTreeSet<i64>,
        caption: &str,
        document: &ReportDocument,
    ) -> DispatchSummary {
        if recipients.is_empty() {
            tracing::warn!("operator roster is empty; fault report has no recipients");
            return DispatchSummary::default();
        }

        let attempts = recipients
            .iter()
            .map(|chat_id| send_to_recipient(client, *chat_id, caption, document));
        let mut summary = DispatchSummary::default();
        for delivery in join_all(attempts).await {
            summary.record(delivery);
        }
        tracing::debug!(
            attempted = summary.attempted,
            delivered = summary.delivered,
            rate_limited = summary.rate_limited,
            failed = summary.failed,
            "fault report dispatch finished"
        );
        summary
    }
}

async fn send_to_recipient(
    client: &dyn BotApi,
    chat_id: i64,
    caption: &str,
    document: &ReportDocument,
) -> RecipientDelivery {
    match client.send_document(chat_id, document, caption).await {
        Ok(()) => RecipientDelivery {
            chat_id,
            status: DeliveryStatus::Delivered,
            retry_after_secs: None,
            detail: None,
        },
        Err(BotApiError::RateLimited { retry_after_secs }) => {
            tracing::error!(
                chat_id,
                retry_after_secs,
                "rate limited while sending fault report; dropping this delivery"
            );
            RecipientDelivery {
                chat_id,
                status: DeliveryStatus::RateLimited,
                retry_after_secs: Some(retry_after_secs),
                detail: None,
            }
        }
        Err(error) => {
            tracing::error!(
                chat_id,
                error = %error,
                reason_code = error.reason_code(),
                "failed to send fault report"
            );
            RecipientDelivery {
                chat_id,
                status: DeliveryStatus::Failed,
                retry_after_secs: None,
                detail: Some(error.to_string()),
            }
        }
    }
}
