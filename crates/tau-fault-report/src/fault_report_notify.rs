//! Best-effort apology to the chat that triggered a failing event.

use crate::fault_report_context::ProcessingContext;
use crate::fault_report_event::BotEvent;
use crate::fault_report_transport::BotApi;

pub const USER_APOLOGY_TEXT: &str = "❌ An error occurred. The administrators have been notified.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `UserNotifyOutcome` values.
pub enum UserNotifyOutcome {
    Disabled,
    AlreadyNotified,
    NoDestination,
    Sent,
    Failed,
}

impl UserNotifyOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::AlreadyNotified => "already_notified",
            Self::NoDestination => "no_destination",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy)]
/// Public struct `UserNotifier` used across Tau components.
pub struct UserNotifier {
    enabled: bool,
}

impl UserNotifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Sends [`USER_APOLOGY_TEXT`] unless disabled, suppressed or undeliverable.
    ///
    /// Never sets the context flag and never propagates send failures.
    pub async fn notify_user(
        &self,
        context: &ProcessingContext,
        client: &dyn BotApi,
        event: &BotEvent,
    ) -> UserNotifyOutcome {
        if !self.enabled {
            return UserNotifyOutcome::Disabled;
        }
        if context.is_notified() {
            return UserNotifyOutcome::AlreadyNotified;
        }
        let Some(chat_id) = event.destination_chat() else {
            tracing::debug!(
                update_id = event.update_id(),
                event_kind = event.kind(),
                "fault event has no chat to notify"
            );
            return UserNotifyOutcome::NoDestination;
        };
        match client.send_message(chat_id, USER_APOLOGY_TEXT).await {
            Ok(()) => UserNotifyOutcome::Sent,
            Err(error) => {
                tracing::error!(
                    chat_id,
                    error = %error,
                    reason_code = error.reason_code(),
                    "failed to notify user about fault"
                );
                UserNotifyOutcome::Failed
            }
        }
    }
}
