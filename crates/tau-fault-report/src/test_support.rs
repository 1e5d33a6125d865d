//! Recording [`BotApi`] fake shared by unit and scenario tests.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::fault_report_transport::{BotApi, BotApiError, BotIdentity, ReportDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendOutcome {
    Delivered,
    RateLimited(u64),
    TransportFailure,
    DelayedDelivery(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentDocument {
    pub(crate) chat_id: i64,
    pub(crate) file_name: String,
    pub(crate) text: String,
    pub(crate) caption: String,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingBotApi {
    name: String,
    fail_get_me: bool,
    fail_send_message: bool,
    document_outcomes: BTreeMap<i64, SendOutcome>,
    get_me_calls: AtomicUsize,
    document_attempts: AtomicUsize,
    messages: Mutex<Vec<(i64, String)>>,
    documents: Mutex<Vec<SentDocument>>,
}

impl RecordingBotApi {
    pub(crate) fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn with_failing_get_me(mut self) -> Self {
        self.fail_get_me = true;
        self
    }

    pub(crate) fn with_failing_send_message(mut self) -> Self {
        self.fail_send_message = true;
        self
    }

    pub(crate) fn with_document_outcome(mut self, chat_id: i64, outcome: SendOutcome) -> Self {
        self.document_outcomes.insert(chat_id, outcome);
        self
    }

    pub(crate) fn get_me_calls(&self) -> usize {
        self.get_me_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn document_attempts(&self) -> usize {
        self.document_attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn messages(&self) -> Vec<(i64, String)> {
        self.messages.lock().expect("messages lock").clone()
    }

    pub(crate) fn documents(&self) -> Vec<SentDocument> {
        self.documents.lock().expect("documents lock").clone()
    }
}

#[async_trait]
impl BotApi for RecordingBotApi {
    async fn get_me(&self) -> Result<BotIdentity, BotApiError> {
        self.get_me_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get_me {
            return Err(BotApiError::Transport("getMe unavailable".to_string()));
        }
        Ok(BotIdentity {
            id: 1,
            username: Some(self.name.clone()),
            first_name: "Tau".to_string(),
        })
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), BotApiError> {
        if self.fail_send_message {
            return Err(BotApiError::Transport("sendMessage unavailable".to_string()));
        }
        self.messages
            .lock()
            .expect("messages lock")
            .push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: i64,
        document: &ReportDocument,
        caption: &str,
    ) -> Result<(), BotApiError> {
        self.document_attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .document_outcomes
            .get(&chat_id)
            .copied()
            .unwrap_or(SendOutcome::Delivered);
        match outcome {
            SendOutcome::RateLimited(retry_after_secs) => {
                return Err(BotApiError::RateLimited { retry_after_secs })
            }
            SendOutcome::TransportFailure => {
                return Err(BotApiError::Transport("connection reset".to_string()))
            }
            SendOutcome::DelayedDelivery(delay_ms) => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            SendOutcome::Delivered => {}
        }
        self.documents
            .lock()
            .expect("documents lock")
            .push(SentDocument {
                chat_id,
                file_name: document.file_name.clone(),
                text: document.text_lossy(),
                caption: caption.to_string(),
            });
        Ok(())
    }
}

/// Thread-local `tracing` capture for asserting on emitted log lines.
#[derive(Debug, Clone, Default)]
pub(crate) struct CapturedLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    pub(crate) fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_target(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().expect("log buffer lock")).into_owned()
    }

    pub(crate) fn has_line(&self, level: &str, message: &str) -> bool {
        self.contents()
            .lines()
            .any(|line| line.contains(level) && line.contains(message))
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer
            .lock()
            .expect("log buffer lock")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
