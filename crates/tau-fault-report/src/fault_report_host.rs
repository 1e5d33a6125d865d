//! Minimal event host: one task per inbound event plus a global fault hook.
//!
//! Each event runs inside its own [`ProcessingContext`] scope. A handler that
//! returns an error or panics is turned into a [`HostFault`] and passed to the
//! registered [`FaultHook`] within the same scope, so suppression recorded by
//! the handler is visible to the hook. Faults never stop the host loop.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, Stream, StreamExt};
use tokio::task::{JoinHandle, JoinSet};

use crate::fault_report_config::FaultReportError;
use crate::fault_report_context::{scope_processing_context, ProcessingContext};
use crate::fault_report_event::BotEvent;
use crate::fault_report_format::{panic_message, panic_trace, FaultRecord, PANIC_FAULT_KIND};
use crate::fault_report_transport::BotApi;

/// Unhandled failure of one event handler.
pub enum HostFault {
    Error(anyhow::Error),
    Panic { message: String, trace: String },
}

impl std::fmt::Debug for HostFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(error) => f.debug_tuple("Error").field(&format!("{error:#}")).finish(),
            Self::Panic { message, .. } => f.debug_struct("Panic").field("message", message).finish(),
        }
    }
}

impl HostFault {
    /// Converts a `catch_unwind` payload while the unwinding task is still current.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = panic_message(&*payload);
        let trace = panic_trace(&message);
        Self::Panic { message, trace }
    }

    pub fn to_record(&self, event: &BotEvent) -> FaultRecord {
        match self {
            Self::Error(error) => FaultRecord::from_anyhow(error, event),
            Self::Panic { message, trace } => {
                FaultRecord::new(PANIC_FAULT_KIND, message.clone(), trace.clone(), event)
            }
        }
    }
}

#[async_trait]
/// Global fault hook. Returning `true` marks the fault as handled.
pub trait FaultHook: Send + Sync {
    async fn on_fault(&self, fault: &HostFault, event: &BotEvent, client: &Arc<dyn BotApi>)
        -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates supported `EventOutcome` values.
pub enum EventOutcome {
    Completed,
    FaultHandled,
    FaultUnhandled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Outcome counts of one [`EventDispatcher::run`] pass.
pub struct EventRunSummary {
    pub completed: usize,
    pub fault_handled: usize,
    pub fault_unhandled: usize,
    /// Largest number of event tasks alive at once.
    pub peak_in_flight: usize,
}

impl EventRunSummary {
    fn record(&mut self, outcome: EventOutcome) {
        match outcome {
            EventOutcome::Completed => self.completed = self.completed.saturating_add(1),
            EventOutcome::FaultHandled => {
                self.fault_handled = self.fault_handled.saturating_add(1)
            }
            EventOutcome::FaultUnhandled => {
                self.fault_unhandled = self.fault_unhandled.saturating_add(1)
            }
        }
    }

    pub fn total(&self) -> usize {
        self.completed
            .saturating_add(self.fault_handled)
            .saturating_add(self.fault_unhandled)
    }
}

type EventHandlerFn =
    dyn Fn(BotEvent, Arc<dyn BotApi>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

struct EventDispatcherInner {
    client: Arc<dyn BotApi>,
    handler: Box<EventHandlerFn>,
    fault_hook: OnceLock<Arc<dyn FaultHook>>,
}

#[derive(Clone)]
/// Public struct `EventDispatcher` used across Tau components.
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("has_fault_hook", &self.has_fault_hook())
            .finish()
    }
}

impl EventDispatcher {
    pub fn new<H, Fut>(client: Arc<dyn BotApi>, handler: H) -> Self
    where
        H: Fn(BotEvent, Arc<dyn BotApi>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            inner: Arc::new(EventDispatcherInner {
                client,
                handler: Box::new(move |event, client| handler(event, client).boxed()),
                fault_hook: OnceLock::new(),
            }),
        }
    }

    pub fn client(&self) -> &Arc<dyn BotApi> {
        &self.inner.client
    }

    /// Registers the global fault hook. Only the first registration succeeds.
    pub fn register_fault_hook(&self, hook: Arc<dyn FaultHook>) -> Result<(), FaultReportError> {
        self.inner
            .fault_hook
            .set(hook)
            .map_err(|_| FaultReportError::AlreadyRegistered)
    }

    pub fn has_fault_hook(&self) -> bool {
        self.inner.fault_hook.get().is_some()
    }

    pub fn spawn_event(&self, event: BotEvent) -> JoinHandle<EventOutcome> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.process_event(event).await })
    }

    /// Processes one event inside a fresh [`ProcessingContext`].
    pub async fn process_event(&self, event: BotEvent) -> EventOutcome {
        let context = Arc::new(ProcessingContext::new());
        scope_processing_context(context, self.run_event(event)).await
    }

    /// Drives `events` to completion, one task per event.
    ///
    /// Finished tasks are reaped while the stream is still open, so an endless
    /// update stream keeps only in-flight events in memory.
    pub async fn run<S>(&self, events: S) -> EventRunSummary
    where
        S: Stream<Item = BotEvent> + Send,
    {
        let mut events = std::pin::pin!(events);
        let mut tasks = JoinSet::new();
        let mut summary = EventRunSummary::default();
        let mut stream_open = true;
        loop {
            tokio::select! {
                next = events.next(), if stream_open => match next {
                    Some(event) => {
                        let dispatcher = self.clone();
                        tasks.spawn(async move { dispatcher.process_event(event).await });
                        summary.peak_in_flight = summary.peak_in_flight.max(tasks.len());
                    }
                    None => stream_open = false,
                },
                Some(joined) = tasks.join_next() => match joined {
                    Ok(outcome) => summary.record(outcome),
                    Err(error) => {
                        tracing::error!(error = %error, "event task terminated abnormally");
                        summary.record(EventOutcome::FaultUnhandled);
                    }
                },
                else => break,
            }
        }
        summary
    }

    async fn run_event(&self, event: BotEvent) -> EventOutcome {
        let client = Arc::clone(&self.inner.client);
        let fault = match AssertUnwindSafe((self.inner.handler)(event.clone(), Arc::clone(&client)))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => return EventOutcome::Completed,
            Ok(Err(error)) => HostFault::Error(error),
            Err(payload) => HostFault::from_panic(payload),
        };

        let Some(hook) = self.inner.fault_hook.get() else {
            tracing::error!(
                update_id = event.update_id(),
                fault = ?fault,
                "event handler failed and no fault hook is registered"
            );
            return EventOutcome::FaultUnhandled;
        };
        match AssertUnwindSafe(hook.on_fault(&fault, &event, &client))
            .catch_unwind()
            .await
        {
            Ok(true) => EventOutcome::FaultHandled,
            Ok(false) => {
                tracing::warn!(
                    update_id = event.update_id(),
                    "fault hook declined to handle event fault"
                );
                EventOutcome::FaultUnhandled
            }
            Err(_) => {
                tracing::error!(update_id = event.update_id(), "fault hook panicked");
                EventOutcome::FaultUnhandled
            }
        }
    }
}
