//! Fault capture and diagnostic report rendering.

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt::Write as _;

use crate::fault_report_event::BotEvent;

pub const ERROR_REPORT_HEADER: &str = "=== ERROR REPORT ===";
pub const PANIC_FAULT_KIND: &str = "Panic";
const ANYHOW_FAULT_KIND: &str = "Error";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable snapshot of one fault and the event that triggered it.
pub struct FaultRecord {
    pub kind: String,
    pub message: String,
    pub trace: String,
    pub event_repr: String,
}

impl FaultRecord {
    pub fn new(
        kind: impl Into<String>,
        message: impl Into<String>,
        trace: impl Into<String>,
        event: &BotEvent,
    ) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            trace: trace.into(),
            event_repr: event.repr(),
        }
    }

    /// Captures a typed error; the kind is the error's short type name.
    pub fn from_error<E>(error: &E, event: &BotEvent) -> Self
    where
        E: std::error::Error + 'static,
    {
        let mut trace = render_source_chain(error);
        append_backtrace(&mut trace, &Backtrace::force_capture().to_string());
        Self::new(
            short_type_name(std::any::type_name::<E>()),
            error.to_string(),
            trace,
            event,
        )
    }

    /// Captures an `anyhow` error including its context chain and backtrace.
    pub fn from_anyhow(error: &anyhow::Error, event: &BotEvent) -> Self {
        let mut trace = render_source_chain(&**error);
        append_backtrace(&mut trace, &error.backtrace().to_string());
        Self::new(ANYHOW_FAULT_KIND, error.to_string(), trace, event)
    }

    /// Captures a `catch_unwind` payload. Call while the panicking task is current.
    pub fn from_panic(payload: &(dyn Any + Send), event: &BotEvent) -> Self {
        let message = panic_message(payload);
        let trace = panic_trace(&message);
        Self::new(PANIC_FAULT_KIND, message, trace, event)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

pub(crate) fn panic_trace(message: &str) -> String {
    let mut trace = format!("panicked: {message}\n");
    append_backtrace(&mut trace, &Backtrace::force_capture().to_string());
    trace
}

/// Renders the fixed-format text blob attached to operator reports.
pub fn format_error_report(record: &FaultRecord) -> String {
    format!(
        "{ERROR_REPORT_HEADER}\nType: {}\nMessage: {}\nUpdate (repr): {}\nTraceback:\n{}",
        record.kind, record.message, record.event_repr, record.trace
    )
}

fn render_source_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = format!("{error}\n");
    let mut source = error.source();
    let mut depth = 0usize;
    while let Some(cause) = source {
        if depth == 0 {
            rendered.push_str("\nCaused by:\n");
        }
        let _ = writeln!(rendered, "    {depth}: {cause}");
        depth = depth.saturating_add(1);
        source = cause.source();
    }
    rendered
}

fn append_backtrace(trace: &mut String, backtrace: &str) {
    let backtrace = backtrace.trim_end();
    if backtrace.is_empty()
        || backtrace == "disabled backtrace"
        || backtrace == "unsupported backtrace"
    {
        return;
    }
    trace.push_str("\nStack backtrace:\n");
    trace.push_str(backtrace);
    trace.push('\n');
}

fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

#[cfg(test)]
mod tests {
    use super::{format_error_report, short_type_name, FaultRecord};
    use crate::fault_report_event::BotEvent;

    fn sample_event() -> BotEvent {
        BotEvent::Message {
            update_id: 1,
            chat_id: 555,
            message_id: 7,
            from_user_id: Some(900),
            text: Some("/divide 1 0".to_string()),
        }
    }

    #[derive(Debug)]
    struct DivisionByZero;

    impl std::fmt::Display for DivisionByZero {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("division by zero")
        }
    }

    impl std::error::Error for DivisionByZero {}

    #[test]
    fn unit_report_follows_fixed_template() {
        let record = FaultRecord {
            kind: "ZeroDivisionError".to_string(),
            message: "division by zero".to_string(),
            trace: "frame a\nframe b\n".to_string(),
            event_repr: "Message { chat_id: 555 }".to_string(),
        };
        assert_eq!(
            format_error_report(&record),
            "=== ERROR REPORT ===\nType: ZeroDivisionError\nMessage: division by zero\nUpdate (repr): Message { chat_id: 555 }\nTraceback:\nframe a\nframe b\n"
        );
    }

    #[test]
    fn unit_report_passes_large_inputs_through_unmodified() {
        let trace = "frame\n".repeat(50_000);
        let record = FaultRecord {
            kind: "Error".to_string(),
            message: "boom".to_string(),
            trace: trace.clone(),
            event_repr: "x".repeat(100_000),
        };
        let report = format_error_report(&record);
        assert!(report.ends_with(&trace));
        assert!(report.contains(&"x".repeat(100_000)));
    }

    #[test]
    fn functional_from_error_uses_short_type_name() {
        let record = FaultRecord::from_error(&DivisionByZero, &sample_event());
        assert_eq!(record.kind, "DivisionByZero");
        assert_eq!(record.message, "division by zero");
        assert!(record.trace.starts_with("division by zero\n"));
        assert!(record.event_repr.contains("chat_id: 555"));
    }

    #[test]
    fn functional_from_anyhow_renders_context_chain() {
        let error = anyhow::Error::new(DivisionByZero).context("failed to handle /divide");
        let record = FaultRecord::from_anyhow(&error, &sample_event());
        assert_eq!(record.kind, "Error");
        assert_eq!(record.message, "failed to handle /divide");
        assert!(record.trace.contains("Caused by:"));
        assert!(record.trace.contains("0: division by zero"));
    }

    #[test]
    fn functional_from_panic_reads_str_and_string_payloads() {
        let borrowed: Box<dyn std::any::Any + Send> = Box::new("index out of bounds");
        let record = FaultRecord::from_panic(&*borrowed, &sample_event());
        assert_eq!(record.kind, "Panic");
        assert_eq!(record.message, "index out of bounds");
        assert!(record.trace.starts_with("panicked: index out of bounds\n"));

        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(FaultRecord::from_panic(&*owned, &sample_event()).message, "owned");

        let opaque: Box<dyn std::any::Any + Send> = Box::new(42_u32);
        assert_eq!(
            FaultRecord::from_panic(&*opaque, &sample_event()).message,
            "non-string panic payload"
        );
    }

    #[test]
    fn unit_short_type_name_strips_paths_and_generics() {
        assert_eq!(short_type_name("std::io::Error"), "Error");
        assert_eq!(short_type_name("my_bot::errors::Wrapper<u8>"), "Wrapper");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
