#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::Value;
use tau_fault_report::{
    format_error_report, parse_telegram_update, FaultRecord, ERROR_REPORT_HEADER,
};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = serde_json::from_slice::<Value>(data) else {
        return;
    };
    let Ok(event) = parse_telegram_update(&raw) else {
        return;
    };
    assert!(event.repr().contains(&event.update_id().to_string()));
    if let Some(chat_id) = event.destination_chat() {
        assert!(event.repr().contains(&chat_id.to_string()));
    }

    let record = FaultRecord::new("Error", "fuzz fault", "trace\n", &event);
    let report = format_error_report(&record);
    assert!(report.starts_with(ERROR_REPORT_HEADER));
    assert!(report.contains(&format!("Update (repr): {}", event.repr())));
});
