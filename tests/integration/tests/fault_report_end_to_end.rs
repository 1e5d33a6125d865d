use std::collections::BTreeSet;
use std::sync::Arc;

use httpmock::Method::{GET, POST};
use httpmock::{Mock, MockServer};
use serde_json::json;
use tau_fault_report::{
    install_fault_reporter, mark_user_notified, parse_telegram_update, BotApi, BotEvent,
    EventDispatcher, EventOutcome, FaultReportConfig, TelegramBotClient, TelegramBotClientConfig,
    USER_APOLOGY_TEXT,
};

const PRIMARY_TOKEN: &str = "111:primary-token";
const REPORT_TOKEN: &str = "222:report-token";

fn telegram_client(server: &MockServer, token: &str) -> Arc<dyn BotApi> {
    Arc::new(
        TelegramBotClient::new(TelegramBotClientConfig {
            api_base: server.base_url(),
            token: token.to_string(),
            request_timeout_ms: 2_000,
        })
        .expect("telegram client"),
    )
}

fn ok_message<'a>(server: &'a MockServer, token: &str, method: &str) -> Mock<'a> {
    let path = format!("/bot{token}/{method}");
    server.mock(|when, then| {
        when.method(POST).path(path);
        then.status(200)
            .json_body(json!({"ok": true, "result": {"message_id": 1}}));
    })
}

fn mock_primary_get_me(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path(format!("/bot{PRIMARY_TOKEN}/getMe"));
        then.status(200).json_body(json!({
            "ok": true,
            "result": {"id": 111, "is_bot": true, "first_name": "Tau", "username": "tau_helper_bot"}
        }));
    })
}

fn report_config(server: &MockServer, report_bot_token: Option<&str>) -> FaultReportConfig {
    FaultReportConfig {
        operator_ids: BTreeSet::from([7001, 7002]),
        report_bot_token: report_bot_token.map(str::to_string),
        telegram_api_base: server.base_url(),
        request_timeout_ms: 2_000,
        ..FaultReportConfig::default()
    }
}

fn update(update_id: i64, text: &str) -> BotEvent {
    parse_telegram_update(&json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id,
            "chat": {"id": 555, "type": "private"},
            "from": {"id": 900, "is_bot": false, "first_name": "Ada"},
            "text": text
        }
    }))
    .expect("parse update")
}

fn dispatcher_for(server: &MockServer) -> EventDispatcher {
    EventDispatcher::new(
        telegram_client(server, PRIMARY_TOKEN),
        |event, _client| async move {
            let BotEvent::Message { text, .. } = &event else {
                return Ok(());
            };
            match text.as_deref() {
                Some("/divide") => anyhow::bail!("division by zero"),
                Some("/quiet") => {
                    mark_user_notified();
                    anyhow::bail!("handled in place")
                }
                _ => Ok(()),
            }
        },
    )
}

#[tokio::test]
async fn integration_failed_event_apologises_and_reports_through_dedicated_bot() {
    let server = MockServer::start();
    let get_me = mock_primary_get_me(&server);
    let apology = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/bot{PRIMARY_TOKEN}/sendMessage"))
            .json_body(json!({"chat_id": 555, "text": USER_APOLOGY_TEXT}));
        then.status(200)
            .json_body(json!({"ok": true, "result": {"message_id": 2}}));
    });
    let dedicated_documents = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/bot{REPORT_TOKEN}/sendDocument"))
            .body_includes("filename=\"error_report.txt\"")
            .body_includes("=== ERROR REPORT ===")
            .body_includes("Message: division by zero")
            .body_includes("Bot: @tau_helper_bot");
        then.status(200)
            .json_body(json!({"ok": true, "result": {"message_id": 3}}));
    });
    let primary_documents = ok_message(&server, PRIMARY_TOKEN, "sendDocument");

    let dispatcher = dispatcher_for(&server);
    let reporter = install_fault_reporter(&dispatcher, report_config(&server, Some(REPORT_TOKEN)))
        .expect("install reporter");
    assert_eq!(reporter.channel_mode().as_str(), "dedicated");

    let summary = dispatcher
        .run(futures_util::stream::iter(vec![
            update(1, "/divide"),
            update(2, "/start"),
        ]))
        .await;

    assert_eq!(summary.fault_handled, 1);
    assert_eq!(summary.completed, 1);
    apology.assert_calls(1);
    dedicated_documents.assert_calls(2);
    primary_documents.assert_calls(0);
    get_me.assert_calls(1);
}

#[tokio::test]
async fn integration_suppressed_event_skips_apology_and_uses_primary_fallback() {
    let server = MockServer::start();
    mock_primary_get_me(&server);
    let apology = ok_message(&server, PRIMARY_TOKEN, "sendMessage");
    let primary_documents = ok_message(&server, PRIMARY_TOKEN, "sendDocument");

    let dispatcher = dispatcher_for(&server);
    let reporter = install_fault_reporter(&dispatcher, report_config(&server, Some("malformed")))
        .expect("install reporter");
    assert_eq!(reporter.channel_mode().as_str(), "primary");

    let outcome = dispatcher.process_event(update(3, "/quiet")).await;

    assert_eq!(outcome, EventOutcome::FaultHandled);
    apology.assert_calls(0);
    primary_documents.assert_calls(2);
}

#[tokio::test]
async fn integration_rate_limited_operator_does_not_stop_the_other() {
    let server = MockServer::start();
    mock_primary_get_me(&server);
    ok_message(&server, PRIMARY_TOKEN, "sendMessage");
    let limited = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/bot{PRIMARY_TOKEN}/sendDocument"))
            .body_includes("name=\"chat_id\"\r\n\r\n7001\r\n");
        then.status(429)
            .header("retry-after", "30")
            .json_body(json!({"ok": false, "error_code": 429, "description": "Too Many Requests"}));
    });
    let delivered = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/bot{PRIMARY_TOKEN}/sendDocument"))
            .body_includes("name=\"chat_id\"\r\n\r\n7002\r\n");
        then.status(200)
            .json_body(json!({"ok": true, "result": {"message_id": 4}}));
    });

    let dispatcher = dispatcher_for(&server);
    install_fault_reporter(&dispatcher, report_config(&server, None)).expect("install reporter");
    let outcome = dispatcher.process_event(update(4, "/divide")).await;

    assert_eq!(outcome, EventOutcome::FaultHandled);
    limited.assert_calls(1);
    delivered.assert_calls(1);
}

#[tokio::test]
async fn regression_second_install_is_rejected() {
    let server = MockServer::start();
    let dispatcher = dispatcher_for(&server);
    install_fault_reporter(&dispatcher, report_config(&server, None)).expect("first install");
    let error = install_fault_reporter(&dispatcher, report_config(&server, None))
        .expect_err("second install");
    assert!(format!("{error:#}").contains("already registered"));
}
