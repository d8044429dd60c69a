mod common;

use axum::http::StatusCode;
use common::{
    assert_err_envelope, assert_ok_envelope, build_test_context, build_test_context_with,
    decode_data, request_json, request_no_body, send, token_for, FakeGenerator, EVALUATE_LIMIT,
};
use serde_json::json;
use vega_common::tenant::TeamId;
use vega_common::types::{AlertRule, NotificationConfig, Report, ScheduleConfig, TriggeredAlert};
use vega_storage::{keys, DocumentStoreExt};

#[tokio::test]
async fn health_is_public_and_echoes_trace_id() {
    let ctx = build_test_context().expect("test context should build");
    let (status, body, headers) = send(&ctx.app, "GET", "/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    assert!(body["data"]["version"].is_string());
    assert_eq!(body["data"]["reportGenerator"], true);
    let trace = headers
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .expect("trace header");
    assert_eq!(trace.len(), 16);
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let ctx = build_test_context().expect("test context should build");

    let (status, body) = request_no_body(&ctx.app, "GET", "/v1/alert-rules", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_err_envelope(&body, 1002);

    let (status, body) =
        request_no_body(&ctx.app, "GET", "/v1/alert-rules", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_err_envelope(&body, 1002);
}

#[tokio::test]
async fn rule_crud_round_trip() {
    let ctx = build_test_context().expect("test context should build");
    let token = token_for("alice");

    let (status, body) = request_json(
        &ctx.app,
        "POST",
        "/v1/alert-rules",
        Some(&token),
        json!({"name": "CPA ceiling", "metric": "cpa", "condition": "gt", "threshold": 30000}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    let rule: AlertRule = decode_data(&body);
    assert!(rule.enabled);
    assert_eq!(rule.created_at, rule.updated_at);

    let (status, body) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/alert-rules/{}/enabled", rule.id),
        Some(&token),
        json!({"enabled": false}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let toggled: AlertRule = decode_data(&body);
    assert!(!toggled.enabled);
    assert!(toggled.updated_at >= rule.updated_at);

    let (_, body) = request_no_body(&ctx.app, "GET", "/v1/alert-rules", Some(&token)).await;
    let rules: Vec<AlertRule> = decode_data(&body);
    assert_eq!(rules.len(), 1);

    let (status, body) = request_no_body(
        &ctx.app,
        "DELETE",
        &format!("/v1/alert-rules/{}", rule.id),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], true);

    let (_, body) = request_no_body(&ctx.app, "GET", "/v1/alert-rules", Some(&token)).await;
    let rules: Vec<AlertRule> = decode_data(&body);
    assert!(rules.is_empty());
}

#[tokio::test]
async fn missing_rules_are_no_ops() {
    let ctx = build_test_context().expect("test context should build");
    let token = token_for("alice");

    let (status, body) =
        request_no_body(&ctx.app, "DELETE", "/v1/alert-rules/ghost", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], false);

    let (status, body) = request_json(
        &ctx.app,
        "PUT",
        "/v1/alert-rules/ghost/enabled",
        Some(&token),
        json!({"enabled": true}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn blank_rule_name_is_rejected() {
    let ctx = build_test_context().expect("test context should build");
    let token = token_for("alice");
    let (status, body) = request_json(
        &ctx.app,
        "POST",
        "/v1/alert-rules",
        Some(&token),
        json!({"name": "  ", "metric": "cpa", "condition": "gt", "threshold": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);
}

#[tokio::test]
async fn evaluate_returns_produced_alerts_and_acknowledge_works() {
    let ctx = build_test_context().expect("test context should build");
    let token = token_for("alice");

    request_json(
        &ctx.app,
        "POST",
        "/v1/alert-rules",
        Some(&token),
        json!({"name": "CPA ceiling", "metric": "cpa", "condition": "gt", "threshold": 30000}),
    )
    .await;

    let (status, body) = request_json(
        &ctx.app,
        "POST",
        "/v1/alerts/evaluate",
        Some(&token),
        json!({"values": {"cpa": 46000}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let alerts: Vec<TriggeredAlert> = decode_data(&body);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity.to_string(), "critical");

    let (status, _) = request_no_body(
        &ctx.app,
        "POST",
        &format!("/v1/alerts/{}/acknowledge", alerts[0].id),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request_no_body(&ctx.app, "GET", "/v1/alerts", Some(&token)).await;
    let history: Vec<TriggeredAlert> = decode_data(&body);
    assert_eq!(history.len(), 1);
    assert!(history[0].acknowledged);

    let (status, body) =
        request_no_body(&ctx.app, "POST", "/v1/alerts/ghost/acknowledge", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);
}

#[tokio::test]
async fn evaluate_is_rate_limited_per_team_and_route() {
    let ctx = build_test_context().expect("test context should build");
    let alice = token_for("alice");
    let bob = token_for("bob");

    for expected_remaining in (0..EVALUATE_LIMIT).rev() {
        let (status, _, headers) = send(
            &ctx.app,
            "POST",
            "/v1/alerts/evaluate",
            Some(&alice),
            Some(json!({"values": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers["x-ratelimit-remaining"].to_str().ok(),
            Some(expected_remaining.to_string().as_str())
        );
    }

    let (status, body, headers) = send(
        &ctx.app,
        "POST",
        "/v1/alerts/evaluate",
        Some(&alice),
        Some(json!({"values": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_err_envelope(&body, 1429);
    assert!(headers.contains_key("retry-after"));

    // Other routes and other teams keep their own budgets.
    let (status, _) = request_no_body(&ctx.app, "GET", "/v1/alerts", Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/alerts/evaluate",
        Some(&bob),
        json!({"values": {}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn callers_in_one_team_share_data() {
    let ctx = build_test_context().expect("test context should build");
    ctx.state
        .store
        .set_as(keys::TEAM_ID, &TeamId::new("bob"), &"alice")
        .expect("team mapping should store");

    request_json(
        &ctx.app,
        "POST",
        "/v1/alert-rules",
        Some(&token_for("alice")),
        json!({"name": "ROAS floor", "metric": "roas", "condition": "lt", "threshold": 2}),
    )
    .await;

    let (_, body) =
        request_no_body(&ctx.app, "GET", "/v1/alert-rules", Some(&token_for("bob"))).await;
    let rules: Vec<AlertRule> = decode_data(&body);
    assert_eq!(rules.len(), 1);

    let (_, body) =
        request_no_body(&ctx.app, "GET", "/v1/alert-rules", Some(&token_for("carol"))).await;
    let rules: Vec<AlertRule> = decode_data(&body);
    assert!(rules.is_empty());
}

#[tokio::test]
async fn schedule_put_validates_then_merges() {
    let ctx = build_test_context().expect("test context should build");
    let token = token_for("alice");

    let (status, body) = request_json(
        &ctx.app,
        "PUT",
        "/v1/settings/schedule",
        Some(&token),
        json!({"timezone": "Asia/Seoul", "weeklyReport": {"dayOfWeek": 5, "hour": 7}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);

    let (status, body) = request_json(
        &ctx.app,
        "PUT",
        "/v1/settings/schedule",
        Some(&token),
        json!({"dailyReport": {"hour": 24}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);
    assert!(body["errMsg"]
        .as_str()
        .is_some_and(|m| m.contains("dailyReport.hour")));

    let (status, _) = request_json(
        &ctx.app,
        "PUT",
        "/v1/settings/schedule",
        Some(&token),
        json!({"dailyReport": {"hour": 8}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request_no_body(&ctx.app, "GET", "/v1/settings/schedule", Some(&token)).await;
    let config: ScheduleConfig = decode_data(&body);
    assert_eq!(config.timezone, "Asia/Seoul");
    assert_eq!(config.daily_report.hour, 8);
    assert_eq!(config.weekly_report.day_of_week, 5);
    assert_eq!(config.weekly_report.hour, 7);
}

#[tokio::test]
async fn unknown_timezone_is_rejected_without_writing() {
    let ctx = build_test_context().expect("test context should build");
    let token = token_for("alice");
    let (status, _) = request_json(
        &ctx.app,
        "PUT",
        "/v1/settings/schedule",
        Some(&token),
        json!({"timezone": "Mars/Olympus"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stored: Option<ScheduleConfig> = ctx
        .state
        .store
        .get_as(keys::SCHEDULE_CONFIG, &TeamId::new("alice"))
        .expect("read should succeed");
    assert!(stored.is_none());
}

#[tokio::test]
async fn notification_settings_are_redacted_on_read() {
    let ctx = build_test_context().expect("test context should build");
    let token = token_for("alice");

    let (status, body) = request_json(
        &ctx.app,
        "PUT",
        "/v1/settings/notifications",
        Some(&token),
        json!({"slackBotToken": "xoxb-123456789", "slackChannelId": "C42"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["slackBotToken"], "xoxb***");

    let (_, body) =
        request_no_body(&ctx.app, "GET", "/v1/settings/notifications", Some(&token)).await;
    assert_eq!(body["data"]["slackBotToken"], "xoxb***");
    assert_eq!(body["data"]["slackChannelId"], "C42");
}

#[tokio::test]
async fn notification_round_trip_keeps_stored_secrets() {
    let ctx = build_test_context().expect("test context should build");
    let token = token_for("alice");

    let (status, _) = request_json(
        &ctx.app,
        "PUT",
        "/v1/settings/notifications",
        Some(&token),
        json!({"slackBotToken": "xoxb-123456789", "slackChannelId": "C42"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) =
        request_no_body(&ctx.app, "GET", "/v1/settings/notifications", Some(&token)).await;
    let mut edited = body["data"].clone();
    edited["emailTo"] = json!("ops@example.com");

    let (status, body) = request_json(
        &ctx.app,
        "PUT",
        "/v1/settings/notifications",
        Some(&token),
        edited,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);

    let stored: NotificationConfig = ctx
        .state
        .store
        .get_as(keys::NOTIFICATION_CONFIG, &TeamId::new("alice"))
        .expect("read should succeed")
        .expect("config should be stored");
    assert_eq!(stored.slack_bot_token.as_deref(), Some("xoxb-123456789"));
    assert_eq!(stored.slack_channel_id.as_deref(), Some("C42"));
    assert_eq!(stored.email_to.as_deref(), Some("ops@example.com"));
}

#[tokio::test]
async fn manual_report_run_persists_an_automated_report() {
    let ctx = build_test_context().expect("test context should build");
    let token = token_for("alice");

    let (status, body) = request_json(
        &ctx.app,
        "POST",
        "/v1/reports/run",
        Some(&token),
        json!({"type": "daily"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["reportId"].is_string());
    assert_eq!(body["data"]["sentVia"], json!([]));

    let (_, body) = request_no_body(&ctx.app, "GET", "/v1/reports", Some(&token)).await;
    let reports: Vec<Report> = decode_data(&body);
    assert_eq!(reports.len(), 1);
    assert!(reports[0].automated);
    assert_eq!(reports[0].schedule, "daily");
    assert_eq!(reports[0].title, "Daily Performance Report");
}

#[tokio::test]
async fn failed_generation_returns_bad_gateway_and_stores_nothing() {
    let ctx = build_test_context_with(Some(FakeGenerator::failing()))
        .expect("test context should build");
    let token = token_for("alice");

    let (status, body) = request_json(
        &ctx.app,
        "POST",
        "/v1/reports/run",
        Some(&token),
        json!({"type": "weekly"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_err_envelope(&body, 1502);

    let (_, body) = request_no_body(&ctx.app, "GET", "/v1/reports", Some(&token)).await;
    let reports: Vec<Report> = decode_data(&body);
    assert!(reports.is_empty());
}
