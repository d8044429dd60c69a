#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;
use vega_ai::{ConditionVerdict, RuleCondition, TextGenerator};
use vega_alert::AlertRuleEngine;
use vega_common::types::{MetricValues, ReportType};
use vega_notify::{DispatcherSettings, NotificationDispatcher};
use vega_server::app;
use vega_server::auth::create_token;
use vega_server::config::{RateLimitConfig, ServerConfig};
use vega_server::rate_limit::RateLimiter;
use vega_server::report::{AlertHistoryGatherer, ScheduledReportPipeline};
use vega_server::state::AppState;
use vega_storage::{DocumentStore, SqliteDocumentStore};

pub const TEST_SECRET: &str = "test-secret";

/// Route override used by the rate-limit tests.
pub const EVALUATE_LIMIT: u32 = 3;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
}

/// Returns canned markdown, or fails when built with `failing`.
pub struct FakeGenerator {
    fail: bool,
}

impl FakeGenerator {
    pub fn working() -> Arc<dyn TextGenerator> {
        Arc::new(Self { fail: false })
    }

    pub fn failing() -> Arc<dyn TextGenerator> {
        Arc::new(Self { fail: true })
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    fn provider(&self) -> &str {
        "fake"
    }

    fn model_name(&self) -> &str {
        "fake-1"
    }

    async fn generate_report(
        &self,
        report_type: ReportType,
        _context: &Value,
        period: &str,
    ) -> Result<String> {
        if self.fail {
            anyhow::bail!("model unavailable");
        }
        Ok(format!("## {report_type} summary for {period}\n\nNo anomalies."))
    }

    async fn evaluate_conditions(
        &self,
        _rules: &[RuleCondition],
        _values: &MetricValues,
    ) -> Result<Vec<ConditionVerdict>> {
        anyhow::bail!("not used in http tests")
    }
}

pub fn build_test_context() -> Result<TestContext> {
    build_test_context_with(Some(FakeGenerator::working()))
}

pub fn build_test_context_with(generator: Option<Arc<dyn TextGenerator>>) -> Result<TestContext> {
    vega_common::id::init(1, 1);

    let temp_dir = tempfile::tempdir()?;
    let store: Arc<dyn DocumentStore> =
        Arc::new(SqliteDocumentStore::open(&temp_dir.path().join("vega.db"))?);

    let dispatcher = Arc::new(NotificationDispatcher::new(
        DispatcherSettings {
            timeout_secs: 2,
            ..Default::default()
        },
        None,
    )?);
    let engine = Arc::new(AlertRuleEngine::new(store.clone(), dispatcher).with_locale("en"));
    let pipeline = Arc::new(ScheduledReportPipeline::new(
        store.clone(),
        engine.clone(),
        Arc::new(AlertHistoryGatherer::new(store.clone())),
        generator,
        "en",
    ));

    let config = ServerConfig {
        locale: "en".to_string(),
        rate_limit: RateLimitConfig {
            routes: HashMap::from([("/v1/alerts/evaluate".to_string(), EVALUATE_LIMIT)]),
            ..Default::default()
        },
        ..Default::default()
    };

    let state = AppState {
        store,
        engine,
        pipeline,
        limiter: Arc::new(RateLimiter::in_memory()),
        config: Arc::new(config),
        jwt_secret: Arc::new(TEST_SECRET.to_string()),
        start_time: Utc::now(),
    };

    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
    })
}

pub fn token_for(caller: &str) -> String {
    create_token(TEST_SECRET, caller, 3600).expect("token should be created")
}

pub async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value, HeaderMap) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, headers)
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let (status, json, _) = send(app, method, uri, token, Some(body)).await;
    (status, json)
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let (status, json, _) = send(app, method, uri, token, None).await;
    (status, json)
}

pub fn assert_ok_envelope(json: &Value) {
    assert_eq!(json["errCode"], 0, "unexpected envelope: {json}");
    assert_eq!(json["errMsg"], "success");
    assert!(json["traceId"].is_string());
}

pub fn assert_err_envelope(json: &Value, err_code: i32) {
    assert_eq!(json["errCode"], err_code, "unexpected envelope: {json}");
    assert!(json["errMsg"].is_string());
    assert!(json["data"].is_null());
}

pub fn decode_data<T: DeserializeOwned>(json: &Value) -> T {
    serde_json::from_value(json["data"].clone()).expect("data should decode")
}
