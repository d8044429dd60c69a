use crate::engine::classify;
use crate::{AlertError, AlertRuleEngine, RemoteEvaluator};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vega_ai::{ConditionVerdict, RuleCondition, TextGenerator};
use vega_common::tenant::TeamId;
use vega_common::types::{
    ChannelId, Condition, EvaluatorKind, MetricValues, NotificationConfig, ReportType, RuleDraft,
    Severity,
};
use vega_notify::channels::MailTransport;
use vega_notify::{DispatcherSettings, NotificationDispatcher};
use vega_storage::{keys, DocumentStore, MemoryDocumentStore};

#[derive(Default)]
struct RecordingMailer {
    subjects: Mutex<Vec<String>>,
}

#[async_trait]
impl MailTransport for RecordingMailer {
    async fn send_html(&self, _to: &[String], subject: &str, _html: &str) -> anyhow::Result<()> {
        self.subjects.lock().unwrap().push(subject.to_string());
        Ok(())
    }
}

/// Text generator that answers every rule with a fixed verdict.
struct ScriptedGenerator {
    calls: AtomicUsize,
    triggered: bool,
    fail: bool,
}

impl ScriptedGenerator {
    fn new(triggered: bool, fail: bool) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            triggered,
            fail,
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn provider(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-1"
    }

    async fn generate_report(&self, _: ReportType, _: &Value, _: &str) -> anyhow::Result<String> {
        Ok(String::new())
    }

    async fn evaluate_conditions(
        &self,
        rules: &[RuleCondition],
        _values: &MetricValues,
    ) -> anyhow::Result<Vec<ConditionVerdict>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("model unavailable");
        }
        Ok((0..rules.len())
            .map(|rule_index| ConditionVerdict {
                rule_index,
                triggered: self.triggered,
                message: "semantic breach".into(),
            })
            .collect())
    }
}

struct Harness {
    store: Arc<MemoryDocumentStore>,
    mailer: Arc<RecordingMailer>,
    engine: AlertRuleEngine,
    team: TeamId,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryDocumentStore::new());
    let mailer = Arc::new(RecordingMailer::default());
    let dispatcher = Arc::new(
        NotificationDispatcher::new(DispatcherSettings::default(), Some(mailer.clone())).unwrap(),
    );
    let engine = AlertRuleEngine::new(store.clone(), dispatcher);
    Harness {
        store,
        mailer,
        engine,
        team: TeamId::new("team-a"),
    }
}

fn draft(metric: &str, condition: Condition, threshold: f64) -> RuleDraft {
    RuleDraft {
        id: None,
        name: format!("{metric} watch"),
        metric: metric.to_string(),
        condition,
        threshold,
        channels: None,
        enabled: None,
        evaluator: None,
    }
}

fn values(pairs: &[(&str, f64)]) -> MetricValues {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn severity_boundary() {
    assert_eq!(classify(46000.0, 30000.0), Severity::Critical);
    assert_eq!(classify(45000.0, 30000.0), Severity::Warning);
    assert_eq!(classify(35000.0, 30000.0), Severity::Warning);
    assert_eq!(classify(1e9, 0.0), Severity::Warning);
    assert_eq!(classify(5.0, -2.0), Severity::Warning);
}

#[tokio::test]
async fn cpa_over_one_and_a_half_times_is_critical() {
    let h = harness();
    let rule = h.engine.save_rule(&h.team, draft("cpa", Condition::Gt, 30000.0)).unwrap();

    let alerts = h.engine.evaluate(&h.team, &values(&[("cpa", 46000.0)])).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Critical);
    assert_eq!(alerts[0].rule_id, rule.id);
    assert_eq!(alerts[0].metric, "cpa");
    assert_eq!(alerts[0].threshold, 30000.0);
    assert_eq!(alerts[0].current_value, 46000.0);
    assert!(!alerts[0].acknowledged);

    let alerts = h.engine.evaluate(&h.team, &values(&[("cpa", 35000.0)])).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Warning);
}

#[tokio::test]
async fn alert_produced_iff_condition_holds() {
    let h = harness();
    h.engine.save_rule(&h.team, draft("roas", Condition::Lt, 2.0)).unwrap();
    h.engine.save_rule(&h.team, draft("ctr", Condition::Gte, 0.05)).unwrap();
    h.engine.save_rule(&h.team, draft("cpc", Condition::Eq, 120.0)).unwrap();
    h.engine.save_rule(&h.team, draft("cpm", Condition::Lte, 900.0)).unwrap();

    let alerts = h
        .engine
        .evaluate(
            &h.team,
            &values(&[("roas", 2.0), ("ctr", 0.05), ("cpc", 120.0), ("cpm", 901.0)]),
        )
        .await
        .unwrap();
    let metrics: Vec<&str> = alerts.iter().map(|a| a.metric.as_str()).collect();
    assert_eq!(metrics, vec!["ctr", "cpc"]);
}

#[tokio::test]
async fn disabled_and_missing_metrics_never_trigger() {
    let h = harness();
    let rule = h.engine.save_rule(&h.team, draft("cpa", Condition::Gt, 1.0)).unwrap();
    h.engine.save_rule(&h.team, draft("roas", Condition::Lt, 100.0)).unwrap();
    h.engine.toggle_rule(&h.team, &rule.id, false).unwrap();

    let alerts = h.engine.evaluate(&h.team, &values(&[("cpa", 1e9)])).await.unwrap();
    assert!(alerts.is_empty());
    assert!(h.engine.list_alerts(&h.team).unwrap().is_empty());
}

#[tokio::test]
async fn no_enabled_rules_touches_nothing() {
    let h = harness();
    let mut d = draft("cpa", Condition::Gt, 1.0);
    d.enabled = Some(false);
    d.channels = Some(BTreeSet::from([ChannelId::Email]));
    h.engine.save_rule(&h.team, d).unwrap();

    let alerts = h.engine.evaluate(&h.team, &values(&[("cpa", 5.0)])).await.unwrap();
    assert!(alerts.is_empty());
    assert!(h.store.log_entries(keys::TRIGGERED_ALERTS, &h.team).unwrap().is_empty());
    assert!(h.mailer.subjects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn repeated_breaches_are_recorded_each_pass() {
    let h = harness();
    h.engine.save_rule(&h.team, draft("cpa", Condition::Gt, 1.0)).unwrap();
    for _ in 0..3 {
        h.engine.evaluate(&h.team, &values(&[("cpa", 2.0)])).await.unwrap();
    }
    assert_eq!(h.engine.list_alerts(&h.team).unwrap().len(), 3);
}

#[tokio::test]
async fn history_is_capped_at_one_hundred() {
    let h = harness();
    h.engine.save_rule(&h.team, draft("cpa", Condition::Gt, 1.0)).unwrap();
    let mut first_id = None;
    let mut last_id = None;
    for i in 0..101 {
        let alerts = h.engine.evaluate(&h.team, &values(&[("cpa", 2.0)])).await.unwrap();
        if i == 0 {
            first_id = Some(alerts[0].id.clone());
        }
        last_id = Some(alerts[0].id.clone());
    }
    let history = h.engine.list_alerts(&h.team).unwrap();
    assert_eq!(history.len(), 100);
    assert_eq!(Some(history[0].id.clone()), last_id);
    assert!(history.iter().all(|a| Some(a.id.clone()) != first_id));
}

#[tokio::test]
async fn alerts_go_to_the_rule_channels_only() {
    let h = harness();
    h.engine
        .set_notification_config(
            &h.team,
            &NotificationConfig {
                email_to: Some("ops@example.com".into()),
                ..Default::default()
            },
        )
        .unwrap();

    let mut with_email = draft("cpa", Condition::Gt, 1.0);
    with_email.channels = Some(BTreeSet::from([ChannelId::Email]));
    h.engine.save_rule(&h.team, with_email).unwrap();
    h.engine.save_rule(&h.team, draft("roas", Condition::Lt, 5.0)).unwrap();

    let alerts = h
        .engine
        .evaluate(&h.team, &values(&[("cpa", 2.0), ("roas", 1.0)]))
        .await
        .unwrap();
    assert_eq!(alerts.len(), 2);

    let subjects = h.mailer.subjects.lock().unwrap();
    assert_eq!(subjects.len(), 1);
    assert!(subjects[0].contains("cpa watch"));
}

#[tokio::test]
async fn save_rule_upserts_and_keeps_order() {
    let h = harness();
    let a = h.engine.save_rule(&h.team, draft("cpa", Condition::Gt, 1.0)).unwrap();
    let b = h.engine.save_rule(&h.team, draft("roas", Condition::Lt, 2.0)).unwrap();
    assert_eq!(a.created_at, a.updated_at);

    let mut update = draft("cpa", Condition::Gte, 9.0);
    update.id = Some(a.id.clone());
    let updated = h.engine.save_rule(&h.team, update).unwrap();
    assert_eq!(updated.created_at, a.created_at);
    assert!(updated.updated_at >= a.updated_at);
    assert_eq!(updated.threshold, 9.0);

    let rules = h.engine.list_rules(&h.team).unwrap();
    assert_eq!(rules.iter().map(|r| &r.id).collect::<Vec<_>>(), vec![&a.id, &b.id]);
}

#[test]
fn partial_update_keeps_unsent_fields() {
    let h = harness();
    let mut d = draft("cpa", Condition::Gt, 1.0);
    d.enabled = Some(false);
    d.channels = Some(BTreeSet::from([ChannelId::SlackWebhook]));
    d.evaluator = Some(EvaluatorKind::Semantic);
    let rule = h.engine.save_rule(&h.team, d).unwrap();

    let update: RuleDraft = serde_json::from_value(json!({
        "id": rule.id,
        "name": "CPA ceiling",
        "metric": "cpa",
        "condition": "gt",
        "threshold": 5.0
    }))
    .unwrap();
    let updated = h.engine.save_rule(&h.team, update).unwrap();

    assert_eq!(updated.name, "CPA ceiling");
    assert_eq!(updated.threshold, 5.0);
    assert!(!updated.enabled);
    assert_eq!(updated.channels, BTreeSet::from([ChannelId::SlackWebhook]));
    assert_eq!(updated.evaluator, EvaluatorKind::Semantic);
    assert_eq!(h.engine.list_rules(&h.team).unwrap(), vec![updated]);
}

#[test]
fn new_rule_defaults_to_enabled_local_without_channels() {
    let h = harness();
    let rule = h.engine.save_rule(&h.team, draft("cpa", Condition::Gt, 1.0)).unwrap();
    assert!(rule.enabled);
    assert!(rule.channels.is_empty());
    assert_eq!(rule.evaluator, EvaluatorKind::Local);
}

#[tokio::test]
async fn save_rule_with_unknown_id_inserts_it() {
    let h = harness();
    let mut d = draft("cpa", Condition::Gt, 1.0);
    d.id = Some("custom-id".into());
    let rule = h.engine.save_rule(&h.team, d).unwrap();
    assert_eq!(rule.id, "custom-id");
    assert_eq!(h.engine.list_rules(&h.team).unwrap().len(), 1);
}

#[test]
fn delete_and_toggle_of_missing_rule_are_no_ops() {
    let h = harness();
    assert!(!h.engine.delete_rule(&h.team, "ghost").unwrap());
    assert!(h.engine.toggle_rule(&h.team, "ghost", true).unwrap().is_none());
    assert!(h.store.get(keys::ALERT_RULES, &h.team).unwrap().is_none());
}

#[test]
fn rules_are_tenant_scoped() {
    let h = harness();
    h.engine.save_rule(&h.team, draft("cpa", Condition::Gt, 1.0)).unwrap();
    assert!(h.engine.list_rules(&TeamId::new("team-b")).unwrap().is_empty());
}

#[tokio::test]
async fn acknowledge_flips_only_the_flag() {
    let h = harness();
    h.engine.save_rule(&h.team, draft("cpa", Condition::Gt, 1.0)).unwrap();
    let alert = h.engine.evaluate(&h.team, &values(&[("cpa", 2.0)])).await.unwrap().remove(0);

    assert!(h.engine.acknowledge(&h.team, &alert.id).unwrap());
    assert!(!h.engine.acknowledge(&h.team, "ghost").unwrap());

    let stored = h.engine.list_alerts(&h.team).unwrap().remove(0);
    assert!(stored.acknowledged);
    assert_eq!(stored.message, alert.message);
    assert_eq!(stored.timestamp, alert.timestamp);
}

#[tokio::test]
async fn local_rules_never_call_the_remote_evaluator() {
    let generator = Arc::new(ScriptedGenerator::new(true, false));
    let h = harness();
    let engine = h
        .engine
        .with_remote(Arc::new(RemoteEvaluator::new(generator.clone())));
    engine.save_rule(&h.team, draft("cpa", Condition::Gt, 1.0)).unwrap();

    engine.evaluate(&h.team, &values(&[("cpa", 2.0)])).await.unwrap();
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn semantic_rules_use_the_remote_verdict() {
    let generator = Arc::new(ScriptedGenerator::new(true, false));
    let h = harness();
    let engine = h
        .engine
        .with_remote(Arc::new(RemoteEvaluator::new(generator.clone())));

    let mut semantic = draft("roas", Condition::Lt, 2.0);
    semantic.evaluator = Some(EvaluatorKind::Semantic);
    engine.save_rule(&h.team, semantic).unwrap();

    let mut missing = draft("cpa", Condition::Gt, 1.0);
    missing.evaluator = Some(EvaluatorKind::Semantic);
    engine.save_rule(&h.team, missing).unwrap();

    // Locally roas 3.0 < 2.0 is false; the remote says breached.
    let alerts = engine.evaluate(&h.team, &values(&[("roas", 3.0)])).await.unwrap();
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].metric, "roas");
    assert_eq!(alerts[0].message, "semantic breach");
}

#[tokio::test]
async fn remote_failure_aborts_before_persisting() {
    let generator = Arc::new(ScriptedGenerator::new(true, true));
    let h = harness();
    let engine = h
        .engine
        .with_remote(Arc::new(RemoteEvaluator::new(generator)));
    engine.save_rule(&h.team, draft("cpa", Condition::Gt, 1.0)).unwrap();
    let mut semantic = draft("roas", Condition::Lt, 2.0);
    semantic.evaluator = Some(EvaluatorKind::Semantic);
    engine.save_rule(&h.team, semantic).unwrap();

    let err = engine
        .evaluate(&h.team, &values(&[("cpa", 2.0), ("roas", 1.0)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AlertError::Evaluator(_)));
    assert!(engine.list_alerts(&h.team).unwrap().is_empty());
}

#[tokio::test]
async fn semantic_rules_fall_back_to_local_without_remote() {
    let h = harness();
    let mut semantic = draft("roas", Condition::Lt, 2.0);
    semantic.evaluator = Some(EvaluatorKind::Semantic);
    h.engine.save_rule(&h.team, semantic).unwrap();

    let alerts = h.engine.evaluate(&h.team, &values(&[("roas", 1.0)])).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].message, "roas watch: roas is 1 (< 2)");
}
