use crate::error::Result;
use crate::evaluator::{Evaluator, LocalComparator, Verdict};
use chrono::Utc;
use std::sync::Arc;
use vega_common::i18n::DEFAULT_LOCALE;
use vega_common::tenant::TeamId;
use vega_common::types::{
    AlertRule, EvaluatorKind, MetricValues, NotificationConfig, RuleDraft, Severity,
    TriggeredAlert,
};
use vega_notify::render::alert_message;
use vega_notify::NotificationDispatcher;
use vega_storage::{keys, DocumentStore, DocumentStoreExt};

/// Severity is critical once the value exceeds the threshold by half.
const CRITICAL_FACTOR: f64 = 1.5;

pub fn classify(value: f64, threshold: f64) -> Severity {
    if threshold > 0.0 && value > threshold * CRITICAL_FACTOR {
        Severity::Critical
    } else {
        Severity::Warning
    }
}

pub struct AlertRuleEngine {
    store: Arc<dyn DocumentStore>,
    dispatcher: Arc<NotificationDispatcher>,
    local: LocalComparator,
    remote: Option<Arc<dyn Evaluator>>,
    locale: String,
}

impl AlertRuleEngine {
    pub fn new(store: Arc<dyn DocumentStore>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            local: LocalComparator,
            remote: None,
            locale: DEFAULT_LOCALE.to_string(),
        }
    }

    /// Evaluator used for rules marked `semantic`.
    pub fn with_remote(mut self, remote: Arc<dyn Evaluator>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }

    pub fn list_rules(&self, tenant: &TeamId) -> Result<Vec<AlertRule>> {
        Ok(self
            .store
            .get_as::<Vec<AlertRule>>(keys::ALERT_RULES, tenant)?
            .unwrap_or_default())
    }

    fn store_rules(&self, tenant: &TeamId, rules: &[AlertRule]) -> Result<()> {
        self.store.set_as(keys::ALERT_RULES, tenant, &rules)?;
        Ok(())
    }

    /// Upserts by id. An existing rule keeps its position and `created_at`,
/// and any optional field the draft leaves out.
    pub fn save_rule(&self, tenant: &TeamId, draft: RuleDraft) -> Result<AlertRule> {
        let now = Utc::now();
        let mut rules = self.list_rules(tenant)?;

        let existing = draft
            .id
            .as_deref()
            .and_then(|id| rules.iter_mut().find(|r| r.id == id));

        let saved = match existing {
            Some(rule) => {
                rule.name = draft.name;
                rule.metric = draft.metric;
                rule.condition = draft.condition;
                rule.threshold = draft.threshold;
                if let Some(channels) = draft.channels {
                    rule.channels = channels;
                }
                if let Some(enabled) = draft.enabled {
                    rule.enabled = enabled;
                }
                if let Some(evaluator) = draft.evaluator {
                    rule.evaluator = evaluator;
                }
                rule.updated_at = now;
                rule.clone()
            }
            None => {
                let rule = AlertRule {
                    id: draft.id.unwrap_or_else(vega_common::id::next_id),
                    name: draft.name,
                    metric: draft.metric,
                    condition: draft.condition,
                    threshold: draft.threshold,
                    channels: draft.channels.unwrap_or_default(),
                    enabled: draft.enabled.unwrap_or(true),
                    evaluator: draft.evaluator.unwrap_or_default(),
                    created_at: now,
                    updated_at: now,
                };
                rules.push(rule.clone());
                rule
            }
        };

        self.store_rules(tenant, &rules)?;
        tracing::info!(tenant = %tenant, rule_id = %saved.id, "Alert rule saved");
        Ok(saved)
    }

    /// Returns whether a rule was removed. Unknown ids are a no-op.
    pub fn delete_rule(&self, tenant: &TeamId, rule_id: &str) -> Result<bool> {
        let mut rules = self.list_rules(tenant)?;
        let before = rules.len();
        rules.retain(|r| r.id != rule_id);
        if rules.len() == before {
            return Ok(false);
        }
        self.store_rules(tenant, &rules)?;
        tracing::info!(tenant = %tenant, rule_id = %rule_id, "Alert rule deleted");
        Ok(true)
    }

    /// Returns the updated rule, or `None` when no rule has `rule_id`.
    pub fn toggle_rule(
        &self,
        tenant: &TeamId,
        rule_id: &str,
        enabled: bool,
    ) -> Result<Option<AlertRule>> {
        let mut rules = self.list_rules(tenant)?;
        let Some(rule) = rules.iter_mut().find(|r| r.id == rule_id) else {
            return Ok(None);
        };
        rule.enabled = enabled;
        rule.updated_at = Utc::now();
        let updated = rule.clone();
        self.store_rules(tenant, &rules)?;
        Ok(Some(updated))
    }

    pub fn notification_config(&self, tenant: &TeamId) -> Result<NotificationConfig> {
        Ok(self
            .store
            .get_as(keys::NOTIFICATION_CONFIG, tenant)?
            .unwrap_or_default())
    }

    pub fn set_notification_config(&self, tenant: &TeamId, config: &NotificationConfig) -> Result<()> {
        self.store.set_as(keys::NOTIFICATION_CONFIG, tenant, config)?;
        Ok(())
    }

    /// Triggered alerts, newest first.
    pub fn list_alerts(&self, tenant: &TeamId) -> Result<Vec<TriggeredAlert>> {
        Ok(self.store.log_entries_as(keys::TRIGGERED_ALERTS, tenant)?)
    }

    /// Marks an alert acknowledged. Returns `false` for unknown ids.
    pub fn acknowledge(&self, tenant: &TeamId, alert_id: &str) -> Result<bool> {
        let alerts = self.list_alerts(tenant)?;
        let Some(mut alert) = alerts.into_iter().find(|a| a.id == alert_id) else {
            return Ok(false);
        };
        if alert.acknowledged {
            return Ok(true);
        }
        alert.acknowledged = true;
        Ok(self
            .store
            .log_replace_as(keys::TRIGGERED_ALERTS, tenant, &alert)?)
    }

    /// Runs one evaluation pass and returns only the alerts it produced.
    ///
    /// Nothing is written and nothing is sent when no rule is enabled. A
    /// remote evaluator failure aborts the pass before any alert is stored.
    pub async fn evaluate(
        &self,
        tenant: &TeamId,
        values: &MetricValues,
    ) -> Result<Vec<TriggeredAlert>> {
        let enabled: Vec<AlertRule> = self
            .list_rules(tenant)?
            .into_iter()
            .filter(|r| r.enabled)
            .collect();
        if enabled.is_empty() {
            return Ok(Vec::new());
        }

        let verdicts = self.verdicts(&enabled, values).await?;

        let now = Utc::now();
        let mut produced = Vec::new();
        for (rule, verdict) in enabled.iter().zip(verdicts) {
            if !verdict.triggered {
                continue;
            }
            let Some(&value) = values.get(&rule.metric) else {
                continue;
            };
            let message = verdict.message.unwrap_or_else(|| {
                format!(
                    "{}: {} is {} ({} {})",
                    rule.name,
                    rule.metric,
                    value,
                    rule.condition.symbol(),
                    rule.threshold
                )
            });
            produced.push((
                rule,
                TriggeredAlert {
                    id: vega_common::id::next_id(),
                    rule_id: rule.id.clone(),
                    rule_name: rule.name.clone(),
                    message,
                    severity: classify(value, rule.threshold),
                    metric: rule.metric.clone(),
                    current_value: value,
                    threshold: rule.threshold,
                    timestamp: now,
                    acknowledged: false,
                },
            ));
        }

        if produced.is_empty() {
            return Ok(Vec::new());
        }

        let mut config: Option<NotificationConfig> = None;
        let mut alerts = Vec::with_capacity(produced.len());
        for (rule, alert) in produced {
            self.store.log_append_as(
                keys::TRIGGERED_ALERTS,
                tenant,
                &alert,
                keys::TRIGGERED_ALERTS_CAPACITY,
            )?;
            tracing::warn!(
                tenant = %tenant,
                rule_id = %alert.rule_id,
                metric = %alert.metric,
                value = alert.current_value,
                threshold = alert.threshold,
                severity = %alert.severity,
                "KPI alert triggered"
            );

            if !rule.channels.is_empty() {
                if config.is_none() {
                    config = Some(self.notification_config(tenant).unwrap_or_else(|e| {
                        tracing::warn!(tenant = %tenant, error = %e, "Failed to read notification config");
                        NotificationConfig::default()
                    }));
                }
                if let Some(config) = &config {
                    let results = self
                        .dispatcher
                        .send(config, &alert_message(&alert, &self.locale), &rule.channels)
                        .await;
                    tracing::debug!(alert_id = %alert.id, results = ?results, "Alert dispatched");
                }
            }
            alerts.push(alert);
        }
        Ok(alerts)
    }

    /// One verdict per enabled rule, in rule order.
    async fn verdicts(&self, rules: &[AlertRule], values: &MetricValues) -> Result<Vec<Verdict>> {
        let mut verdicts = self.local.evaluate(rules, values).await?;

        let semantic: Vec<usize> = rules
            .iter()
            .enumerate()
            .filter(|(_, r)| r.evaluator == EvaluatorKind::Semantic)
            .map(|(idx, _)| idx)
            .collect();
        if semantic.is_empty() {
            return Ok(verdicts);
        }

        let Some(remote) = &self.remote else {
            tracing::warn!(
                rules = semantic.len(),
                "No remote evaluator configured, comparing semantic rules locally"
            );
            return Ok(verdicts);
        };

        let subset: Vec<AlertRule> = semantic.iter().map(|&idx| rules[idx].clone()).collect();
        let remote_verdicts = remote.evaluate(&subset, values).await?;
        for (idx, verdict) in semantic.into_iter().zip(remote_verdicts) {
            verdicts[idx] = verdict;
        }
        Ok(verdicts)
    }
}
