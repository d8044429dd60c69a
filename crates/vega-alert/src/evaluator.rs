use crate::error::{AlertError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use vega_ai::{RuleCondition, TextGenerator};
use vega_common::types::{AlertRule, MetricValues};

/// Outcome for one rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verdict {
    pub triggered: bool,
    /// Explanation supplied by the evaluator, if any.
    pub message: Option<String>,
}

/// Decides which rules are breached by the current values.
///
/// Implementations return exactly one verdict per input rule, in input
/// order. A rule whose metric is missing from `values` is never triggered.
#[async_trait]
pub trait Evaluator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn evaluate(&self, rules: &[AlertRule], values: &MetricValues) -> Result<Vec<Verdict>>;
}

/// Plain threshold comparison. Never leaves the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalComparator;

impl LocalComparator {
    pub fn verdicts(rules: &[AlertRule], values: &MetricValues) -> Vec<Verdict> {
        rules
            .iter()
            .map(|rule| Verdict {
                triggered: values
                    .get(&rule.metric)
                    .is_some_and(|&value| rule.condition.holds(value, rule.threshold)),
                message: None,
            })
            .collect()
    }
}

#[async_trait]
impl Evaluator for LocalComparator {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn evaluate(&self, rules: &[AlertRule], values: &MetricValues) -> Result<Vec<Verdict>> {
        Ok(Self::verdicts(rules, values))
    }
}

/// Delegates the verdict to a text generator.
pub struct RemoteEvaluator {
    generator: Arc<dyn TextGenerator>,
}

impl RemoteEvaluator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Evaluator for RemoteEvaluator {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn evaluate(&self, rules: &[AlertRule], values: &MetricValues) -> Result<Vec<Verdict>> {
        let conditions: Vec<RuleCondition> = rules
            .iter()
            .map(|rule| RuleCondition {
                name: rule.name.clone(),
                metric: rule.metric.clone(),
                condition: rule.condition,
                threshold: rule.threshold,
            })
            .collect();

        tracing::debug!(
            provider = self.generator.provider(),
            model = self.generator.model_name(),
            rules = conditions.len(),
            "Requesting remote rule evaluation"
        );

        let replies = self
            .generator
            .evaluate_conditions(&conditions, values)
            .await
            .map_err(AlertError::Evaluator)?;

        let mut verdicts = vec![Verdict::default(); rules.len()];
        for reply in replies {
            let Some(rule) = rules.get(reply.rule_index) else {
                continue;
            };
            // The model cannot trigger on a metric that has no value.
            if !values.contains_key(&rule.metric) {
                continue;
            }
            verdicts[reply.rule_index] = Verdict {
                triggered: reply.triggered,
                message: Some(reply.message).filter(|m| !m.trim().is_empty()),
            };
        }
        Ok(verdicts)
    }
}
