//! Text generation for narrative reports and semantic rule evaluation.

pub mod models;
pub mod prompt;
pub mod providers;


use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vega_common::types::{Condition, MetricValues, ReportType};

pub use providers::openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};

/// One rule as presented to a remote evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub name: String,
    pub metric: String,
    pub condition: Condition,
    pub threshold: f64,
}

/// Remote verdict for the rule at `rule_index` of the submitted slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionVerdict {
    pub rule_index: usize,
    pub triggered: bool,
    #[serde(default)]
    pub message: String,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn provider(&self) -> &str;

    fn model_name(&self) -> &str;

    /// Narrative markdown for one report period.
    async fn generate_report(
        &self,
        report_type: ReportType,
        context: &Value,
        period: &str,
    ) -> Result<String>;

    /// Asks the model which of `rules` are breached by `values`.
    async fn evaluate_conditions(
        &self,
        rules: &[RuleCondition],
        values: &MetricValues,
    ) -> Result<Vec<ConditionVerdict>>;
}
