use crate::models::{ChatMessage, ChatRequest, ChatResponse};
use crate::prompt::{
    build_condition_prompt, build_report_prompt, parse_verdicts, EVALUATOR_SYSTEM_PROMPT,
    REPORT_SYSTEM_PROMPT,
};
use crate::{ConditionVerdict, RuleCondition, TextGenerator};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use vega_common::types::{MetricValues, ReportType};

#[derive(Debug, Clone)]
pub struct OpenAiCompatConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub locale: String,
}

impl Default for OpenAiCompatConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 120,
            max_tokens: Some(2000),
            temperature: Some(0.3),
            locale: vega_common::i18n::DEFAULT_LOCALE.to_string(),
        }
    }
}

/// Any `/chat/completions` endpoint speaking the OpenAI wire format.
#[derive(Clone)]
pub struct OpenAiCompatProvider {
    config: OpenAiCompatConfig,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            anyhow::bail!("AI api_key is empty");
        }
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    async fn call_api(&self, system: &str, prompt: &str) -> Result<String> {
        let req = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        tracing::debug!(
            model = %self.config.model,
            prompt_length = prompt.len(),
            "Calling chat completions API"
        );

        let resp = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.config.api_key)
            .json(&req)
            .send()
            .await
            .context("Failed to send request to chat completions API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Chat completions request failed");
            anyhow::bail!("Chat completions API error {}: {}", status, body);
        }

        let chat_resp: ChatResponse = resp
            .json()
            .await
            .context("Failed to parse chat completions response")?;

        tracing::debug!(usage = ?chat_resp.usage, "Chat completions response received");

        chat_resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Empty response from chat completions API"))
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatProvider {
    fn provider(&self) -> &str {
        "openai_compat"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn generate_report(
        &self,
        report_type: ReportType,
        context: &Value,
        period: &str,
    ) -> Result<String> {
        let prompt = build_report_prompt(report_type, context, period, &self.config.locale)?;
        self.call_api(REPORT_SYSTEM_PROMPT, &prompt).await
    }

    async fn evaluate_conditions(
        &self,
        rules: &[RuleCondition],
        values: &MetricValues,
    ) -> Result<Vec<ConditionVerdict>> {
        let prompt = build_condition_prompt(rules, values)?;
        let reply = self.call_api(EVALUATOR_SYSTEM_PROMPT, &prompt).await?;
        let verdicts = parse_verdicts(&reply)?;
        if let Some(bad) = verdicts.iter().find(|v| v.rule_index >= rules.len()) {
            anyhow::bail!(
                "Evaluator returned verdict for unknown rule index {} ({} rules submitted)",
                bad.rule_index,
                rules.len()
            );
        }
        Ok(verdicts)
    }
}
