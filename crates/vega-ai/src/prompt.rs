use crate::{ConditionVerdict, RuleCondition};
use anyhow::{Context, Result};
use serde_json::Value;
use vega_common::types::{MetricValues, ReportType};

pub const REPORT_SYSTEM_PROMPT: &str =
    "You are a senior performance-marketing analyst. You write concise, data-driven business reports.";

pub const EVALUATOR_SYSTEM_PROMPT: &str =
    "You evaluate KPI alert rules against metric values and answer with JSON only.";

/// Builds the user prompt for one report.
pub fn build_report_prompt(
    report_type: ReportType,
    context: &Value,
    period: &str,
    locale: &str,
) -> Result<String> {
    let data = serde_json::to_string_pretty(context).context("Failed to serialize report context")?;
    let template = if locale == "ko" {
        REPORT_PROMPT_KO
    } else {
        REPORT_PROMPT_EN
    };
    Ok(template
        .replace("{{FOCUS}}", focus(report_type, locale))
        .replace("{{PERIOD}}", period)
        .replace("{{DATA}}", &data))
}

fn focus(report_type: ReportType, locale: &str) -> &'static str {
    match (report_type, locale == "ko") {
        (ReportType::Daily, false) => "a daily report: yesterday's key movements and anything that needs action today",
        (ReportType::Weekly, false) => "a weekly report: week-over-week trends, the best and worst performers, and priorities for next week",
        (ReportType::Monthly, false) => "a monthly report: overall performance against targets, structural trends, and strategic recommendations",
        (ReportType::Daily, true) => "일간 리포트: 전일 주요 변화와 오늘 조치가 필요한 사항",
        (ReportType::Weekly, true) => "주간 리포트: 전주 대비 추세, 상위/하위 성과 항목, 다음 주 우선순위",
        (ReportType::Monthly, true) => "월간 리포트: 목표 대비 전체 성과, 구조적 추세, 전략적 제안",
    }
}

/// Builds the prompt asking for one verdict per rule.
pub fn build_condition_prompt(rules: &[RuleCondition], values: &MetricValues) -> Result<String> {
    let indexed: Vec<Value> = rules
        .iter()
        .enumerate()
        .map(|(idx, rule)| {
            serde_json::json!({
                "ruleIndex": idx,
                "name": rule.name,
                "metric": rule.metric,
                "condition": rule.condition,
                "threshold": rule.threshold,
            })
        })
        .collect();
    let rules_json = serde_json::to_string_pretty(&indexed)?;
    let values_json = serde_json::to_string_pretty(values)?;

    Ok(CONDITION_PROMPT
        .replace("{{RULES}}", &rules_json)
        .replace("{{VALUES}}", &values_json))
}

/// Parses the model's verdict array, tolerating markdown code fences and
/// prose around the JSON.
pub fn parse_verdicts(reply: &str) -> Result<Vec<ConditionVerdict>> {
    let start = reply
        .find('[')
        .context("Evaluator reply contains no JSON array")?;
    let end = reply
        .rfind(']')
        .filter(|&end| end > start)
        .context("Evaluator reply contains an unterminated JSON array")?;
    serde_json::from_str(&reply[start..=end]).context("Failed to parse evaluator verdicts")
}

const REPORT_PROMPT_EN: &str = r#"Write {{FOCUS}} for the period {{PERIOD}}.

Data (JSON):
{{DATA}}

Format the answer as Markdown with these sections:
## Summary
## Key Metrics
## Alerts
## Recommendations

Use only figures present in the data. If a section has no data, say so in one line."#;

const REPORT_PROMPT_KO: &str = r#"{{PERIOD}} 기간의 {{FOCUS}}를 작성하세요.

데이터(JSON):
{{DATA}}

다음 섹션으로 구성된 Markdown 형식으로 답하세요:
## 요약
## 주요 지표
## 알림
## 제안

데이터에 있는 수치만 사용하세요. 데이터가 없는 섹션은 한 줄로 그 사실을 적으세요."#;

const CONDITION_PROMPT: &str = r#"Rules:
{{RULES}}

Current metric values:
{{VALUES}}

For every rule decide whether the current value of its metric satisfies the condition against the threshold. A metric missing from the values never triggers.
Answer with a JSON array only, one object per rule:
[{"ruleIndex": 0, "triggered": true, "message": "short explanation"}]"#;
