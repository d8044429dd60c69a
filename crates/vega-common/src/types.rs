use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Current metric values keyed by metric name, as computed upstream.
pub type MetricValues = HashMap<String, f64>;

/// Comparison applied between a metric's current value and a rule threshold.
///
/// # Examples
///
/// ```
/// use vega_common::types::Condition;
///
/// let cond: Condition = "gte".parse().unwrap();
/// assert!(cond.holds(30.0, 30.0));
/// assert!(!Condition::Lt.holds(30.0, 30.0));
/// assert_eq!(Condition::Gt.to_string(), "gt");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Gt,
    Lt,
    Eq,
    Gte,
    Lte,
}

impl Condition {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Eq => value == threshold,
            Self::Gte => value >= threshold,
            Self::Lte => value <= threshold,
        }
    }

    /// Operator symbol used in human-readable alert messages.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "=",
            Self::Gte => ">=",
            Self::Lte => "<=",
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Eq => "eq",
            Self::Gte => "gte",
            Self::Lte => "lte",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gt" => Ok(Self::Gt),
            "lt" => Ok(Self::Lt),
            "eq" => Ok(Self::Eq),
            "gte" => Ok(Self::Gte),
            "lte" => Ok(Self::Lte),
            _ => Err(format!("unknown condition: {s}")),
        }
    }
}

/// Severity of a triggered alert, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A delivery mechanism a message can be fanned out to.
///
/// # Examples
///
/// ```
/// use vega_common::types::ChannelId;
///
/// let ch: ChannelId = "slack_bot".parse().unwrap();
/// assert_eq!(ch, ChannelId::SlackBot);
/// assert_eq!(serde_json::to_string(&ch).unwrap(), "\"slack_bot\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelId {
    /// Bot API `sendMessage`; success requires the `ok` flag in the reply.
    Telegram,
    /// Incoming webhook taking a plain `{text}` payload.
    SlackWebhook,
    /// Token-authenticated `chat.postMessage` with optional blocks.
    SlackBot,
    Email,
}

impl ChannelId {
    pub const ALL: [ChannelId; 4] = [
        ChannelId::Telegram,
        ChannelId::SlackWebhook,
        ChannelId::SlackBot,
        ChannelId::Email,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::SlackWebhook => "slack_webhook",
            Self::SlackBot => "slack_bot",
            Self::Email => "email",
        }
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChannelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelId::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown channel: {s}"))
    }
}

/// Which evaluator decides whether a rule is breached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluatorKind {
    /// Deterministic numeric comparison, never leaves the process.
    #[default]
    Local,
    /// Delegated to the text-generation service for fuzzy conditions.
    Semantic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    pub metric: String,
    pub condition: Condition,
    pub threshold: f64,
    #[serde(default)]
    pub channels: BTreeSet<ChannelId>,
    pub enabled: bool,
    #[serde(default)]
    pub evaluator: EvaluatorKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload accepted by the rule upsert. A missing `id` creates a new rule.
///
/// On update, absent optional fields keep the stored rule's values. On
/// insert they fall back to enabled, no channels and local evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub metric: String,
    pub condition: Condition,
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<BTreeSet<ChannelId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluator: Option<EvaluatorKind>,
}

/// One breach of one rule in one evaluation pass. Only `acknowledged` ever changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggeredAlert {
    pub id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub message: String,
    pub severity: Severity,
    pub metric: String,
    pub current_value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub acknowledged: bool,
}

/// Per-tenant delivery credentials. A channel counts as configured only when
/// every field it needs is present and non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_bot_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_webhook_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_bot_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_channel_id: Option<String>,
    /// Comma separated recipient addresses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_to: Option<String>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl NotificationConfig {
    pub fn telegram(&self) -> Option<(&str, &str)> {
        Some((present(&self.telegram_bot_token)?, present(&self.telegram_chat_id)?))
    }

    pub fn slack_webhook(&self) -> Option<&str> {
        present(&self.slack_webhook_url)
    }

    pub fn slack_bot(&self) -> Option<(&str, &str)> {
        Some((present(&self.slack_bot_token)?, present(&self.slack_channel_id)?))
    }

    pub fn email_recipients(&self) -> Vec<String> {
        present(&self.email_to)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the tenant supplied every field `channel` requires.
    ///
    /// Email additionally needs a process-level SMTP relay, which the
    /// dispatcher checks on its own.
    pub fn has_credentials_for(&self, channel: ChannelId) -> bool {
        match channel {
            ChannelId::Telegram => self.telegram().is_some(),
            ChannelId::SlackWebhook => self.slack_webhook().is_some(),
            ChannelId::SlackBot => self.slack_bot().is_some(),
            ChannelId::Email => !self.email_recipients().is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Daily,
    Weekly,
    Monthly,
}

impl ReportType {
    pub const ALL: [ReportType; 3] = [ReportType::Daily, ReportType::Weekly, ReportType::Monthly];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(format!("unknown report type: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub title: String,
    pub content: String,
    pub generated_at: DateTime<Utc>,
    pub period: String,
    pub automated: bool,
    pub schedule: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_via: Option<BTreeSet<ChannelId>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySchedule {
    pub enabled: bool,
    pub hour: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySchedule {
    pub enabled: bool,
    pub hour: u32,
    /// 0 = Sunday.
    pub day_of_week: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySchedule {
    pub enabled: bool,
    pub hour: u32,
    pub day_of_month: u32,
}

/// Per-tenant report cadence, interpreted in `timezone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    pub timezone: String,
    pub daily_report: DailySchedule,
    pub weekly_report: WeeklySchedule,
    pub monthly_report: MonthlySchedule,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            daily_report: DailySchedule {
                enabled: true,
                hour: 9,
            },
            weekly_report: WeeklySchedule {
                enabled: true,
                hour: 9,
                day_of_week: 1,
            },
            monthly_report: MonthlySchedule {
                enabled: true,
                hour: 9,
                day_of_month: 1,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySchedulePatch {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub hour: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySchedulePatch {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub hour: Option<i64>,
    #[serde(default)]
    pub day_of_week: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySchedulePatch {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub hour: Option<i64>,
    #[serde(default)]
    pub day_of_month: Option<i64>,
}

/// Partial schedule update as submitted by a tenant. Numeric fields are wide
/// signed integers so out-of-range input reaches validation instead of
/// failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfigPatch {
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub daily_report: Option<DailySchedulePatch>,
    #[serde(default)]
    pub weekly_report: Option<WeeklySchedulePatch>,
    #[serde(default)]
    pub monthly_report: Option<MonthlySchedulePatch>,
}
