use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use vega_common::tenant::TeamId;
use vega_common::types::{AlertRule, ReportType, Severity, TriggeredAlert};
use vega_storage::{keys, DocumentStore, DocumentStoreExt};

/// Most recent alerts quoted verbatim in a report context.
const MAX_RECENT_ALERTS: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct GatheredData {
    pub context: Value,
    /// Human-readable period, e.g. `2026-03-02`.
    pub period_label: String,
}

/// Upstream aggregation feeding the report generator.
#[async_trait]
pub trait ReportDataSource: Send + Sync {
    async fn gather(
        &self,
        tenant: &TeamId,
        report_type: ReportType,
        local_now: DateTime<Tz>,
    ) -> Result<GatheredData>;
}

/// Closed local-date range `[first, last]` covered by a report issued on
/// `today`: yesterday, the seven days before today, or the previous month.
pub fn period_range(report_type: ReportType, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let yesterday = today.pred_opt().unwrap_or(today);
    match report_type {
        ReportType::Daily => (yesterday, yesterday),
        ReportType::Weekly => (today.checked_sub_days(Days::new(7)).unwrap_or(today), yesterday),
        ReportType::Monthly => {
            let this_month = today.with_day(1).unwrap_or(today);
            let first = this_month
                .checked_sub_months(Months::new(1))
                .unwrap_or(this_month);
            (first, this_month.pred_opt().unwrap_or(this_month))
        }
    }
}

pub fn period_label(report_type: ReportType, first: NaiveDate, last: NaiveDate) -> String {
    match report_type {
        ReportType::Daily => first.format("%Y-%m-%d").to_string(),
        ReportType::Weekly => format!("{} ~ {}", first.format("%Y-%m-%d"), last.format("%Y-%m-%d")),
        ReportType::Monthly => first.format("%Y-%m").to_string(),
    }
}

fn local_midnight_utc(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Builds the context from the tenant's rules and the alerts raised inside
/// the period.
pub struct AlertHistoryGatherer {
    store: Arc<dyn DocumentStore>,
}

impl AlertHistoryGatherer {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReportDataSource for AlertHistoryGatherer {
    async fn gather(
        &self,
        tenant: &TeamId,
        report_type: ReportType,
        local_now: DateTime<Tz>,
    ) -> Result<GatheredData> {
        let tz = local_now.timezone();
        let (first, last) = period_range(report_type, local_now.date_naive());
        let from = local_midnight_utc(tz, first);
        let until = local_midnight_utc(tz, last.succ_opt().unwrap_or(last));

        let rules: Vec<AlertRule> = self
            .store
            .get_as(keys::ALERT_RULES, tenant)?
            .unwrap_or_default();
        let alerts: Vec<TriggeredAlert> = self
            .store
            .log_entries_as::<TriggeredAlert>(keys::TRIGGERED_ALERTS, tenant)?
            .into_iter()
            .filter(|a| a.timestamp >= from && a.timestamp < until)
            .collect();

        let mut by_metric: BTreeMap<&str, usize> = BTreeMap::new();
        for alert in &alerts {
            *by_metric.entry(alert.metric.as_str()).or_default() += 1;
        }
        let critical = alerts
            .iter()
            .filter(|a| a.severity == Severity::Critical)
            .count();

        let label = period_label(report_type, first, last);
        let context = json!({
            "reportType": report_type,
            "period": label,
            "timezone": tz.name(),
            "rules": rules.iter().map(|r| json!({
                "name": r.name,
                "metric": r.metric,
                "condition": r.condition,
                "threshold": r.threshold,
                "enabled": r.enabled,
            })).collect::<Vec<_>>(),
            "alerts": {
                "total": alerts.len(),
                "critical": critical,
                "warning": alerts.len() - critical,
                "acknowledged": alerts.iter().filter(|a| a.acknowledged).count(),
                "byMetric": by_metric,
                "recent": alerts.iter().take(MAX_RECENT_ALERTS).map(|a| json!({
                    "ruleName": a.rule_name,
                    "metric": a.metric,
                    "currentValue": a.current_value,
                    "threshold": a.threshold,
                    "severity": a.severity,
                    "timestamp": a.timestamp,
                })).collect::<Vec<_>>(),
            },
        });

        Ok(GatheredData {
            context,
            period_label: label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vega_common::types::{Condition, EvaluatorKind};
    use vega_storage::MemoryDocumentStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn alert(id: &str, at: DateTime<Utc>, severity: Severity) -> TriggeredAlert {
        TriggeredAlert {
            id: id.to_string(),
            rule_id: "r1".to_string(),
            rule_name: "CPA ceiling".to_string(),
            message: "cpa high".to_string(),
            severity,
            metric: "cpa".to_string(),
            current_value: 40000.0,
            threshold: 30000.0,
            timestamp: at,
            acknowledged: false,
        }
    }

    #[test]
    fn period_ranges_and_labels() {
        let today = date(2026, 3, 2);

        let (first, last) = period_range(ReportType::Daily, today);
        assert_eq!(period_label(ReportType::Daily, first, last), "2026-03-01");

        let (first, last) = period_range(ReportType::Weekly, today);
        assert_eq!(
            period_label(ReportType::Weekly, first, last),
            "2026-02-23 ~ 2026-03-01"
        );

        let (first, last) = period_range(ReportType::Monthly, today);
        assert_eq!((first, last), (date(2026, 2, 1), date(2026, 2, 28)));
        assert_eq!(period_label(ReportType::Monthly, first, last), "2026-02");
    }

    #[test]
    fn january_monthly_report_covers_previous_december() {
        let (first, last) = period_range(ReportType::Monthly, date(2026, 1, 1));
        assert_eq!((first, last), (date(2025, 12, 1), date(2025, 12, 31)));
    }

    #[tokio::test]
    async fn context_counts_only_alerts_inside_the_local_window() {
        let store = Arc::new(MemoryDocumentStore::new());
        let team = TeamId::new("team-a");
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 0, 30, 0).unwrap();
        let seoul = chrono_tz::Asia::Seoul;

        let rule = AlertRule {
            id: "r1".into(),
            name: "CPA ceiling".into(),
            metric: "cpa".into(),
            condition: Condition::Gt,
            threshold: 30000.0,
            channels: Default::default(),
            enabled: true,
            evaluator: EvaluatorKind::Local,
            created_at: now,
            updated_at: now,
        };
        store.set_as(keys::ALERT_RULES, &team, &vec![rule]).unwrap();

        // Seoul's 2026-03-01 spans 2026-02-28T15:00Z .. 2026-03-01T15:00Z.
        let inside_early = Utc.with_ymd_and_hms(2026, 2, 28, 15, 0, 0).unwrap();
        let inside_late = Utc.with_ymd_and_hms(2026, 3, 1, 14, 59, 0).unwrap();
        let outside = Utc.with_ymd_and_hms(2026, 3, 1, 15, 0, 0).unwrap();
        for (id, at, sev) in [
            ("a1", inside_early, Severity::Warning),
            ("a2", inside_late, Severity::Critical),
            ("a3", outside, Severity::Critical),
        ] {
            store
                .log_append_as(keys::TRIGGERED_ALERTS, &team, &alert(id, at, sev), 100)
                .unwrap();
        }

        let gatherer = AlertHistoryGatherer::new(store);
        let data = gatherer
            .gather(&team, ReportType::Daily, now.with_timezone(&seoul))
            .await
            .unwrap();

        assert_eq!(data.period_label, "2026-03-01");
        let alerts = &data.context["alerts"];
        assert_eq!(alerts["total"], 2);
        assert_eq!(alerts["critical"], 1);
        assert_eq!(alerts["warning"], 1);
        assert_eq!(alerts["byMetric"]["cpa"], 2);
        assert_eq!(data.context["rules"].as_array().map(Vec::len), Some(1));
        assert_eq!(data.context["timezone"], "Asia/Seoul");
    }
}
