use crate::report::pipeline::ScheduledReportPipeline;
use crate::schedule::parse_timezone;
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use vega_common::tenant::TeamId;
use vega_common::types::{ReportType, ScheduleConfig};
use vega_storage::{keys, DocumentStore, DocumentStoreExt};

/// Local date each period last completed for a tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRuns {
    #[serde(default)]
    pub daily: Option<NaiveDate>,
    #[serde(default)]
    pub weekly: Option<NaiveDate>,
    #[serde(default)]
    pub monthly: Option<NaiveDate>,
}

impl ReportRuns {
    pub fn last(&self, report_type: ReportType) -> Option<NaiveDate> {
        match report_type {
            ReportType::Daily => self.daily,
            ReportType::Weekly => self.weekly,
            ReportType::Monthly => self.monthly,
        }
    }

    pub fn mark(&mut self, report_type: ReportType, date: NaiveDate) {
        let slot = match report_type {
            ReportType::Daily => &mut self.daily,
            ReportType::Weekly => &mut self.weekly,
            ReportType::Monthly => &mut self.monthly,
        };
        *slot = Some(date);
    }
}

fn last_day_of_month(date: NaiveDate) -> u32 {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// Periods whose local hour has been reached today and which have not yet
/// run on this local date. A `dayOfMonth` past the end of a short month
/// fires on its last day.
pub fn due_periods<Tz: chrono::TimeZone>(
    config: &ScheduleConfig,
    local_now: &DateTime<Tz>,
    runs: &ReportRuns,
) -> Vec<ReportType> {
    let today = local_now.date_naive();
    let hour = local_now.hour();

    let mut due = Vec::new();
    let daily = &config.daily_report;
    if daily.enabled && hour >= daily.hour {
        due.push(ReportType::Daily);
    }
    let weekly = &config.weekly_report;
    if weekly.enabled
        && hour >= weekly.hour
        && today.weekday().num_days_from_sunday() == weekly.day_of_week
    {
        due.push(ReportType::Weekly);
    }
    let monthly = &config.monthly_report;
    if monthly.enabled
        && hour >= monthly.hour
        && today.day() == monthly.day_of_month.min(last_day_of_month(today))
    {
        due.push(ReportType::Monthly);
    }

    due.retain(|t| runs.last(*t) != Some(today));
    due
}

/// Periodically runs every due report cycle for every tenant that holds a
/// schedule config.
pub struct ReportScheduler {
    store: Arc<dyn DocumentStore>,
    pipeline: Arc<ScheduledReportPipeline>,
    tick: Duration,
}

impl ReportScheduler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        pipeline: Arc<ScheduledReportPipeline>,
        tick: Duration,
    ) -> Self {
        Self {
            store,
            pipeline,
            tick,
        }
    }

    pub async fn start(self: Arc<Self>) {
        let mut interval = time::interval(self.tick);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        tracing::info!(tick_secs = self.tick.as_secs(), "Report scheduler started");

        loop {
            interval.tick().await;
            let completed = self.run_due(Utc::now()).await;
            if completed > 0 {
                tracing::info!(completed, "Report scheduler tick finished");
            }
        }
    }

    /// Runs every due cycle once and returns how many completed.
    pub async fn run_due(&self, now: DateTime<Utc>) -> usize {
        let tenants = match self.store.tenants_with(keys::SCHEDULE_CONFIG) {
            Ok(tenants) => tenants,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list scheduled tenants");
                return 0;
            }
        };

        let mut completed = 0;
        for tenant in tenants {
            completed += self.run_tenant(&tenant, now).await;
        }
        completed
    }

    async fn run_tenant(&self, tenant: &TeamId, now: DateTime<Utc>) -> usize {
        let config: ScheduleConfig = match self.store.get_as(keys::SCHEDULE_CONFIG, tenant) {
            Ok(Some(config)) => config,
            Ok(None) => return 0,
            Err(e) => {
                tracing::warn!(tenant = %tenant, error = %e, "Unreadable schedule config");
                return 0;
            }
        };
        let tz = match parse_timezone(&config.timezone) {
            Ok(tz) => tz,
            Err(e) => {
                tracing::warn!(tenant = %tenant, error = %e, "Skipping tenant with invalid timezone");
                return 0;
            }
        };
        let mut runs: ReportRuns = match self.store.get_as(keys::REPORT_RUNS, tenant) {
            Ok(runs) => runs.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(tenant = %tenant, error = %e, "Unreadable report run ledger");
                return 0;
            }
        };

        let local_now = now.with_timezone(&tz);
        let mut completed = 0;
        for report_type in due_periods(&config, &local_now, &runs) {
            match self.pipeline.run_cycle(tenant, report_type, now, tz).await {
                Ok(outcome) => {
                    completed += 1;
                    runs.mark(report_type, local_now.date_naive());
                    if let Err(e) = self.store.set_as(keys::REPORT_RUNS, tenant, &runs) {
                        tracing::warn!(tenant = %tenant, error = %e, "Failed to record report run");
                    }
                    tracing::info!(
                        tenant = %tenant,
                        report_type = %report_type,
                        report_id = %outcome.report_id,
                        channels = outcome.sent_via.len(),
                        "Scheduled report completed"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        tenant = %tenant,
                        report_type = %report_type,
                        stage = %e.stage,
                        error = %e.source,
                        "Scheduled report failed"
                    );
                }
            }
        }
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::gather::{GatheredData, ReportDataSource};
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use vega_ai::{ConditionVerdict, RuleCondition, TextGenerator};
    use vega_alert::AlertRuleEngine;
    use vega_common::types::MetricValues;
    use vega_notify::{DispatcherSettings, NotificationDispatcher};
    use vega_storage::MemoryDocumentStore;

    struct EmptySource;

    #[async_trait]
    impl ReportDataSource for EmptySource {
        async fn gather(
            &self,
            _tenant: &TeamId,
            _report_type: ReportType,
            _local_now: DateTime<chrono_tz::Tz>,
        ) -> Result<GatheredData> {
            Ok(GatheredData {
                context: json!({}),
                period_label: "p".to_string(),
            })
        }
    }

    struct SwitchGenerator {
        fail: AtomicBool,
    }

    #[async_trait]
    impl TextGenerator for SwitchGenerator {
        fn provider(&self) -> &str {
            "switch"
        }

        fn model_name(&self) -> &str {
            "switch"
        }

        async fn generate_report(
            &self,
            report_type: ReportType,
            _context: &Value,
            _period: &str,
        ) -> Result<String> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("down");
            }
            Ok(format!("{report_type} report"))
        }

        async fn evaluate_conditions(
            &self,
            _rules: &[RuleCondition],
            _values: &MetricValues,
        ) -> Result<Vec<ConditionVerdict>> {
            Ok(Vec::new())
        }
    }

    fn seoul_config() -> ScheduleConfig {
        ScheduleConfig {
            timezone: "Asia/Seoul".to_string(),
            ..ScheduleConfig::default()
        }
    }

    fn scheduler(fail: bool) -> (Arc<MemoryDocumentStore>, Arc<SwitchGenerator>, ReportScheduler) {
        let store = Arc::new(MemoryDocumentStore::new());
        let dispatcher =
            Arc::new(NotificationDispatcher::new(DispatcherSettings::default(), None).unwrap());
        let engine = Arc::new(AlertRuleEngine::new(store.clone(), dispatcher));
        let generator = Arc::new(SwitchGenerator {
            fail: AtomicBool::new(fail),
        });
        let pipeline = Arc::new(ScheduledReportPipeline::new(
            store.clone(),
            engine,
            Arc::new(EmptySource),
            Some(generator.clone() as Arc<dyn TextGenerator>),
            "en",
        ));
        let scheduler = ReportScheduler::new(store.clone(), pipeline, Duration::from_secs(60));
        (store, generator, scheduler)
    }

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn nothing_is_due_before_the_hour() {
        let config = ScheduleConfig::default();
        let local = utc(2026, 3, 2, 8);
        assert!(due_periods(&config, &local, &ReportRuns::default()).is_empty());
    }

    #[test]
    fn weekly_needs_matching_weekday() {
        let config = ScheduleConfig::default();
        // 2026-03-02 is a Monday, 03-03 a Tuesday.
        let monday = utc(2026, 3, 2, 9);
        let tuesday = utc(2026, 3, 3, 9);
        assert_eq!(
            due_periods(&config, &monday, &ReportRuns::default()),
            vec![ReportType::Daily, ReportType::Weekly]
        );
        assert_eq!(
            due_periods(&config, &tuesday, &ReportRuns::default()),
            vec![ReportType::Daily]
        );
    }

    #[test]
    fn sunday_is_day_zero() {
        let mut config = ScheduleConfig::default();
        config.weekly_report.day_of_week = 0;
        config.daily_report.enabled = false;
        let sunday = utc(2026, 3, 1, 10);
        assert_eq!(
            due_periods(&config, &sunday, &ReportRuns::default()),
            vec![ReportType::Weekly, ReportType::Monthly]
        );
    }

    #[test]
    fn day_of_month_past_month_end_fires_on_last_day() {
        let mut config = ScheduleConfig::default();
        config.daily_report.enabled = false;
        config.weekly_report.enabled = false;
        config.monthly_report.day_of_month = 31;
        assert_eq!(
            due_periods(&config, &utc(2026, 2, 28, 9), &ReportRuns::default()),
            vec![ReportType::Monthly]
        );
        assert!(due_periods(&config, &utc(2026, 3, 30, 9), &ReportRuns::default()).is_empty());
    }

    #[test]
    fn already_ran_today_is_not_due() {
        let config = ScheduleConfig::default();
        let now = utc(2026, 3, 2, 12);
        let mut runs = ReportRuns::default();
        runs.mark(ReportType::Daily, now.date_naive());
        assert_eq!(due_periods(&config, &now, &runs), vec![ReportType::Weekly]);
    }

    #[test]
    fn disabled_periods_never_fire() {
        let mut config = ScheduleConfig::default();
        config.daily_report.enabled = false;
        config.weekly_report.enabled = false;
        config.monthly_report.enabled = false;
        assert!(due_periods(&config, &utc(2026, 3, 2, 23), &ReportRuns::default()).is_empty());
    }

    #[tokio::test]
    async fn run_due_uses_tenant_local_time_once_per_day() {
        let (store, _, scheduler) = scheduler(false);
        let team = TeamId::new("team-a");
        store
            .set_as(keys::SCHEDULE_CONFIG, &team, &seoul_config())
            .unwrap();

        // 23:30 UTC Sunday is 08:30 Monday in Seoul: too early.
        assert_eq!(scheduler.run_due(utc(2026, 3, 1, 23)).await, 0);

        // 00:30 UTC Monday is 09:30 Monday in Seoul.
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 0, 30, 0).unwrap();
        assert_eq!(scheduler.run_due(now).await, 2);
        assert_eq!(scheduler.run_due(now).await, 0);

        let reports: Vec<vega_common::types::Report> =
            store.log_entries_as(keys::REPORTS, &team).unwrap();
        assert_eq!(reports.len(), 2);

        let runs: ReportRuns = store.get_as(keys::REPORT_RUNS, &team).unwrap().unwrap();
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(runs.daily, Some(monday));
        assert_eq!(runs.weekly, Some(monday));
        assert_eq!(runs.monthly, None);
    }

    #[tokio::test]
    async fn failed_cycles_are_retried_on_the_next_tick() {
        let (store, generator, scheduler) = scheduler(true);
        let team = TeamId::new("team-a");
        store
            .set_as(keys::SCHEDULE_CONFIG, &team, &ScheduleConfig::default())
            .unwrap();

        let now = utc(2026, 3, 3, 10);
        assert_eq!(scheduler.run_due(now).await, 0);
        assert!(store
            .get_as::<ReportRuns>(keys::REPORT_RUNS, &team)
            .unwrap()
            .is_none());

        generator.fail.store(false, Ordering::SeqCst);
        assert_eq!(scheduler.run_due(now).await, 1);
    }

    #[tokio::test]
    async fn tenant_with_bad_timezone_is_skipped() {
        let (store, _, scheduler) = scheduler(false);
        let broken = ScheduleConfig {
            timezone: "Nowhere/Land".to_string(),
            ..ScheduleConfig::default()
        };
        store
            .set_as(keys::SCHEDULE_CONFIG, &TeamId::new("bad"), &broken)
            .unwrap();
        store
            .set_as(keys::SCHEDULE_CONFIG, &TeamId::new("good"), &ScheduleConfig::default())
            .unwrap();

        assert_eq!(scheduler.run_due(utc(2026, 3, 3, 10)).await, 1);
    }
}
