use crate::report::gather::ReportDataSource;
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use vega_ai::TextGenerator;
use vega_alert::AlertRuleEngine;
use vega_common::i18n::report_title;
use vega_common::tenant::TeamId;
use vega_common::types::{ChannelId, Report, ReportType};
use vega_notify::render::report_message;
use vega_storage::{keys, DocumentStore, DocumentStoreExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Gather,
    Generate,
    Persist,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleStage::Gather => write!(f, "gather"),
            CycleStage::Generate => write!(f, "generate"),
            CycleStage::Persist => write!(f, "persist"),
        }
    }
}

/// A report cycle that stopped at `stage`. Nothing is stored when the
/// stage is `Gather` or `Generate`.
#[derive(Debug, thiserror::Error)]
#[error("Report cycle failed at {stage} stage: {source}")]
pub struct CycleError {
    pub stage: CycleStage,
    #[source]
    pub source: anyhow::Error,
}

impl CycleError {
    fn at(stage: CycleStage) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| Self { stage, source }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub report_id: String,
    /// Channels a send was attempted on; empty when none is configured.
    pub sent_via: BTreeSet<ChannelId>,
    /// Per-channel delivery result of the attempt.
    pub delivered: Vec<(ChannelId, bool)>,
}

/// Cadence tag stored on automated reports, derived from the local
/// invocation date: `daily`, `weekly_<weekday>` or `monthly_<day>`.
///
/// ```
/// use chrono::NaiveDate;
/// use vega_common::types::ReportType;
/// use vega_server::report::pipeline::schedule_tag;
///
/// let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
/// assert_eq!(schedule_tag(ReportType::Weekly, monday), "weekly_monday");
/// assert_eq!(schedule_tag(ReportType::Monthly, monday), "monthly_2");
/// ```
pub fn schedule_tag(report_type: ReportType, local_date: chrono::NaiveDate) -> String {
    match report_type {
        ReportType::Daily => "daily".to_string(),
        ReportType::Weekly => {
            let weekday = match local_date.weekday() {
                chrono::Weekday::Mon => "monday",
                chrono::Weekday::Tue => "tuesday",
                chrono::Weekday::Wed => "wednesday",
                chrono::Weekday::Thu => "thursday",
                chrono::Weekday::Fri => "friday",
                chrono::Weekday::Sat => "saturday",
                chrono::Weekday::Sun => "sunday",
            };
            format!("weekly_{weekday}")
        }
        ReportType::Monthly => format!("monthly_{}", local_date.day()),
    }
}

/// One reporting cycle for one tenant and period: gather, generate,
/// persist, then notify.
pub struct ScheduledReportPipeline {
    store: Arc<dyn DocumentStore>,
    engine: Arc<AlertRuleEngine>,
    data_source: Arc<dyn ReportDataSource>,
    generator: Option<Arc<dyn TextGenerator>>,
    locale: String,
}

impl ScheduledReportPipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        engine: Arc<AlertRuleEngine>,
        data_source: Arc<dyn ReportDataSource>,
        generator: Option<Arc<dyn TextGenerator>>,
        locale: impl Into<String>,
    ) -> Self {
        Self {
            store,
            engine,
            data_source,
            generator,
            locale: locale.into(),
        }
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    /// Reports for `tenant`, newest first.
    pub fn list_reports(&self, tenant: &TeamId) -> vega_storage::error::Result<Vec<Report>> {
        self.store.log_entries_as(keys::REPORTS, tenant)
    }

    pub async fn run_cycle(
        &self,
        tenant: &TeamId,
        report_type: ReportType,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> Result<CycleOutcome, CycleError> {
        let local_now = now.with_timezone(&tz);

        let gathered = self
            .data_source
            .gather(tenant, report_type, local_now)
            .await
            .map_err(CycleError::at(CycleStage::Gather))?;

        let generator = self.generator.as_ref().ok_or_else(|| CycleError {
            stage: CycleStage::Generate,
            source: anyhow::anyhow!("No text generator configured"),
        })?;
        let content = generator
            .generate_report(report_type, &gathered.context, &gathered.period_label)
            .await
            .map_err(CycleError::at(CycleStage::Generate))?;
        if content.trim().is_empty() {
            return Err(CycleError {
                stage: CycleStage::Generate,
                source: anyhow::anyhow!("Generator returned empty content"),
            });
        }

        let mut report = Report {
            id: vega_common::id::next_id(),
            report_type,
            title: report_title(&self.locale, report_type).to_string(),
            content,
            generated_at: now,
            period: gathered.period_label,
            automated: true,
            schedule: schedule_tag(report_type, local_now.date_naive()),
            sent_via: None,
        };
        self.store
            .log_append_as(keys::REPORTS, tenant, &report, keys::REPORTS_CAPACITY)
            .map_err(|e| CycleError {
                stage: CycleStage::Persist,
                source: e.into(),
            })?;
        tracing::info!(
            tenant = %tenant,
            report_id = %report.id,
            report_type = %report_type,
            period = %report.period,
            "Report generated"
        );

        let delivered = self.notify(tenant, &mut report).await;
        Ok(CycleOutcome {
            report_id: report.id,
            sent_via: report.sent_via.unwrap_or_default(),
            delivered,
        })
    }

    /// Best effort: failures are logged and never undo the stored report.
    async fn notify(&self, tenant: &TeamId, report: &mut Report) -> Vec<(ChannelId, bool)> {
        let config = match self.engine.notification_config(tenant) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(tenant = %tenant, report_id = %report.id, error = %e, "Failed to read notification config");
                return Vec::new();
            }
        };
        let dispatcher = self.engine.dispatcher();
        let channels = dispatcher.configured_channels(&config);
        if channels.is_empty() {
            return Vec::new();
        }

        let results = dispatcher
            .send(&config, &report_message(report), &channels)
            .await;
        report.sent_via = Some(results.keys().copied().collect());

        if let Err(e) = self.store.log_replace_as(keys::REPORTS, tenant, report) {
            tracing::warn!(tenant = %tenant, report_id = %report.id, error = %e, "Failed to record report delivery");
        }
        results.into_iter().collect()
    }
}
