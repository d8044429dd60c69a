//! Validation and merge of tenant schedule updates.

use chrono_tz::Tz;
use vega_common::types::{ScheduleConfig, ScheduleConfigPatch};

/// First constraint a schedule update violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// A schedule update whose every present field passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSchedulePatch {
    timezone: Option<Tz>,
    daily_enabled: Option<bool>,
    daily_hour: Option<u32>,
    weekly_enabled: Option<bool>,
    weekly_hour: Option<u32>,
    weekly_day: Option<u32>,
    monthly_enabled: Option<bool>,
    monthly_hour: Option<u32>,
    monthly_day: Option<u32>,
}

fn in_range(
    field: &'static str,
    value: Option<i64>,
    min: i64,
    max: i64,
) -> Result<Option<u32>, ValidationError> {
    match value {
        None => Ok(None),
        Some(v) if (min..=max).contains(&v) => Ok(u32::try_from(v).ok()),
        Some(v) => Err(ValidationError::new(
            field,
            format!("must be between {min} and {max}, got {v}"),
        )),
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, ValidationError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ValidationError::new("timezone", format!("unknown timezone '{name}'")))
}

/// Checks every present field and returns the first violation.
///
/// # Examples
///
/// ```
/// use vega_common::types::{DailySchedulePatch, ScheduleConfigPatch};
/// use vega_server::schedule::validate;
///
/// let patch = ScheduleConfigPatch {
///     daily_report: Some(DailySchedulePatch { enabled: None, hour: Some(24) }),
///     ..Default::default()
/// };
/// let err = validate(&patch).unwrap_err();
/// assert_eq!(err.field, "dailyReport.hour");
/// ```
pub fn validate(patch: &ScheduleConfigPatch) -> Result<ValidatedSchedulePatch, ValidationError> {
    let timezone = patch.timezone.as_deref().map(parse_timezone).transpose()?;

    let daily = patch.daily_report.clone().unwrap_or_default();
    let weekly = patch.weekly_report.clone().unwrap_or_default();
    let monthly = patch.monthly_report.clone().unwrap_or_default();

    Ok(ValidatedSchedulePatch {
        timezone,
        daily_enabled: daily.enabled,
        daily_hour: in_range("dailyReport.hour", daily.hour, 0, 23)?,
        weekly_enabled: weekly.enabled,
        weekly_hour: in_range("weeklyReport.hour", weekly.hour, 0, 23)?,
        weekly_day: in_range("weeklyReport.dayOfWeek", weekly.day_of_week, 0, 6)?,
        monthly_enabled: monthly.enabled,
        monthly_hour: in_range("monthlyReport.hour", monthly.hour, 0, 23)?,
        monthly_day: in_range("monthlyReport.dayOfMonth", monthly.day_of_month, 1, 31)?,
    })
}

impl ValidatedSchedulePatch {
    /// Applies the present fields onto `existing`; absent ones keep their
    /// prior value.
    pub fn merge_onto(self, mut existing: ScheduleConfig) -> ScheduleConfig {
        if let Some(tz) = self.timezone {
            existing.timezone = tz.name().to_string();
        }
        let daily = &mut existing.daily_report;
        daily.enabled = self.daily_enabled.unwrap_or(daily.enabled);
        daily.hour = self.daily_hour.unwrap_or(daily.hour);

        let weekly = &mut existing.weekly_report;
        weekly.enabled = self.weekly_enabled.unwrap_or(weekly.enabled);
        weekly.hour = self.weekly_hour.unwrap_or(weekly.hour);
        weekly.day_of_week = self.weekly_day.unwrap_or(weekly.day_of_week);

        let monthly = &mut existing.monthly_report;
        monthly.enabled = self.monthly_enabled.unwrap_or(monthly.enabled);
        monthly.hour = self.monthly_hour.unwrap_or(monthly.hour);
        monthly.day_of_month = self.monthly_day.unwrap_or(monthly.day_of_month);

        existing
    }
}
