//! Static translation table keyed by `(locale, message_key)`.
//!
//! Supported locales: `en`, `ko`. Unknown locales fall back to `en`.

use crate::types::ReportType;
use std::collections::HashMap;
use std::sync::LazyLock;

pub const DEFAULT_LOCALE: &str = "en";

pub const SUPPORTED_LOCALES: &[&str] = &["en", "ko"];

pub struct Translations {
    map: HashMap<(&'static str, &'static str), &'static str>,
}

impl Translations {
    /// Looks up `key` for `locale`, then for `en`, then returns `default`.
    pub fn get<'a>(&self, locale: &str, key: &str, default: &'a str) -> &'a str {
        if let Some(&val) = self.map.get(&(locale, key)) {
            return val;
        }
        if locale != DEFAULT_LOCALE {
            if let Some(&val) = self.map.get(&(DEFAULT_LOCALE, key)) {
                return val;
            }
        }
        default
    }
}

pub static TRANSLATIONS: LazyLock<Translations> = LazyLock::new(|| {
    let mut map = HashMap::new();

    macro_rules! t {
        ($locale:expr, $key:expr, $val:expr) => {
            map.insert(($locale, $key), $val);
        };
    }

    t!("en", "report.title.daily", "Daily Performance Report");
    t!("ko", "report.title.daily", "일간 성과 리포트");
    t!("en", "report.title.weekly", "Weekly Performance Report");
    t!("ko", "report.title.weekly", "주간 성과 리포트");
    t!("en", "report.title.monthly", "Monthly Performance Report");
    t!("ko", "report.title.monthly", "월간 성과 리포트");

    t!("en", "alert.header.warning", "KPI alert");
    t!("ko", "alert.header.warning", "KPI 경고");
    t!("en", "alert.header.critical", "Critical KPI alert");
    t!("ko", "alert.header.critical", "KPI 심각 경고");

    Translations { map }
});

/// Fixed title for an automated report of the given type.
///
/// # Examples
///
/// ```
/// use vega_common::i18n::report_title;
/// use vega_common::types::ReportType;
///
/// assert_eq!(report_title("en", ReportType::Weekly), "Weekly Performance Report");
/// assert_eq!(report_title("fr", ReportType::Daily), "Daily Performance Report");
/// ```
pub fn report_title(locale: &str, report_type: ReportType) -> &'static str {
    let key = match report_type {
        ReportType::Daily => "report.title.daily",
        ReportType::Weekly => "report.title.weekly",
        ReportType::Monthly => "report.title.monthly",
    };
    TRANSLATIONS.get(locale, key, "Performance Report")
}
