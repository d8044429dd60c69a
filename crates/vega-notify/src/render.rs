//! Turns alerts and reports into [`OutboundMessage`]s.

use crate::utils::truncate_chars;
use crate::{OutboundMessage, MAX_SLACK_BLOCKS};
use serde_json::{json, Value};
use vega_common::i18n::TRANSLATIONS;
use vega_common::types::{Report, Severity, TriggeredAlert};

/// Slack limits a section block's text to 3000 characters.
const SLACK_SECTION_MAX: usize = 3000;

pub fn markdown_to_html(markdown: &str) -> String {
    use pulldown_cmark::{html, Options, Parser};

    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Standalone HTML document for an emailed report.
pub fn render_report_html(title: &str, period: &str, markdown: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body style="font-family: -apple-system, 'Segoe UI', sans-serif; max-width: 720px; margin: 0 auto; color: #1f2933;">
<h1 style="font-size: 22px;">{title}</h1>
<p style="color: #6b7280;">{period}</p>
<hr>
{body}
</body>
</html>"#,
        title = escape_html(title),
        period = escape_html(period),
        body = markdown_to_html(markdown),
    )
}

/// Header block followed by one section per markdown paragraph, at most
/// [`MAX_SLACK_BLOCKS`] in total.
pub fn slack_blocks(title: &str, markdown: &str) -> Vec<Value> {
    let header = json!({
        "type": "header",
        "text": { "type": "plain_text", "text": truncate_chars(title, 150) },
    });
    std::iter::once(header)
        .chain(
            markdown
                .split("\n\n")
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|paragraph| {
                    json!({
                        "type": "section",
                        "text": {
                            "type": "mrkdwn",
                            "text": truncate_chars(paragraph, SLACK_SECTION_MAX),
                        },
                    })
                }),
        )
        .take(MAX_SLACK_BLOCKS)
        .collect()
}

pub fn report_message(report: &Report) -> OutboundMessage {
    OutboundMessage::new(format!("{} ({})", report.title, report.period), report.content.clone())
        .with_html(render_report_html(&report.title, &report.period, &report.content))
        .with_blocks(slack_blocks(&report.title, &report.content))
}

pub fn alert_message(alert: &TriggeredAlert, locale: &str) -> OutboundMessage {
    let (key, marker) = match alert.severity {
        Severity::Critical => ("alert.header.critical", "🔴"),
        Severity::Warning => ("alert.header.warning", "🟡"),
    };
    let header = TRANSLATIONS.get(locale, key, "KPI alert");
    let subject = format!("{marker} {header}: {}", alert.rule_name);
    let text = format!(
        "{message}\nMetric: {metric}\nCurrent: {value}\nThreshold: {threshold}\nSeverity: {severity}\nTime: {time}",
        message = alert.message,
        metric = alert.metric,
        value = alert.current_value,
        threshold = alert.threshold,
        severity = alert.severity,
        time = alert.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
    );
    let html = format!(
        "<h2>{}</h2><p>{}</p>",
        escape_html(&subject),
        escape_html(&text).replace('\n', "<br>")
    );
    OutboundMessage::new(subject, text).with_html(html)
}
