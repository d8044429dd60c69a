use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;
use crate::report::ScheduledReportPipeline;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use vega_alert::AlertRuleEngine;
use vega_storage::DocumentStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub engine: Arc<AlertRuleEngine>,
    pub pipeline: Arc<ScheduledReportPipeline>,
    pub limiter: Arc<RateLimiter>,
    pub config: Arc<ServerConfig>,
    pub jwt_secret: Arc<String>,
    pub start_time: DateTime<Utc>,
}
