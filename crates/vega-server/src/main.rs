use anyhow::Result;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;
use vega_ai::{OpenAiCompatProvider, TextGenerator};
use vega_alert::{AlertRuleEngine, RemoteEvaluator};
use vega_common::tenant::TeamId;
use vega_notify::channels::{MailTransport, SmtpMailer};
use vega_notify::NotificationDispatcher;
use vega_storage::{keys, DocumentStore, DocumentStoreExt, SqliteDocumentStore};

use vega_server::app;
use vega_server::auth;
use vega_server::config::ServerConfig;
use vega_server::rate_limit::RateLimiter;
use vega_server::report::{AlertHistoryGatherer, ReportScheduler, ScheduledReportPipeline};
use vega_server::state::AppState;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  vega-server [config.toml]                               Start the server");
    eprintln!("  vega-server issue-token <config.toml> <caller_id>       Print a bearer token for a caller");
    eprintln!("  vega-server assign-team <config.toml> <caller_id> <team_id>   Make a caller share a team's data");
}

#[tokio::main]
async fn main() -> Result<()> {
    vega_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vega=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("issue-token") => {
            let (Some(config_path), Some(caller)) = (args.get(2), args.get(3)) else {
                print_usage();
                anyhow::bail!("issue-token requires <config.toml> and <caller_id> arguments");
            };
            run_issue_token(config_path, caller)
        }
        Some("assign-team") => {
            let (Some(config_path), Some(caller), Some(team)) =
                (args.get(2), args.get(3), args.get(4))
            else {
                print_usage();
                anyhow::bail!("assign-team requires <config.toml>, <caller_id> and <team_id> arguments");
            };
            run_assign_team(config_path, caller, team)
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

#[allow(clippy::print_stdout)]
fn run_issue_token(config_path: &str, caller: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let secret = config
        .auth
        .jwt_secret
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("[auth].jwt_secret must be set to issue tokens"))?;
    let token = auth::create_token(secret, caller, config.auth.token_expire_secs)?;
    println!("{token}");
    Ok(())
}

fn run_assign_team(config_path: &str, caller: &str, team: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = SqliteDocumentStore::open(Path::new(&config.storage.path))?;
    store.set_as(keys::TEAM_ID, &TeamId::new(caller), &team)?;
    tracing::info!(caller = %caller, team = %team, "Caller assigned to team");
    Ok(())
}

fn random_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;

    tracing::info!(
        http_port = config.http.port,
        storage = %config.storage.path,
        locale = %config.locale,
        "vega-server starting"
    );

    let store: Arc<dyn DocumentStore> =
        Arc::new(SqliteDocumentStore::open(Path::new(&config.storage.path))?);

    let mailer: Option<Arc<dyn MailTransport>> = match &config.smtp {
        Some(smtp) => {
            let mailer: Arc<dyn MailTransport> = Arc::new(SmtpMailer::new(&smtp.to_settings())?);
            tracing::info!(host = %smtp.host, port = smtp.port, "SMTP relay configured");
            Some(mailer)
        }
        None => {
            tracing::info!("No [smtp] section, email channel disabled");
            None
        }
    };
    let dispatcher = Arc::new(NotificationDispatcher::new(
        config.notify.to_settings(),
        mailer,
    )?);

    let generator: Option<Arc<dyn TextGenerator>> = if config.ai.is_configured() {
        let provider = OpenAiCompatProvider::new(config.ai.to_provider_config(&config.locale))?;
        tracing::info!(
            provider = provider.provider(),
            model = provider.model_name(),
            "Text generator configured"
        );
        let provider: Arc<dyn TextGenerator> = Arc::new(provider);
        Some(provider)
    } else {
        tracing::warn!("No [ai].api_key configured. Report generation and semantic rules are disabled");
        None
    };

    let mut engine = AlertRuleEngine::new(store.clone(), dispatcher).with_locale(&config.locale);
    if let Some(generator) = &generator {
        engine = engine.with_remote(Arc::new(RemoteEvaluator::new(generator.clone())));
    }
    let engine = Arc::new(engine);

    let pipeline = Arc::new(ScheduledReportPipeline::new(
        store.clone(),
        engine.clone(),
        Arc::new(AlertHistoryGatherer::new(store.clone())),
        generator.clone(),
        &config.locale,
    ));

    let jwt_secret = match &config.auth.jwt_secret {
        Some(secret) => Arc::new(secret.clone()),
        None => {
            tracing::warn!("No jwt_secret configured. A random secret was generated and will change on restart. Set [auth].jwt_secret in config for production use.");
            Arc::new(random_secret())
        }
    };

    let limiter = Arc::new(RateLimiter::in_memory());

    let state = AppState {
        store: store.clone(),
        engine,
        pipeline: pipeline.clone(),
        limiter: limiter.clone(),
        config: Arc::new(config.clone()),
        jwt_secret,
        start_time: Utc::now(),
    };

    let report_handle = if config.report_scheduler.enabled && generator.is_some() {
        let scheduler = Arc::new(ReportScheduler::new(
            store.clone(),
            pipeline,
            Duration::from_secs(config.report_scheduler.tick_secs),
        ));
        Some(tokio::spawn(async move {
            scheduler.start().await;
        }))
    } else {
        tracing::info!("Report scheduler disabled");
        None
    };

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http.port).parse()?;
    let app = app::build_http_app(state);
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(http = %http_addr, "Server started");

    let result = axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await;
    if let Err(e) = result {
        tracing::error!(error = %e, "HTTP server error");
    }

    if let Some(h) = report_handle {
        h.abort();
    }
    limiter.clear();
    tracing::info!("Server stopped");

    Ok(())
}
