use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use cadence_ingest::ImportPipeline;
use cadence_notify::{
    EmailConfig, EmailSink, LoggingSink, MultiSink, NotificationSink, WebhookConfig, WebhookSink,
};
use cadence_orchestrator::{AlertOrchestrator, OrchestratorConfig};
use cadence_scheduler::{Scheduler, SchedulerConfig};
use cadence_store::{HolidayCache, ProjectStore};
use cadence_store_memory::MemoryStore;
use cadence_token::TokenSigner;

use crate::config::CadenceConfig;
use crate::error::ServerError;

/// Shared handles behind every API handler. Everything is constructed once
/// at startup and passed explicitly; the config snapshot is the only
/// process-wide constant.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProjectStore>,
    pub holidays: Arc<HolidayCache>,
    pub signer: Arc<TokenSigner>,
    pub sink: Arc<dyn NotificationSink>,
    pub pipeline: Arc<ImportPipeline>,
    pub orchestrator: Arc<AlertOrchestrator>,
    pub config: Arc<CadenceConfig>,
}

/// Build the full application state from validated configuration.
pub fn build_state(config: CadenceConfig) -> Result<AppState, ServerError> {
    config.validate()?;

    let store: Arc<dyn ProjectStore> = Arc::new(MemoryStore::new());
    let holidays = Arc::new(HolidayCache::new(Arc::clone(&store)));

    let secret = config
        .auth
        .jwt_secret
        .as_deref()
        .ok_or_else(|| ServerError::Config("auth.jwt_secret is required".to_owned()))?;
    let signer = Arc::new(TokenSigner::new(secret, config.server.frontend_base_url.clone()));

    let sink = build_sink(&config)?;

    let pipeline = Arc::new(ImportPipeline::new(
        Arc::clone(&store),
        Arc::clone(&holidays),
        config.alerts.default_country.clone(),
    ));

    let orchestrator = Arc::new(AlertOrchestrator::new(
        Arc::clone(&store),
        Arc::clone(&holidays),
        Arc::clone(&signer),
        Arc::clone(&sink),
        OrchestratorConfig {
            default_country: config.alerts.default_country.clone(),
            ops_escalation_email: config.alerts.ops_escalation_email.clone(),
            ops_escalation_name: config.alerts.ops_escalation_name.clone(),
            ..OrchestratorConfig::default()
        },
    ));

    Ok(AppState {
        store,
        holidays,
        signer,
        sink,
        pipeline,
        orchestrator,
        config: Arc::new(config),
    })
}

/// Assemble the notification sink stack from whatever transports are
/// configured; none at all means the logging sink.
fn build_sink(config: &CadenceConfig) -> Result<Arc<dyn NotificationSink>, ServerError> {
    let mut sinks: Vec<Box<dyn NotificationSink>> = Vec::new();

    if let Some(ref host) = config.notify.smtp_host {
        let mut email = EmailConfig::new(host.clone(), config.notify.smtp_from_email.clone());
        email.port = config.notify.smtp_port;
        email.from_name = config.notify.smtp_from_name.clone();
        email.use_tls = config.notify.smtp_use_tls;
        if let (Some(user), Some(pass)) = (&config.notify.smtp_user, &config.notify.smtp_password)
        {
            email = email.with_credentials(user.clone(), pass.clone());
        }
        let sink = EmailSink::new(email).map_err(|e| ServerError::Config(e.to_string()))?;
        sinks.push(Box::new(sink));
    }

    if let Some(ref url) = config.notify.chat_webhook_url {
        sinks.push(Box::new(WebhookSink::new(WebhookConfig {
            webhook_url: url.clone(),
        })));
    }

    Ok(match sinks.len() {
        0 => {
            info!("no notification transport configured, using logging sink");
            Arc::new(LoggingSink)
        }
        1 => Arc::from(sinks.remove(0)),
        _ => Arc::new(MultiSink::new(sinks)),
    })
}

/// Build the background scheduler for this process.
///
/// Only called when `scheduler.run_scheduler` is set — the single-runner
/// flag that must be on for exactly one process in the fleet.
pub fn build_scheduler(
    state: &AppState,
) -> Result<(Scheduler, mpsc::Sender<()>), ServerError> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let section = &state.config.scheduler;

    let scheduler = Scheduler::new(
        Arc::clone(&state.orchestrator),
        Arc::clone(&state.holidays),
        Arc::clone(&state.sink),
        SchedulerConfig {
            timezone: section.scheduler_timezone.clone(),
            default_country: state.config.alerts.default_country.clone(),
            job_failure_threshold: section.job_failure_alert_threshold,
            ops_email: state.config.alerts.ops_escalation_email.clone(),
            ops_name: state.config.alerts.ops_escalation_name.clone(),
            escalation_check_interval: Duration::from_secs(30 * 60),
            queue_drain_interval: Duration::from_secs(5 * 60),
            ..SchedulerConfig::default()
        },
        shutdown_rx,
    )
    .map_err(|e| ServerError::Config(e.to_string()))?;

    Ok((scheduler, shutdown_tx))
}
