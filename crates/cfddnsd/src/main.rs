// # cfddnsd - Cloudflare Dynamic DNS Daemon
//
// Thin integration layer: all decision logic lives in cfddns-core.
//
// The cfddnsd daemon is responsible for:
// 1. Reading and validating configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the IP resolver, the Cloudflare client and the engine
// 4. Translating OS signals into reload and shutdown requests
// 5. Running the scheduler (or a single pass) and the admin API
//
// ## Configuration
//
// ### Provider
// - `DDNS_PROVIDER_API_TOKEN`: Cloudflare API token (required)
// - `DDNS_PROVIDER_API_URL`: API base URL override
//
// ### Behavior
// - `DDNS_MODE`: daemon (default), oneoff, delete
// - `DDNS_REFRESH_INTERVAL`: Poll interval in seconds (default 60)
// - `DDNS_DELETE_MODE`: Delete matching records instead of updating them
//
// ### Records
// - `DDNS_RECORDS`: JSON array of records; wins over the file when set
// - `DDNS_CONFIG_FILE`: TOML file with `[[records]]` tables
//
// ### Surfaces
// - `DDNS_ADMIN_ADDR`: Admin API listen address (empty disables it)
// - `DDNS_NOTIFY_WEBHOOK_URL`: Webhook for IP change notifications
// - `DDNS_NOTIFY_SUBJECT`: Subject carried in notifications
// - `DDNS_LOG_LEVEL`: trace, debug, info (default), warn, error
// - `DDNS_LOG_FORMAT`: text (default) or json
//
// ## Signals
//
// - SIGHUP: reload desired records
// - SIGTERM / SIGINT: finish the current pass and exit
//
// ## Example
//
// ```bash
// export DDNS_PROVIDER_API_TOKEN=your_token
// export DDNS_RECORDS='[{"name":"home.example.com","zoneName":"example.com"}]'
// export DDNS_REFRESH_INTERVAL=120
//
// cfddnsd
// ```

mod admin;
mod config;
mod metrics;
mod notify;

use anyhow::Result;
use cfddns_core::engine::SkipReason;
use cfddns_core::traits::{ConfigRecordSource, Notifier};
use cfddns_core::{
    CurrentIp, PassReport, ReconciliationEngine, RecordSetSlot, RecordStore, Scheduler,
    SchedulerConfig, SchedulerEvent, ShutdownToken, ShutdownTrigger, shutdown_channel,
};
use cfddns_ip_http::HttpIpResolver;
use cfddns_provider_cloudflare::CloudflareProvider;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::admin::AppState;
use crate::config::{Config, LogFormat, RunMode};
use crate::metrics::Metrics;
use crate::notify::WebhookNotifier;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Time the admin server gets to finish after the scheduler stops
const ADMIN_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown
/// - 1: Configuration error
/// - 2: Runtime error (unexpected)
/// - 3: Provider initialization or credential failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
    /// Provider could not be built or rejected the credentials
    InitError = 3,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// A failure together with the exit code it maps to
struct Failure {
    code: DdnsExitCode,
    error: anyhow::Error,
}

impl Failure {
    fn new(code: DdnsExitCode, error: impl Into<anyhow::Error>) -> Self {
        Self {
            code,
            error: error.into(),
        }
    }

    fn runtime(error: impl Into<anyhow::Error>) -> Self {
        Self::new(DdnsExitCode::RuntimeError, error)
    }
}

fn main() -> ExitCode {
    // Load and validate configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = init_tracing(&config) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!(mode = ?config.mode, records = %config.records.describe(), "Starting cfddnsd");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(run(config));

    match result {
        Ok(()) => DdnsExitCode::CleanShutdown.into(),
        Err(failure) => {
            let code = failure.code as u8;
            error!(code, "Daemon error: {:#}", failure.error);
            failure.code.into()
        }
    }
}

fn init_tracing(config: &Config) -> Result<()> {
    let builder = FmtSubscriber::builder().with_max_level(config.log_level);
    match config.log_format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}

/// Wire components and run the configured mode
async fn run(config: Config) -> std::result::Result<(), Failure> {
    let records = config
        .records
        .load()
        .map_err(|e| Failure::new(DdnsExitCode::ConfigError, e))?;
    info!(count = records.len(), "Desired records loaded");

    let mut provider = CloudflareProvider::new(config.api_token.clone())
        .map_err(|e| Failure::new(DdnsExitCode::InitError, e))?;
    if let Some(ref url) = config.api_url {
        provider = provider.with_base_url(url.clone());
    }
    provider
        .verify()
        .await
        .map_err(|e| Failure::new(DdnsExitCode::InitError, e))?;

    let resolver = HttpIpResolver::with_default_sources().map_err(Failure::runtime)?;

    let (trigger, token) = shutdown_channel();
    let store = RecordStore::new();
    let engine = Arc::new(
        ReconciliationEngine::new(Arc::new(provider))
            .with_store(store.clone())
            .with_shutdown(token.clone()),
    );

    let notifier: Option<Arc<dyn Notifier>> = match config.notify_webhook_url {
        Some(ref url) => Some(Arc::new(
            WebhookNotifier::new(url.clone(), config.notify_subject.clone())
                .map_err(|e| Failure::new(DdnsExitCode::InitError, e))?,
        )),
        None => None,
    };

    let scheduler_config = SchedulerConfig {
        poll_interval: config.refresh_interval,
        delete_mode: config.delete_mode,
        ..SchedulerConfig::default()
    };
    let current_ip = CurrentIp::new();
    let (mut scheduler, events) = Scheduler::new(
        Arc::new(resolver),
        engine.clone(),
        Arc::new(ConfigRecordSource::new(config.config_file.clone())),
        RecordSetSlot::new(records.into()),
        scheduler_config,
    );
    scheduler = scheduler.with_current_ip(current_ip.clone());
    if let Some(notifier) = notifier {
        scheduler = scheduler.with_notifier(notifier);
    }

    match config.mode {
        RunMode::OneOff => run_single_pass(scheduler, false).await,
        RunMode::Delete => run_single_pass(scheduler, true).await,
        RunMode::Daemon => {
            let metrics = Metrics::new().map_err(|e| {
                Failure::runtime(anyhow::anyhow!("Failed to register metrics: {}", e))
            })?;
            let metrics = Arc::new(metrics);
            let state = AppState {
                engine,
                store,
                current_ip,
                metrics,
            };
            run_daemon(&config, scheduler, events, state, trigger, token).await
        }
    }
}

/// Resolve once, run one pass, exit
async fn run_single_pass(
    mut scheduler: Scheduler,
    delete_mode: bool,
) -> std::result::Result<(), Failure> {
    let report = scheduler
        .run_once(delete_mode)
        .await
        .map_err(Failure::runtime)?;

    let summary = report.summary();
    info!(
        ip = %report.observation.value,
        created = summary.created,
        updated = summary.updated,
        deleted = summary.deleted,
        skipped = summary.skipped,
        failed = summary.failed,
        "Single pass finished"
    );

    let failures = provider_failures(&report);
    if failures > 0 {
        return Err(Failure::runtime(anyhow::anyhow!(
            "{} provider call(s) failed",
            failures
        )));
    }
    Ok(())
}

/// Failed mutations plus records skipped because the provider failed
fn provider_failures(report: &PassReport) -> usize {
    report
        .records
        .iter()
        .map(|record| {
            let skipped = matches!(record.skip_reason(), Some(SkipReason::ProviderError(_)));
            record.failed() + usize::from(skipped)
        })
        .sum()
}

/// Run the scheduler and the admin API until a termination signal
async fn run_daemon(
    config: &Config,
    scheduler: Scheduler,
    mut events: mpsc::Receiver<SchedulerEvent>,
    state: AppState,
    trigger: ShutdownTrigger,
    token: ShutdownToken,
) -> std::result::Result<(), Failure> {
    let (reload_tx, reload_rx) = mpsc::channel(4);

    let signals = tokio::spawn(forward_signals(reload_tx, trigger.clone()));

    let metrics = state.metrics.clone();
    let event_sink = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            metrics.observe(&event);
        }
    });

    let admin = match config.admin_addr {
        Some(addr) => {
            let state = state.clone();
            let token = token.clone();
            let trigger = trigger.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = admin::bind_and_serve(addr, state, token).await {
                    error!(%addr, error = %e, "Admin API failed, shutting down");
                    trigger.trigger();
                    return Err(e);
                }
                Ok(())
            }))
        }
        None => {
            info!("Admin API disabled");
            None
        }
    };

    scheduler.run(reload_rx, token).await;

    trigger.trigger();
    signals.abort();

    let mut result = Ok(());
    if let Some(admin) = admin {
        match tokio::time::timeout(ADMIN_SHUTDOWN_TIMEOUT, admin).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => result = Err(Failure::runtime(e)),
            Ok(Err(e)) => result = Err(Failure::runtime(e)),
            Err(_) => warn!("Admin API did not stop in time"),
        }
    }

    // Scheduler dropped its sender; the sink drains and ends
    if let Err(e) = event_sink.await {
        warn!(error = %e, "Event sink task failed");
    }

    info!("Shutting down daemon");
    result
}

/// Translate OS signals into reload and shutdown requests
///
/// SIGHUP requests a reload; SIGTERM and SIGINT request shutdown.
#[cfg(unix)]
async fn forward_signals(reload_tx: mpsc::Sender<()>, trigger: ShutdownTrigger) {
    let handlers = (
        signal(SignalKind::hangup()),
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    );
    let (mut sighup, mut sigterm, mut sigint) = match handlers {
        (Ok(hup), Ok(term), Ok(int)) => (hup, term, int),
        _ => {
            error!("Failed to setup signal handlers, shutting down");
            trigger.trigger();
            return;
        }
    };

    loop {
        tokio::select! {
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading records");
                if reload_tx.try_send(()).is_err() {
                    warn!("Reload already pending, ignoring SIGHUP");
                }
            }
            _ = sigterm.recv() => {
                info!("Received shutdown signal: SIGTERM");
                trigger.trigger();
                return;
            }
            _ = sigint.recv() => {
                info!("Received shutdown signal: SIGINT");
                trigger.trigger();
                return;
            }
        }
    }
}

/// Fallback for non-Unix platforms: CTRL-C only, no reload signal
#[cfg(not(unix))]
async fn forward_signals(_reload_tx: mpsc::Sender<()>, trigger: ShutdownTrigger) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal: CTRL-C"),
        Err(e) => error!("Failed to wait for CTRL-C: {}", e),
    }
    trigger.trigger();
}
