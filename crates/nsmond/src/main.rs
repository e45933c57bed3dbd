// # nsmond - Nameserver Monitor Daemon
//
// This is a THIN integration layer:
// - DO NOT add detection, history or alerting logic here
// - All monitor logic lives in nsmon-core; integrations live in plugin crates
//
// The daemon is responsible for:
// 1. Reading configuration (YAML file + environment overrides)
// 2. Initializing tracing and the runtime
// 3. Registering plugins and building components through the registry
// 4. Running the zone scheduler and the acknowledgment callback listener
// 5. Draining in-flight checks on SIGTERM/SIGINT
//
// `nsmond --test-notify` instead sends one sample alert through the configured
// notifier and exits.
//
// ## Configuration
//
// - `NSMON_CONFIG`: YAML configuration file (default `config.yaml`)
// - `NSMON_CLOUDFLARE_API_TOKEN`: Cloudflare API token (selects the Cloudflare zone source)
// - `NSMON_SLACK_WEBHOOK_URL`: Default Slack webhook (selects the Slack notifier)
// - `NSMON_STATE_PATH`: History directory (default `data/nameserver_history`)
// - `NSMON_LISTEN_ADDR`: Callback listener address (default `0.0.0.0:3000`)
// - `NSMON_LOG_LEVEL`: trace, debug, info, warn, error (default `info`)
//
// ## Example
//
// ```bash
// export NSMON_CONFIG=/etc/nsmon/config.yaml
// export NSMON_CLOUDFLARE_API_TOKEN=your_token
// export NSMON_SLACK_WEBHOOK_URL=https://hooks.slack.com/services/...
// export NSMON_STATE_PATH=/var/lib/nsmon/history
//
// nsmond
// ```

mod callback;
mod config;
mod test_notify;

use anyhow::{Context, Result};
use clap::Parser;
use nsmon_core::{
    AckHandler, CheckEvent, HistoryStore, NameserverResolver, Notifier, ProviderRegistry,
    ZoneChecker, ZoneScheduler, ZoneSource,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::config::DaemonConfig;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long in-flight checks get to finish after a shutdown signal
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum NsmonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<NsmonExitCode> for ExitCode {
    fn from(code: NsmonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Command line; everything else is configured through the environment
#[derive(Debug, Parser)]
#[command(name = "nsmond")]
#[command(about = "Hosted-zone nameserver change monitor")]
struct Cli {
    /// Send one sample alert through the configured notifier and exit
    #[arg(long)]
    test_notify: bool,
}

/// Components built from configuration
struct Components {
    checker: Arc<ZoneChecker>,
    events: mpsc::Receiver<CheckEvent>,
    ack: Arc<AckHandler>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match DaemonConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return NsmonExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return NsmonExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return NsmonExitCode::ConfigError.into();
    }

    info!("Starting nsmond daemon");
    info!(
        config = %config.config_path.display(),
        zones = config.monitor.zones.len(),
        "Configuration loaded"
    );
    if !config.monitor.history_store.is_persistent() {
        warn!(
            "History store is in memory: snapshots are lost on restart and changes made \
            while nsmond is down will not be alerted"
        );
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return NsmonExitCode::RuntimeError.into();
        }
    };

    if cli.test_notify {
        return rt.block_on(run_test_notify(&config)).into();
    }

    let result = rt.block_on(async {
        let components = match build_components(&config).await {
            Ok(components) => components,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return NsmonExitCode::ConfigError;
            }
        };

        if let Err(e) = run_daemon(config, components).await {
            error!("Daemon error: {:#}", e);
            NsmonExitCode::RuntimeError
        } else {
            NsmonExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Registry with the built-ins and every compiled-in plugin
fn plugin_registry() -> ProviderRegistry {
    let registry = ProviderRegistry::with_builtins();

    #[cfg(feature = "cloudflare")]
    {
        info!("Registering Cloudflare zone source");
        nsmon_zone_cloudflare::register(&registry);
    }
    nsmon_resolver_hickory::register(&registry);
    nsmon_notify_slack::register(&registry);

    registry
}

/// Send a sample alert for the first configured zone
async fn run_test_notify(config: &DaemonConfig) -> NsmonExitCode {
    let registry = plugin_registry();
    let notifier = match registry.create_notifier(&config.monitor.notifier) {
        Ok(notifier) => notifier,
        Err(e) => {
            error!("Failed to create notifier: {}", e);
            return NsmonExitCode::ConfigError;
        }
    };

    // validate() guarantees at least one zone
    let zones = config.monitor.resolved_zones();
    let Some(zone) = zones.first() else {
        return NsmonExitCode::ConfigError;
    };

    let timeout = config.monitor.checker.call_timeout();
    match test_notify::send_test_alert(notifier.as_ref(), zone, timeout).await {
        Ok(()) => NsmonExitCode::CleanShutdown,
        Err(e) => {
            error!("{:#}", e);
            NsmonExitCode::ConfigError
        }
    }
}

/// Register plugins and build every component through the registry
async fn build_components(config: &DaemonConfig) -> Result<Components> {
    let monitor = &config.monitor;
    let registry = plugin_registry();

    let zone_source: Arc<dyn ZoneSource> = Arc::from(
        registry
            .create_zone_source(&monitor.zone_source)
            .context("Failed to create zone source")?,
    );
    let notifier: Arc<dyn Notifier> = Arc::from(
        registry
            .create_notifier(&monitor.notifier)
            .context("Failed to create notifier")?,
    );
    let store: Arc<dyn HistoryStore> = Arc::from(
        registry
            .create_history_store(&monitor.history_store, &monitor.retention)
            .await
            .context("Failed to open history store")?,
    );
    let resolver: Arc<dyn NameserverResolver> = Arc::from(
        registry
            .create_resolver(&monitor.resolver)
            .context("Failed to create resolver")?,
    );

    info!(
        zone_source = zone_source.source_name(),
        resolver = monitor.resolver.type_name(),
        notifier = notifier.notifier_name(),
        history_store = monitor.history_store.type_name(),
        "Components created"
    );

    let (checker, events) = ZoneChecker::new(zone_source, resolver, store.clone(), notifier.clone())
        .with_call_timeout(monitor.checker.call_timeout())
        .with_events(monitor.checker.event_channel_capacity);

    let ack = AckHandler::new(store).with_notifier(notifier);

    Ok(Components {
        checker: Arc::new(checker),
        events,
        ack: Arc::new(ack),
    })
}

/// Run the daemon until a shutdown signal
async fn run_daemon(config: DaemonConfig, components: Components) -> Result<()> {
    let Components {
        checker,
        mut events,
        ack,
    } = components;
    let shutdown = CancellationToken::new();

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "Check event");
        }
    });

    let zones = config.monitor.resolved_zones();
    for zone in &zones {
        info!(
            zone = %zone.name,
            environment = %zone.environment,
            interval_secs = zone.poll_interval_secs,
            "Monitoring zone"
        );
    }

    let scheduler =
        Arc::new(ZoneScheduler::new(checker, zones).with_cancellation(shutdown.clone()));
    let mut scheduler_task = tokio::spawn(scheduler.run());

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "Callback listener started");

    let server_shutdown = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, callback::router(ack))
            .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
            .await
    });

    tokio::select! {
        signal = wait_for_shutdown() => {
            info!("Received shutdown signal: {}", signal?);
        }
        result = &mut server => {
            shutdown.cancel();
            return match result {
                Ok(Ok(())) => Err(anyhow::anyhow!("Callback listener stopped unexpectedly")),
                Ok(Err(e)) => Err(anyhow::anyhow!("Callback listener failed: {}", e)),
                Err(e) => Err(anyhow::anyhow!("Callback listener panicked: {}", e)),
            };
        }
        result = &mut scheduler_task => {
            shutdown.cancel();
            return match result {
                Ok(Ok(())) => Err(anyhow::anyhow!("Scheduler stopped unexpectedly")),
                Ok(Err(e)) => Err(anyhow::anyhow!("Scheduler failed: {}", e)),
                Err(e) => Err(anyhow::anyhow!("Scheduler panicked: {}", e)),
            };
        }
    }

    info!("Shutting down, draining in-flight checks");
    shutdown.cancel();

    match tokio::time::timeout(DRAIN_TIMEOUT, scheduler_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => return Err(anyhow::anyhow!("Failed to flush history: {}", e)),
        Ok(Err(e)) => return Err(anyhow::anyhow!("Scheduler panicked: {}", e)),
        Err(_) => {
            return Err(anyhow::anyhow!(
                "Shutdown timeout after {:?}",
                DRAIN_TIMEOUT
            ));
        }
    }

    if let Ok(Err(e)) = server.await {
        warn!("Callback listener error during shutdown: {}", e);
    }

    info!("nsmond stopped");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
