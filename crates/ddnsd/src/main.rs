// # ddnsd - DDNS Daemon
//
// Thin integration layer: reads configuration from flags/environment, loads
// the Cloudflare credential, sets up logging, wires the who-am-I IP source
// and the Cloudflare provider into the core scheduler, and turns the outcome
// into a process exit code. No DNS logic lives here.
//
// ## Configuration
//
// Every flag can also be set through its environment variable:
//
// - `--name` / `CLOUDFLARE_DNS_NAME`: record name, `@` for the zone apex
//   (default: lower-cased hostname)
// - `--zone` / `CLOUDFLARE_DNS_ZONE`: zone name (required)
// - `--token` / `CLOUDFLARE_API_TOKEN`: API token
// - `--token-file` / `CLOUDFLARE_API_TOKEN_FILE`: file containing the API token
// - `--proxied` / `CLOUDFLARE_DNS_PROXIED`: proxy traffic through Cloudflare
// - `--interval` / `DDNSD_INTERVAL`: time between reconciliations (default 5m)
// - `--once` / `DDNSD_ONCE`: reconcile once and exit
// - `--refresh-ip` / `DDNSD_REFRESH_IP`: rediscover the IP on every tick
// - `--dry-run` / `DDNSD_DRY_RUN`: log intended changes without making them
// - `--resolver` / `DDNSD_RESOLVER`: who-am-I resolver (default 1.1.1.1:53)
// - `--verbose` / `DDNSD_VERBOSE`: debug logging
// - `--log-format` / `DDNSD_LOG_FORMAT`: `text` or `json`
//
// ## Example
//
// ```bash
// export CLOUDFLARE_API_TOKEN_FILE=/run/secrets/cloudflare
// ddnsd --zone example.com --name home --interval 10m
// ```
//
// ## Exit codes
//
// - 0: clean shutdown (signal or one-shot run)
// - 1: any configuration, discovery or provider error

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ddns_core::config::{DdnsConfig, DesiredState, EngineConfig, IpRefresh};
use ddns_core::{EngineEvent, RunSummary, Scheduler};
use ddns_ip_whoami::{DEFAULT_RESOLVER, WhoamiIpSource};
use ddns_provider_cloudflare::CloudflareProvider;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Instrument, Level, Span, debug, error, info, info_span, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (signal or one-shot run)
    CleanShutdown = 0,
    /// Any configuration or runtime error
    Failure = 1,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Keep one Cloudflare A record pointed at this host's public IPv4 address
#[derive(Debug, Parser)]
#[command(name = "ddnsd", version, about)]
struct Cli {
    /// DNS record name (or @ for the zone apex); defaults to the hostname
    #[arg(long, env = "CLOUDFLARE_DNS_NAME")]
    name: Option<String>,

    /// Cloudflare zone name (required)
    #[arg(long, env = "CLOUDFLARE_DNS_ZONE")]
    zone: Option<String>,

    /// Cloudflare API token
    #[arg(long, env = "CLOUDFLARE_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Path to a file containing the Cloudflare API token
    #[arg(long, env = "CLOUDFLARE_API_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// Enable the Cloudflare proxy for the record
    #[arg(long, env = "CLOUDFLARE_DNS_PROXIED")]
    proxied: bool,

    /// Interval between updates (e.g. 30s, 5m, 1h)
    #[arg(long, env = "DDNSD_INTERVAL", default_value = "5m", value_parser = humantime::parse_duration)]
    interval: Duration,

    /// Run the update once and exit
    #[arg(long, env = "DDNSD_ONCE")]
    once: bool,

    /// Rediscover the public IP before every update instead of once at startup
    #[arg(long, env = "DDNSD_REFRESH_IP")]
    refresh_ip: bool,

    /// Log the intended changes without creating or updating records
    #[arg(long, env = "DDNSD_DRY_RUN")]
    dry_run: bool,

    /// Resolver answering the who-am-I query
    #[arg(long, env = "DDNSD_RESOLVER", default_value_t = DEFAULT_RESOLVER)]
    resolver: SocketAddr,

    /// Enable verbose logging
    #[arg(long, short = 'v', env = "DDNSD_VERBOSE")]
    verbose: bool,

    /// Log output format
    #[arg(long, env = "DDNSD_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Cli {
    /// Build the core configuration
    ///
    /// Every check here runs before any network activity.
    fn to_config(&self) -> ddns_core::Result<DdnsConfig> {
        let zone = self
            .zone
            .as_deref()
            .map(str::trim)
            .filter(|z| !z.is_empty())
            .ok_or_else(|| ddns_core::Error::config("zone is required (--zone or CLOUDFLARE_DNS_ZONE)"))?;

        let name = match self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => default_record_name()?,
        };

        let config = DdnsConfig {
            desired: DesiredState::new(name, zone, self.proxied),
            engine: EngineConfig {
                interval: self.interval,
                once: self.once,
                ip_refresh: if self.refresh_ip {
                    IpRefresh::EveryTick
                } else {
                    IpRefresh::Startup
                },
                dry_run: self.dry_run,
                ..EngineConfig::default()
            },
        };

        config.validate()?;
        Ok(config)
    }
}

fn default_record_name() -> ddns_core::Result<String> {
    let host = hostname::get()
        .map_err(|e| ddns_core::Error::config(format!("failed to get OS hostname: {}", e)))?;
    Ok(host.to_string_lossy().to_lowercase())
}

/// Resolve the API token: an explicit token wins over the token file
fn resolve_token(token: Option<&str>, token_file: Option<&Path>) -> ddns_core::Result<String> {
    if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }

    let Some(path) = token_file else {
        return Err(ddns_core::Error::config(
            "Cloudflare API token is required (--token, CLOUDFLARE_API_TOKEN or --token-file)",
        ));
    };

    let contents = std::fs::read_to_string(path).map_err(|e| {
        ddns_core::Error::config(format!("failed to read token file {}: {}", path.display(), e))
    })?;

    let token = contents.trim();
    if token.is_empty() {
        return Err(ddns_core::Error::config(format!(
            "token file {} is empty",
            path.display()
        )));
    }
    Ok(token.to_string())
}

/// Exit code for a command-line parse result: help/version are clean exits,
/// anything else is a configuration error
fn exit_code_for(err: &clap::Error) -> DdnsExitCode {
    if err.exit_code() == 0 {
        DdnsExitCode::CleanShutdown
    } else {
        DdnsExitCode::Failure
    }
}

fn init_tracing(verbose: bool, format: LogFormat) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = FmtSubscriber::builder().with_max_level(level);

    match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    }
    .context("failed to set tracing subscriber")
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help/--version are printed to stdout, usage errors to stderr
            let _ = e.print();
            return exit_code_for(&e).into();
        }
    };

    if let Err(e) = init_tracing(cli.verbose, cli.log_format) {
        eprintln!("{:#}", e);
        return DdnsExitCode::Failure.into();
    }

    // Single logical thread of control; ticks never overlap
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::Failure.into();
        }
    };

    match rt.block_on(run_daemon(cli)) {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                last_ip = %summary.last_ip,
                reason = ?summary.stop_reason,
                "ddnsd stopped"
            );
            DdnsExitCode::CleanShutdown.into()
        }
        Err(e) => {
            error!(kind = error_kind(&e), "{:#}", e);
            DdnsExitCode::Failure.into()
        }
    }
}

/// Category of a fatal error, for the last log line
fn error_kind(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<ddns_core::Error>()
        .map(ddns_core::Error::kind)
        .unwrap_or("internal")
}

/// Run the daemon
async fn run_daemon(cli: Cli) -> Result<RunSummary> {
    let config = cli.to_config().context("invalid configuration")?;
    let token = resolve_token(cli.token.as_deref(), cli.token_file.as_deref())
        .context("invalid configuration")?;

    let span = info_span!(
        "ddnsd",
        name = %config.desired.name,
        zone = %config.desired.zone,
        ip = tracing::field::Empty,
    );

    let provider = CloudflareProvider::new(token).context("invalid configuration")?;
    let ip_source = WhoamiIpSource::new().with_resolver(cli.resolver);

    // Handlers must be live before the first tick: a signal during a tick
    // waits for it to finish instead of killing the process
    let signals = shutdown_signal()?;

    async move {
        info!(
            fqdn = %config.desired.fqdn(),
            proxied = config.desired.proxied,
            interval = %humantime::format_duration(config.engine.interval),
            once = config.engine.once,
            dry_run = config.engine.dry_run,
            resolver = %cli.resolver,
            "Starting ddnsd"
        );

        let (scheduler, events) = Scheduler::new(Box::new(ip_source), Box::new(provider), config)?;
        let drain = tokio::spawn(log_events(events, Span::current()).in_current_span());

        let shutdown = async {
            let name = signals.await;
            info!("Received shutdown signal: {}", name);
        };

        let result = scheduler.run_until(shutdown).await;

        // Closing the channel ends the drain task
        drop(scheduler);
        if let Err(e) = drain.await {
            warn!("Event log task failed: {}", e);
        }

        result.context("reconciliation failed")
    }
    .instrument(span)
    .await
}

/// Forward engine events to the log and keep the span's `ip` field current
async fn log_events(mut events: mpsc::Receiver<EngineEvent>, span: Span) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::Started { fqdn } => debug!(%fqdn, "scheduler started"),
            EngineEvent::IpDiscovered { ip } => {
                span.record("ip", tracing::field::display(ip));
            }
            EngineEvent::Reconciled { tick, decision } => {
                debug!(tick, %decision, "tick complete");
            }
            EngineEvent::Stopped { reason } => debug!(%reason, "scheduler stopped"),
        }
    }
}

/// Install SIGTERM/SIGINT handlers now; the returned future resolves with
/// the name of the first signal received
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    let mut sigterm = signal(SignalKind::terminate()).context("failed to set up SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to set up SIGINT handler")?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Install the Ctrl-C handler now
#[cfg(windows)]
fn shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    let mut ctrl_c =
        tokio::signal::windows::ctrl_c().context("failed to set up Ctrl-C handler")?;

    Ok(async move {
        ctrl_c.recv().await;
        "SIGINT"
    })
}
