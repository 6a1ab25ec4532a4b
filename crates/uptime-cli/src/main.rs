mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, EnvFilter};

use uptime_core::{
    notification_channel, ChannelSink, CheckInterval, EngineConfig, FanoutSink, HealthProbe,
    HttpProbe, MemoryStore, MonitoredResource, MonitoringEngine, Notification, NotificationKind,
    NotificationLog, NotificationSink, ProbeResult, ResourceStatus, ResourceStore, WebhookConfig,
    WebhookDispatcher,
};

use crate::config::AppConfig;

/// Website uptime monitor: periodic reachability checks with transition alerts.
#[derive(Parser)]
#[command(name = "uptime-monitor", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server and monitor every configured website.
    Serve {
        /// Listen address (e.g. 0.0.0.0:8080). Overrides config file.
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Probe one or more URLs once and print the results.
    Check {
        /// URLs to probe.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Probe timeout in milliseconds.
        #[arg(long, default_value_t = 10_000)]
        timeout: u64,

        /// Maximum number of probes in flight.
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Print results as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Monitor a single website from the command line (no API server).
    Watch {
        /// Website URL to monitor.
        url: String,

        /// Check interval: 1min, 5min or 30min.
        #[arg(long, default_value = "1min")]
        interval: CheckInterval,

        /// Probe timeout in milliseconds.
        #[arg(long, default_value_t = 10_000)]
        timeout: u64,

        /// Optional webhook URL to POST notifications to.
        #[arg(long)]
        webhook_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { listen, config } => run_serve(listen, config).await,
        Commands::Check {
            urls,
            timeout,
            concurrency,
            json,
        } => {
            init_quiet_tracing();
            run_check(urls, timeout, concurrency, json).await
        }
        Commands::Watch {
            url,
            interval,
            timeout,
            webhook_url,
        } => {
            init_quiet_tracing();
            run_watch(url, interval, timeout, webhook_url).await
        }
    }
}

async fn run_serve(listen_override: Option<SocketAddr>, config_path: Option<PathBuf>) -> ExitCode {
    let app_config = if let Some(ref path) = config_path {
        match AppConfig::load(path) {
            Ok(c) => {
                init_tracing(&c.server.log_format);
                tracing::info!(path = %path.display(), "Loaded config file");
                c
            }
            Err(e) => {
                init_tracing("pretty");
                tracing::error!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        init_tracing("pretty");
        AppConfig::default()
    };

    let listen = listen_override.unwrap_or(app_config.server.listen);
    let engine_config = app_config.defaults.to_engine_config();

    let client = match HttpProbe::build_client(&engine_config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };
    let probe: Arc<dyn HealthProbe> = Arc::new(HttpProbe::with_client(
        client.clone(),
        engine_config.probe_timeout,
    ));

    let (notification_tx, notification_rx) = notification_channel();
    let notifications = Arc::new(NotificationLog::new(engine_config.notification_limit));
    let sink = FanoutSink::new()
        .with_sink(notifications.clone())
        .with_sink(Arc::new(ChannelSink::new(notification_tx)));

    let webhook_handle = if !app_config.webhook.is_empty() {
        let dispatcher =
            WebhookDispatcher::new(notification_rx, app_config.webhook.clone(), client);
        tracing::info!(count = app_config.webhook.len(), "Webhook dispatcher started");
        tokio::spawn(dispatcher.run())
    } else {
        tokio::spawn(async move {
            let mut rx = notification_rx;
            while rx.recv().await.is_some() {}
        })
    };

    let store: Arc<dyn ResourceStore> = Arc::new(MemoryStore::new());
    let engine = MonitoringEngine::new(store.clone(), probe, Arc::new(sink));

    for def in &app_config.website {
        match store.insert(def.to_resource()).await {
            Ok(r) => tracing::info!(website_id = %r.id, url = %r.target_url, "Website loaded from config"),
            Err(e) => tracing::error!(url = %def.url, error = %e, "Failed to load website"),
        }
    }
    match engine.start_all().await {
        Ok(started) => tracing::info!(started, "Monitoring started"),
        Err(e) => tracing::error!(error = %e, "Failed to start monitoring"),
    }

    let state = uptime_api::state::AppState::new(engine, store, notifications);

    tracing::info!(%listen, "Starting uptime monitor API server");
    if let Err(e) = uptime_api::serve_with_state(listen, state, uptime_api::shutdown_signal()).await
    {
        tracing::error!(error = %e, "Server failed");
        return ExitCode::FAILURE;
    }

    // The channel closes once the last engine clone (held by exiting timer
    // tasks) is dropped.
    if join_or_abort(webhook_handle, Duration::from_secs(5)).await {
        tracing::info!("Webhook dispatcher shut down");
    } else {
        tracing::warn!("Webhook dispatcher did not shut down in time, aborted");
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}

/// Wait up to `grace` for `handle`, aborting the task if it is still running.
/// Returns whether it finished on its own.
async fn join_or_abort(mut handle: JoinHandle<()>, grace: Duration) -> bool {
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(_) => true,
        Err(_) => {
            handle.abort();
            false
        }
    }
}

#[derive(Serialize)]
struct CheckRow {
    url: String,
    #[serde(flatten)]
    result: ProbeResult,
}

async fn run_check(urls: Vec<String>, timeout_ms: u64, concurrency: usize, json: bool) -> ExitCode {
    for u in &urls {
        if let Err(e) = validate_url(u) {
            eprintln!("{} {}", style("error:").red().bold(), e);
            return ExitCode::from(2);
        }
    }

    let config = EngineConfig::default()
        .with_probe_timeout(timeout_ms)
        .with_max_concurrent_probes(concurrency);
    let probe = match HttpProbe::new(&config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{} failed to build HTTP client: {}", style("error:").red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let bar = if json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(urls.len() as u64).with_style(
            ProgressStyle::with_template("{spinner} probing {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        )
    };
    bar.enable_steady_tick(Duration::from_millis(100));

    let probe = &probe;
    let rows: Vec<CheckRow> = stream::iter(urls)
        .map(|url| async move {
            let result = probe.probe(&url).await;
            CheckRow { url, result }
        })
        .buffered(config.max_concurrent_probes)
        .inspect(|_| bar.inc(1))
        .collect()
        .await;
    bar.finish_and_clear();

    let all_online = rows.iter().all(|r| r.result.is_online);

    if json {
        match serde_json::to_string_pretty(&rows) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("{} {}", style("error:").red().bold(), e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        let width = rows.iter().map(|r| r.url.len()).max().unwrap_or(0);
        for row in &rows {
            println!("{}", format_check_row(row, width));
        }
    }

    if all_online {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn format_check_row(row: &CheckRow, width: usize) -> String {
    let r = &row.result;
    let status = if r.is_online {
        style(format!("{:<8}", ResourceStatus::Online.as_str())).green()
    } else {
        style(format!("{:<8}", ResourceStatus::Offline.as_str())).red()
    };
    let detail = match (r.status_code, &r.error_detail) {
        (Some(code), _) => format!("HTTP {}", code),
        (None, Some(err)) => err.clone(),
        (None, None) => String::new(),
    };
    format!(
        "  {}  {:<width$}  {:>6}ms  {}",
        status,
        row.url,
        r.response_time_ms,
        style(detail).dim(),
        width = width
    )
}

async fn run_watch(
    url: String,
    interval: CheckInterval,
    timeout_ms: u64,
    webhook_url: Option<String>,
) -> ExitCode {
    if let Err(e) = validate_url(&url) {
        eprintln!("{} {}", style("error:").red().bold(), e);
        return ExitCode::from(2);
    }

    let config = EngineConfig::default().with_probe_timeout(timeout_ms);
    let client = match HttpProbe::build_client(&config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} failed to build HTTP client: {}", style("error:").red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let (console_tx, mut console_rx) = notification_channel();
    let mut sink = FanoutSink::new().with_sink(Arc::new(ChannelSink::new(console_tx)));
    if let Some(ref wh_url) = webhook_url {
        let (tx, rx) = notification_channel();
        let dispatcher =
            WebhookDispatcher::new(rx, vec![WebhookConfig::new(wh_url.clone())], client.clone());
        tokio::spawn(dispatcher.run());
        sink = sink.with_sink(Arc::new(ChannelSink::new(tx)));
    }
    let sink: Arc<dyn NotificationSink> = Arc::new(sink);

    let store = Arc::new(MemoryStore::new());
    let probe = Arc::new(HttpProbe::with_client(client, config.probe_timeout));
    let engine = MonitoringEngine::new(store.clone(), probe, sink);

    let resource = MonitoredResource::new("cli", url.clone(), url.clone(), interval);
    let resource = match store.insert(resource).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            return ExitCode::FAILURE;
        }
    };

    let multi = MultiProgress::new();
    let msg_style = ProgressStyle::with_template("{wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());

    multi
        .println(format!(
            "{} {}",
            style("uptime-monitor").bold(),
            style(env!("CARGO_PKG_VERSION")).dim()
        ))
        .ok();
    multi
        .println(format!("  {} {}", style("url:     ").dim(), style(&url).bold()))
        .ok();
    multi
        .println(format!("  {} {}", style("interval:").dim(), interval))
        .ok();
    multi
        .println(format!("  {} {}ms", style("timeout: ").dim(), timeout_ms))
        .ok();
    if let Some(ref wh) = webhook_url {
        multi
            .println(format!("  {} {}", style("webhook: ").dim(), wh))
            .ok();
    }
    multi.println("").ok();
    multi
        .println(format!("{}", style("Press Ctrl+C to stop").dim()))
        .ok();
    multi.println("").ok();

    if let Err(e) = engine.start(resource.clone()).await {
        eprintln!("{} {}", style("error:").red().bold(), e);
        return ExitCode::FAILURE;
    }

    let status_bar = multi.add(ProgressBar::new_spinner().with_style(msg_style));
    status_bar.set_message(format!(
        "{}\n  {}",
        format_separator(0),
        style("Waiting for first check...").dim()
    ));

    let mut last_total = 0u64;
    let mut refresh = tokio::time::interval(Duration::from_secs(1));

    let shutdown = uptime_api::shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = refresh.tick() => {}
            Some(notification) = console_rx.recv() => {
                multi.println(format_transition(&notification)).ok();
                continue;
            }
            _ = &mut shutdown => {
                status_bar.finish_and_clear();
                engine.cleanup().await;
                multi.println(format!("\n{}", style("Monitor stopped.").dim())).ok();
                return ExitCode::SUCCESS;
            }
        }

        let current = match store.get(&resource.id).await {
            Ok(Some(r)) => r,
            _ => continue,
        };

        if current.total_checks > last_total {
            last_total = current.total_checks;
            let ts = current
                .last_checked_at
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_default();
            multi
                .println(format!(
                    "  {}  {}  {:>6}ms",
                    style(ts).dim(),
                    styled_status(current.status),
                    current.response_time_ms
                ))
                .ok();
        }

        status_bar.set_message(format!(
            "{}\n  {}  uptime {:.2}%  checks {} ({} ok / {} failed)",
            format_separator(current.total_checks),
            styled_status(current.status),
            current.uptime_percentage(),
            current.total_checks,
            current.successful_checks,
            current.failed_checks,
        ));
    }
}

fn format_transition(n: &Notification) -> String {
    let ts = n.created_at.format("%H:%M:%S");
    let title = match n.kind {
        NotificationKind::WebsiteOffline => style(n.title.as_str()).red().bold(),
        NotificationKind::WebsiteOnline => style(n.title.as_str()).green().bold(),
    };
    format!("  {}  {}  {}", style(ts).dim(), title, n.message)
}

fn styled_status(status: ResourceStatus) -> console::StyledObject<String> {
    let label = format!("{:<8}", status.as_str());
    match status {
        ResourceStatus::Online => style(label).green(),
        ResourceStatus::Offline => style(label).red(),
        ResourceStatus::Warning => style(label).yellow(),
    }
}

fn format_separator(check_num: u64) -> String {
    let label = if check_num == 0 {
        String::new()
    } else {
        format!(" check {} ", check_num)
    };
    let width = 54usize.saturating_sub(label.len());
    format!(
        "{}{}{}",
        style("──").dim(),
        style(label).dim().bold(),
        style("─".repeat(width)).dim()
    )
}

fn validate_url(raw: &str) -> Result<(), String> {
    let parsed = url::Url::parse(raw).map_err(|e| format!("invalid URL '{}': {}", raw, e))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported scheme '{}' in {}", other, raw)),
    }
}

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_format {
        "json" => fmt().with_env_filter(filter).json().init(),
        _ => fmt().with_env_filter(filter).init(),
    }
}

/// Interactive commands only surface warnings so log lines do not fight the
/// progress output.
fn init_quiet_tracing() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}
