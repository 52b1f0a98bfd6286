mod core;
mod fixture;
mod http;
mod settings_client;
mod status;

use std::path::PathBuf;

use catjam_proto::config::Config;
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::status::{StatusSnapshot, WarningLog};

#[derive(Parser, Debug)]
#[command(name = "catjam-daemon", version, about = "Keeps the CatJam overlay in step with the host player")]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON page fixture to drive instead of the configured one
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Do not start the status API
    #[arg(long)]
    no_http: bool,
}

/// A custom tracing layer that keeps recent WARN/ERROR lines for the status API
struct WarningLayer {
    log: WarningLog,
}

impl WarningLayer {
    fn new(log: WarningLog) -> Self {
        Self { log }
    }
}

impl<S> tracing_subscriber::Layer<S> for WarningLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = event.metadata().level();
        if !matches!(*level, tracing::Level::WARN | tracing::Level::ERROR) {
            return;
        }

        let mut message = String::new();
        let now = chrono::Local::now();
        message.push_str(&format!("{} ", now.format("%H:%M:%S")));
        message.push_str(&format!("[{}] ", level));

        let mut visitor = MessageVisitor(&mut message);
        event.record(&mut visitor);

        self.log.push(message);
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl<'a> tracing::field::Visit for MessageVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

// Single-threaded: the engine state and the page are owned by one loop.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let warnings = WarningLog::default();

    // Setup file logging + warning capture
    let data_dir = catjam_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = catjam_proto::platform::log_path();

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(WarningLayer::new(warnings.clone()))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,catjam_daemon=debug,catjam_engine=debug")
            }),
        )
        .init();

    info!("Log file: {:?}", log_path);

    let config_path = args.config.clone().unwrap_or_else(Config::config_path);
    let mut config = Config::load_from(&config_path)?;
    info!("Config loaded from: {:?}", config_path);
    if let Some(fixture) = args.fixture {
        config.host.fixture = Some(fixture);
    }
    if args.no_http {
        config.http.enabled = false;
    }
    match &config.host.fixture {
        Some(path) => info!("Driving page fixture {:?}", path),
        None => info!("No page fixture configured; the overlay stays removed"),
    }

    // Event channel: tickers, fetches and signals all funnel into SchedulerCore
    let (event_tx, event_rx) = tokio::sync::mpsc::channel::<core::SchedulerEvent>(256);
    let (status_tx, status_rx) = tokio::sync::watch::channel(StatusSnapshot::default());

    let scheduler = core::SchedulerCore::new(&config, event_tx.clone(), status_tx, warnings);

    if config.http.enabled {
        let _http_handle = http::start_server(
            config.http.bind_address.clone(),
            config.http.port,
            status_rx,
        );
    }

    let shutdown_tx = event_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            let _ = shutdown_tx.send(core::SchedulerEvent::Shutdown).await;
        }
    });
    drop(event_tx);

    info!("Daemon initialised, running event loop");
    scheduler.run(event_rx).await?;

    Ok(())
}
