use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use powerwatch::config::AppConfig;
use powerwatch::models::Track;
use powerwatch::monitor::engine::ChangeDetectionEngine;
use powerwatch::monitor::fetcher::HttpFetcher;
use powerwatch::monitor::liveness::TcpProbe;
use powerwatch::monitor::scheduler::Scheduler;
use powerwatch::notifications::dispatcher::NotificationDispatcher;
use powerwatch::notifications::senders::Notifier;
use powerwatch::notifications::senders::log::LogNotifier;
use powerwatch::notifications::senders::telegram::TelegramNotifier;
use powerwatch::store::SubjectStore;
use powerwatch::store::file::JsonFileStore;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "powerwatch.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let config = match AppConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&config.log_dir);
    info!(version = env!("CARGO_PKG_VERSION"), store = %config.store_path, "Starting powerwatch.");

    let store: Arc<dyn SubjectStore> = Arc::new(JsonFileStore::new(
        config.store_path.clone(),
        config.subject_defaults(),
    ));
    let engine = Arc::new(ChangeDetectionEngine::new(store.clone()));
    let probe = Arc::new(TcpProbe::new(config.probe_timeout()));
    let fetcher = match HttpFetcher::new(config.retry_policy()) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => {
            error!(error = %e, "Failed to build HTTP client.");
            return Err(e.into());
        }
    };

    let notifier: Arc<dyn Notifier> = match &config.telegram_bot_token {
        Some(token) => Arc::new(TelegramNotifier::new(token.clone())),
        None => {
            info!("No Telegram bot token configured; notifications will only be logged.");
            Arc::new(LogNotifier)
        }
    };
    let (dispatcher, event_sender) = NotificationDispatcher::new(notifier, config.dispatch_timeouts());
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    let scheduler = Arc::new(Scheduler::new(
        store,
        engine,
        probe,
        fetcher,
        event_sender,
        config.scheduler_settings(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let liveness_handle = tokio::spawn(scheduler.clone().run_loop(Track::Liveness, shutdown_rx.clone()));
    let content_handle = tokio::spawn(scheduler.clone().run_loop(Track::Content, shutdown_rx));
    // The dispatcher exits once the last event sender, owned by the scheduler, is gone.
    drop(scheduler);

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down.");
    shutdown_tx.send(()).ok();

    for (name, handle) in [("liveness", liveness_handle), ("content", content_handle)] {
        if let Err(e) = handle.await {
            error!(track = name, error = %e, "Track loop ended abnormally.");
        }
    }
    if let Err(e) = dispatcher_handle.await {
        error!(error = %e, "Notification dispatcher ended abnormally.");
    }

    info!("Shutdown complete.");
    Ok(())
}
