//! Birthday bot binary.
//!
//! Loads the config, opens the birthday table, connects to Discord and runs
//! the daily sweep until interrupted.

use anyhow::Context;
use cakeday::birthday::BirthdayStore;
use cakeday::celebration::CelebrationNotifier;
use cakeday::channels::discord::DiscordAdapter;
use cakeday::channels::memory::MemoryPlatform;
use cakeday::channels::start_runtime;
use cakeday::channels::traits::{ChannelAdapter, ChatPlatform};
use cakeday::commands::CommandServices;
use cakeday::config::{CakedayConfig, LoggingConfig};
use cakeday::scheduler::{BirthdaySweeper, Clock};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "cakeday", version, about)]
struct Cli {
    /// Config file path (defaults to the platform config directory).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single birthday sweep and exit.
    #[arg(long)]
    check_now: bool,

    /// With --check-now: sweep against an in-memory platform and print what
    /// would have been sent.
    #[arg(long, requires = "check_now")]
    dry_run: bool,

    /// Write the default config to the config path and exit.
    #[arg(long, conflicts_with = "check_now")]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(CakedayConfig::default_config_path);

    if cli.init_config {
        CakedayConfig::default()
            .save_to_file(&config_path)
            .with_context(|| format!("writing {}", config_path.display()))?;
        println!("wrote default config to {}", config_path.display());
        return Ok(());
    }

    let config = CakedayConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let _log_guard = init_logging(&config.logging);
    tracing::info!(config = %config_path.display(), "cakeday starting");

    let store = Arc::new(
        BirthdayStore::open(config.store.resolved_path()).context("opening birthday table")?,
    );
    tracing::info!(
        venues = store.venue_count(),
        members = store.member_count(),
        "birthday table loaded"
    );

    if cli.dry_run {
        return dry_run(store, &config).await;
    }

    let token = config.discord.read_token().with_context(|| {
        format!(
            "no Discord bot token; set the {} environment variable",
            config.discord.token_env
        )
    })?;
    let adapter = Arc::new(DiscordAdapter::new(token, &config.discord));
    let platform: Arc<dyn ChatPlatform> = adapter.clone();
    let notifier = CelebrationNotifier::new(platform, config.celebration.clone());
    let sweeper = Arc::new(BirthdaySweeper::new(
        Arc::clone(&store),
        notifier.clone(),
        &config.sweep,
    ));

    if cli.check_now {
        let report = sweeper.trigger_now().await?;
        println!("{}", report.summary());
        return Ok(());
    }

    let clock: Clock = Arc::new(chrono::Utc::now);
    let services = CommandServices {
        store,
        notifier,
        sweeper: Arc::clone(&sweeper),
        clock,
        prefix: config.discord.command_prefix.clone(),
    };

    match adapter.health_check().await {
        Ok(true) => tracing::info!("discord token accepted"),
        Ok(false) => tracing::warn!("discord rejected the bot token; commands will not work"),
        Err(e) => tracing::warn!("discord health check failed: {e}"),
    }

    let sweep_task = Arc::clone(&sweeper).spawn();
    let runtime = start_runtime(
        adapter,
        services,
        Duration::from_secs(config.discord.reconnect_delay_secs),
    );

    wait_for_shutdown().await;
    tracing::info!("shutdown requested");
    sweep_task.abort();
    runtime.shutdown().await;
    tracing::info!("cakeday stopped");
    Ok(())
}

async fn dry_run(store: Arc<BirthdayStore>, config: &CakedayConfig) -> anyhow::Result<()> {
    let platform = Arc::new(MemoryPlatform::new());
    for venue in store.snapshot()? {
        platform.add_channel(&venue.venue_id, "general", "general");
    }
    let notifier = CelebrationNotifier::new(platform.clone(), config.celebration.clone());
    let sweeper = BirthdaySweeper::new(store, notifier, &config.sweep);
    let report = sweeper.trigger_now().await?;

    println!("{}", report.summary());
    for message in platform.sent() {
        println!("[{}] {}", message.destination, message.text);
    }
    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter.as_str()));

    let (file_layer, guard) = if logging.file {
        let appender = tracing_appender::rolling::daily(cakeday::cakeday_dirs::logs_dir(), "cakeday.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    guard
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => tracing::warn!("cannot listen for SIGTERM: {e}"),
        }
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for ctrl-c: {e}");
    }
}
