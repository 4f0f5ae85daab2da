use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use lead_intake::bot::{BotDeps, LeadBot};
use lead_intake::channels::{Channel, CliChannel, TelegramChannel};
use lead_intake::config::BotConfig;
use lead_intake::health;
use lead_intake::leads::{JsonFileLeadStore, LeadStore};
use lead_intake::session::{InMemorySessionStore, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BotConfig::from_env().context("Failed to read configuration")?;

    // Keep the guard alive so buffered log lines are flushed on exit.
    let _log_guard = init_tracing(&config);

    eprintln!("🤖 Lead bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Leads: {}", config.leads_path.display());
    eprintln!("   Operators: {}", config.roster.len());
    eprintln!("   Health: http://0.0.0.0:{}/health", config.port);

    if config.roster.is_empty() {
        tracing::warn!("ADMIN_IDS is empty; leads will be stored but nobody is notified");
    }

    let leads: Arc<dyn LeadStore> = Arc::new(
        JsonFileLeadStore::open(&config.leads_path)
            .await
            .context("Failed to open lead store")?,
    );
    let deps = BotDeps {
        sessions: Arc::new(InMemorySessionStore::new()) as Arc<dyn SessionStore>,
        leads,
        roster: Arc::new(config.roster.clone()),
        manager_username: config.manager_username.clone(),
    };

    let port = config.port;
    tokio::spawn(async move {
        if let Err(e) = health::serve(port).await {
            tracing::error!(port, error = %e, "Health server stopped");
        }
    });

    match config.bot_token {
        Some(token) if !config.console => {
            eprintln!("   Channel: telegram\n");
            run(TelegramChannel::new(token), deps).await
        }
        _ => {
            eprintln!("   Channel: console (type messages, Ctrl+C to exit)\n");
            run(CliChannel::new(), deps).await
        }
    }
}

async fn run<C: Channel + 'static>(channel: C, deps: BotDeps) -> anyhow::Result<()> {
    channel
        .health_check()
        .await
        .with_context(|| format!("Channel {} failed its health check", channel.name()))?;

    let bot = Arc::new(LeadBot::new(Arc::new(channel), deps));
    bot.run().await.context("Bot stopped with an error")?;
    Ok(())
}

fn init_tracing(config: &BotConfig) -> Option<WorkerGuard> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter());

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "leadbot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            tracing_subscriber::registry().with(stderr).with(file).init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(stderr).init();
            None
        }
    }
}
