use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loqa_meetbot::{
    create_router, AppState, BotManager, ChromiumSandbox, ChromiumSandboxFactory, Config,
    JoinRequest, MeetingBot, NatsClient, StatusEvent,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "loqa-meetbot", version, about = "Meeting recording bot")]
struct Cli {
    /// Config file (without extension)
    #[arg(short, long, default_value = "config/loqa-meetbot")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Join one meeting, record it and print the audio file path
    Join {
        /// Meeting URL
        #[arg(long)]
        url: String,

        /// Display name shown to participants
        #[arg(long)]
        name: Option<String>,
    },
    /// Run the HTTP API
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cfg = Config::load(&cli.config)?;

    info!("Loqa Meetbot v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Command::Join { url, name } => run_single(cfg, url, name).await,
        Command::Serve => serve(cfg).await,
    }
}

async fn run_single(cfg: Config, url: String, name: Option<String>) -> Result<()> {
    let name = name.unwrap_or_else(|| cfg.service.default_bot_name.clone());
    let request = JoinRequest::new(url, name).with_status_callback(Arc::new(
        |event: &StatusEvent| {
            if let Some(data) = &event.data {
                println!("[{}] {} {}", event.timestamp.to_rfc3339(), event.status, data);
            } else {
                println!("[{}] {}", event.timestamp.to_rfc3339(), event.status);
            }
        },
    ));

    let bot = Arc::new(MeetingBot::new(
        request,
        cfg.bot_settings(),
        Box::new(ChromiumSandbox::new(cfg.browser.clone())),
    ));

    bot.join().await?;

    // Ctrl-C leaves the meeting but still keeps the recording
    let leaver = Arc::clone(&bot);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, leaving meeting");
            leaver.leave().await;
        }
    });

    let path = bot.wait_for_end().await?;
    println!("{}", path.display());

    Ok(())
}

async fn serve(cfg: Config) -> Result<()> {
    let mut manager = BotManager::new(
        Arc::new(ChromiumSandboxFactory::new(cfg.browser.clone())),
        cfg.bot_settings(),
    )
    .with_default_bot_name(cfg.service.default_bot_name.clone());

    let mut nats = None;
    if cfg.nats.enabled {
        match NatsClient::connect(&cfg.nats.url).await {
            Ok(client) => {
                let client = Arc::new(client);
                manager = manager.with_publisher(Arc::clone(&client));
                nats = Some(client);
            }
            Err(e) => warn!("Status events will not be published: {:#}", e),
        }
    }

    let router = create_router(AppState::new(manager));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    if let Some(client) = nats {
        client.close().await?;
    }

    Ok(())
}
