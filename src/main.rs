//! editbot CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use serenity::all::{ApplicationId, GatewayIntents, Http};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use editbot::controller::InteractionController;
use editbot::engine::CommandEngine;
use editbot::messaging::discord::register_commands;
use editbot::messaging::{DiscordPlatform, Handler, ResponseEditor};

#[derive(Parser)]
#[command(name = "editbot")]
#[command(about = "Discord bot that edits the latest media in a channel")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Engine command line, overriding $EDITBOT_ENGINE
    #[arg(short, long)]
    engine: Option<String>,

    /// Do not register the slash command on startup
    #[arg(long)]
    skip_register: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting editbot...");

    let mut config = editbot::config::Config::load()
        .context("failed to load configuration from environment")?;
    if let Some(engine) = cli.engine {
        config.engine.program = engine;
    }

    tracing::info!(
        application_id = config.application_id,
        guild_id = config.guild_id,
        engine = %config.engine.program,
        "Configuration loaded"
    );

    let engine = Arc::new(
        CommandEngine::from_command_line(&config.engine.program)
            .context("invalid engine command")?,
    );

    let http = Arc::new(Http::new(&config.bot_token));
    http.set_application_id(ApplicationId::new(config.application_id));

    if cli.skip_register {
        tracing::info!("Skipping command registration");
    } else {
        register_commands(&http, config.guild_id)
            .await
            .context("failed to register commands")?;
    }

    let web = reqwest::Client::new();
    let platform = Arc::new(DiscordPlatform::new(http.clone()));
    let responses = Arc::new(ResponseEditor::new(
        web.clone(),
        config.api_base.clone(),
        config.application_id,
    ));
    let controller = Arc::new(InteractionController::new(platform, engine, responses, web));

    // Reading attachments and embeds from history needs MESSAGE_CONTENT.
    let intents =
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::Client::builder(&config.bot_token, intents)
        .event_handler(Handler::new(controller))
        .await
        .context("failed to build discord client")?;
    let shard_manager = client.shard_manager.clone();

    tracing::info!("editbot started successfully");

    tokio::select! {
        result = client.start() => {
            result.context("discord gateway error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            shard_manager.shutdown_all().await;
        }
    }

    tracing::info!("editbot stopped");
    Ok(())
}
