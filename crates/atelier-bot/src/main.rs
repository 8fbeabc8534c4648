//! Atelier: a Discord commission-order bot.
//!
//! Customers open orders through a form, staff drive the lifecycle through
//! buttons, payment is confirmed manually against a configured PIX key, and
//! a transcript is delivered on completion.

mod bootstrap;
mod dispatch;
mod runtime;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use atelier_chat::discord::DISCORD_API_BASE;
use atelier_chat::gateway::DEFAULT_GATEWAY_URL;
use atelier_chat::{ChatApi, DiscordApiClient, GatewayConfig};
use atelier_config::{ConfigStore, CONFIG_FILE_NAME};
use atelier_orders::{EngineDelays, OrderEngine, OrderStore, ORDERS_FILE_NAME};

use crate::dispatch::BotContext;

const REQUEST_TIMEOUT_MS: u64 = 10_000;
const RETRY_MAX_ATTEMPTS: usize = 3;
const RETRY_BASE_DELAY_MS: u64 = 250;
const RECONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(name = "atelier", about = "Discord commission-order bot")]
struct CliArgs {
    /// Directory holding config.json and orders.json.
    #[arg(long, default_value = ".atelier")]
    state_dir: PathBuf,

    /// Discord REST api base (override for tests).
    #[arg(long, default_value = DISCORD_API_BASE)]
    api_base: String,

    /// Discord gateway websocket url (override for tests).
    #[arg(long, default_value = DEFAULT_GATEWAY_URL)]
    gateway_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    let args = CliArgs::parse();

    let token = match std::env::var("DISCORD_TOKEN") {
        Ok(token) if !token.trim().is_empty() => token.trim().to_string(),
        _ => bail!("DISCORD_TOKEN environment variable is required"),
    };

    std::fs::create_dir_all(&args.state_dir)
        .with_context(|| format!("failed to create {}", args.state_dir.display()))?;
    let config = Arc::new(ConfigStore::load(args.state_dir.join(CONFIG_FILE_NAME))?);
    let store = Arc::new(OrderStore::load(args.state_dir.join(ORDERS_FILE_NAME))?);

    let mut client = DiscordApiClient::new(
        args.api_base,
        token.clone(),
        REQUEST_TIMEOUT_MS,
        RETRY_MAX_ATTEMPTS,
        RETRY_BASE_DELAY_MS,
    )?;
    match client.fetch_current_user_id().await {
        Ok(bot_user_id) => client.set_bot_user_id(bot_user_id),
        Err(error) => tracing::warn!("could not resolve bot user id: {error:#}"),
    }
    let chat: Arc<dyn ChatApi> = Arc::new(client);

    let engine = OrderEngine::new(
        chat.clone(),
        config.clone(),
        store,
        EngineDelays::default(),
    );
    let ctx = Arc::new(BotContext {
        engine,
        config,
        chat,
    });

    println!("atelier order bot online");
    runtime::run(
        ctx,
        GatewayConfig {
            gateway_url: args.gateway_url,
            bot_token: token,
            intents: atelier_chat::gateway::DEFAULT_INTENTS,
        },
        RECONNECT_RETRY_DELAY,
    )
    .await
}
