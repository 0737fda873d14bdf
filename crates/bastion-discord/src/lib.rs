//! Discord adapter (serenity): gateway events in, REST calls out.

mod backend;
mod convert;
mod events;

pub use backend::DiscordBackend;

use std::sync::Arc;

use bastion_core::{chat::types::GatewayEvent, config::Config, errors::Error, Result};
use serenity::{model::gateway::GatewayIntents, Client};
use tokio::sync::mpsc;

const EVENT_BUFFER: usize = 256;

/// A built, not yet started, Discord client plus the handles the bot needs.
pub struct DiscordConnection {
    pub backend: Arc<DiscordBackend>,
    pub events: mpsc::Receiver<GatewayEvent>,
    pub client: Client,
}

pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
}

/// Build the client. Call `client.start()` to open the gateway.
pub async fn connect(cfg: &Config) -> Result<DiscordConnection> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let client = Client::builder(&cfg.discord_token, intents())
        .event_handler(events::Forwarder::new(tx))
        .await
        .map_err(|e| Error::External(format!("discord client error: {e}")))?;

    let backend = Arc::new(DiscordBackend::new(
        client.http.clone(),
        client.cache.clone(),
        cfg.guild_id,
    ));

    Ok(DiscordConnection {
        backend,
        events: rx,
        client,
    })
}
