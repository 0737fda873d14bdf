use async_trait::async_trait;
use bastion_core::chat::types::{GatewayEvent, ReadyInfo};
use serenity::{
    client::{Context, EventHandler},
    model::{channel::Message, gateway::Ready},
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::convert::{inbound_message, user_id};

/// Pushes serenity events onto the bot's event stream.
pub(crate) struct Forwarder {
    tx: mpsc::Sender<GatewayEvent>,
}

impl Forwarder {
    pub(crate) fn new(tx: mpsc::Sender<GatewayEvent>) -> Self {
        Self { tx }
    }

    async fn forward(&self, event: GatewayEvent) {
        if self.tx.send(event).await.is_err() {
            warn!("event stream closed, dropping discord event");
        }
    }
}

#[async_trait]
impl EventHandler for Forwarder {
    async fn message(&self, _ctx: Context, msg: Message) {
        self.forward(GatewayEvent::Message(inbound_message(&msg)))
            .await;
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "discord gateway ready");
        self.forward(GatewayEvent::Ready(ReadyInfo {
            bot_id: user_id(ready.user.id),
            bot_name: ready.user.name.clone(),
        }))
        .await;
    }
}
