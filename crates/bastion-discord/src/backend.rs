use std::sync::Arc;

use async_trait::async_trait;
use bastion_core::{
    chat::{
        port::ChatBackend,
        types::{GuildMemberRecord, MessagePayload, UserRecord},
    },
    domain::{ChannelId, GuildId, MessageRef, UserId},
    errors::Error,
    Result,
};
use serenity::{
    cache::Cache,
    http::{Http, HttpError},
    prelude::SerenityError,
};
use tracing::debug;

use crate::convert::{
    create_message, edit_message, member_record, message_ref, to_channel_id, to_guild_id,
    to_message_id, to_user_id, user_record,
};

/// [`ChatBackend`] over serenity's REST client and gateway cache, scoped to
/// one guild.
pub struct DiscordBackend {
    http: Arc<Http>,
    cache: Arc<Cache>,
    guild_id: GuildId,
}

impl DiscordBackend {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>, guild_id: GuildId) -> Self {
        Self {
            http,
            cache,
            guild_id,
        }
    }
}

fn is_not_found(e: &SerenityError) -> bool {
    matches!(
        e,
        SerenityError::Http(HttpError::UnsuccessfulRequest(resp)) if resp.status_code.as_u16() == 404
    )
}

fn external(what: &str, e: SerenityError) -> Error {
    Error::External(format!("discord {what} failed: {e}"))
}

#[async_trait]
impl ChatBackend for DiscordBackend {
    fn cached_guild_member(&self, id: UserId) -> Option<GuildMemberRecord> {
        self.cache
            .member(to_guild_id(self.guild_id), to_user_id(id))
            .map(|m| member_record(&m))
    }

    fn cached_user(&self, id: UserId) -> Option<UserRecord> {
        self.cache.user(to_user_id(id)).map(|u| user_record(&u))
    }

    async fn fetch_guild_member(&self, id: UserId) -> Result<Option<GuildMemberRecord>> {
        match self
            .http
            .get_member(to_guild_id(self.guild_id), to_user_id(id))
            .await
        {
            Ok(member) => Ok(Some(member_record(&member))),
            Err(e) if is_not_found(&e) => {
                debug!(user_id = %id, "guild member not found");
                Ok(None)
            }
            Err(e) => Err(external("member fetch", e)),
        }
    }

    async fn fetch_user(&self, id: UserId) -> Result<Option<UserRecord>> {
        match self.http.get_user(to_user_id(id)).await {
            Ok(user) => Ok(Some(user_record(&user))),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(external("user fetch", e)),
        }
    }

    fn has_channel(&self, id: ChannelId) -> bool {
        self.cache
            .guild(to_guild_id(self.guild_id))
            .map(|g| g.channels.contains_key(&to_channel_id(id)))
            .unwrap_or(false)
    }

    async fn send_message(&self, channel: ChannelId, payload: MessagePayload) -> Result<MessageRef> {
        let msg = to_channel_id(channel)
            .send_message(&*self.http, create_message(&payload))
            .await
            .map_err(|e| external("send", e))?;
        Ok(message_ref(&msg))
    }

    async fn edit_message(&self, msg: MessageRef, payload: MessagePayload) -> Result<()> {
        to_channel_id(msg.channel_id)
            .edit_message(&*self.http, to_message_id(msg.message_id), edit_message(&payload))
            .await
            .map_err(|e| external("edit", e))?;
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        to_channel_id(msg.channel_id)
            .delete_message(&*self.http, to_message_id(msg.message_id))
            .await
            .map_err(|e| external("delete", e))
    }

    async fn send_direct(&self, user: UserId, payload: MessagePayload) -> Result<MessageRef> {
        let dm = to_user_id(user)
            .create_dm_channel(&*self.http)
            .await
            .map_err(|e| external("dm channel", e))?;
        let msg = dm
            .id
            .send_message(&*self.http, create_message(&payload))
            .await
            .map_err(|e| external("dm send", e))?;
        Ok(message_ref(&msg))
    }
}
