use async_trait::async_trait;

use crate::{
    chat::types::{GuildMemberRecord, MessagePayload, UserRecord},
    domain::{ChannelId, MessageRef, UserId},
    Result,
};

/// Hexagonal port over the chat connection.
///
/// Lookups come in two flavours: synchronous reads of whatever the connection
/// already has cached, and async network fetches. `Ok(None)` from a fetch means
/// the platform answered but the entity does not exist.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn cached_guild_member(&self, id: UserId) -> Option<GuildMemberRecord>;
    fn cached_user(&self, id: UserId) -> Option<UserRecord>;

    async fn fetch_guild_member(&self, id: UserId) -> Result<Option<GuildMemberRecord>>;
    async fn fetch_user(&self, id: UserId) -> Result<Option<UserRecord>>;

    /// Whether the channel is present in the connection's channel cache.
    fn has_channel(&self, id: ChannelId) -> bool;

    async fn send_message(&self, channel: ChannelId, payload: MessagePayload)
        -> Result<MessageRef>;
    async fn edit_message(&self, msg: MessageRef, payload: MessagePayload) -> Result<()>;
    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    /// Send a direct message to a user.
    async fn send_direct(&self, user: UserId, payload: MessagePayload) -> Result<MessageRef>;
}
