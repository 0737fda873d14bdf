use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    chat::{
        port::ChatBackend,
        types::{Author, InboundMessage, MessagePayload},
    },
    domain::{ChannelId, MessageId, MessageRef, UserId},
    member::{DiscordMember, MemberResolver},
    Result,
};

/// Per-invocation context for a command handler, plus its output channel.
///
/// A request lives for exactly one dispatch. It owns no state; every mutation
/// goes through the chat backend.
#[derive(Clone)]
pub struct Request {
    message: Arc<InboundMessage>,
    remainder: String,
    chat: Arc<dyn ChatBackend>,
    members: Arc<MemberResolver>,
}

impl Request {
    /// `text` is the message content with the instigator already stripped.
    pub fn new(
        message: InboundMessage,
        text: impl Into<String>,
        chat: Arc<dyn ChatBackend>,
        members: Arc<MemberResolver>,
    ) -> Self {
        Self {
            message: Arc::new(message),
            remainder: text.into(),
            chat,
            members,
        }
    }

    pub(crate) fn with_remainder(&self, remainder: impl Into<String>) -> Self {
        Self {
            message: self.message.clone(),
            remainder: remainder.into(),
            chat: self.chat.clone(),
            members: self.members.clone(),
        }
    }

    pub fn author(&self) -> &Author {
        &self.message.author
    }

    /// Raw message content, instigator included.
    pub fn content(&self) -> &str {
        &self.message.content
    }

    /// Text after the matched command keyword(s).
    pub fn remainder(&self) -> &str {
        &self.remainder
    }

    pub fn args(&self) -> Vec<&str> {
        self.remainder.split_whitespace().collect()
    }

    pub fn channel_id(&self) -> ChannelId {
        self.message.channel_id
    }

    pub fn message_id(&self) -> MessageId {
        self.message.id
    }

    /// Send a message to the originating channel.
    pub async fn reply(&self, payload: impl Into<MessagePayload>) -> Result<MessageRef> {
        self.chat
            .send_message(self.message.channel_id, payload.into())
            .await
    }

    pub async fn edit(&self, msg: MessageRef, payload: impl Into<MessagePayload>) -> Result<()> {
        self.chat.edit_message(msg, payload.into()).await
    }

    pub async fn delete(&self, msg: MessageRef) -> Result<()> {
        self.chat.delete_message(msg).await
    }

    /// Send a direct message to the author.
    pub async fn reply_direct(&self, payload: impl Into<MessagePayload>) -> Result<MessageRef> {
        self.chat
            .send_direct(self.message.author.id, payload.into())
            .await
    }

    /// Resolve a member profile, defaulting to the author.
    pub async fn get_member(&self, id: Option<UserId>) -> Result<DiscordMember> {
        let id = id.unwrap_or(self.message.author.id);
        self.members.get_member(id).await
    }

    pub async fn nicknames(&self, ids: &[UserId]) -> Result<HashMap<UserId, String>> {
        self.members.nicknames_map(ids).await
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("author", &self.message.author.id)
            .field("channel", &self.message.channel_id)
            .field("content", &self.message.content)
            .field("remainder", &self.remainder)
            .finish()
    }
}
