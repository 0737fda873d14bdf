use chrono::{DateTime, Utc};

use crate::domain::{ChannelId, GuildId, MessageId, UserId};

/// Avatar used when a user has not uploaded one.
pub const DEFAULT_AVATAR_URL: &str = "https://cdn.discordapp.com/embed/avatars/0.png";

/// Events emitted by the chat connection.
#[derive(Clone, Debug)]
pub enum GatewayEvent {
    Ready(ReadyInfo),
    Message(InboundMessage),
}

#[derive(Clone, Debug)]
pub struct ReadyInfo {
    pub bot_id: UserId,
    pub bot_name: String,
}

#[derive(Clone, Debug)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    pub bot: bool,
}

/// One inbound chat message.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub author: Author,
    pub content: String,
}

/// Guild-scoped membership record (nickname, roles).
#[derive(Clone, Debug, PartialEq)]
pub struct GuildMemberRecord {
    pub user_id: UserId,
    pub nickname: Option<String>,
    pub roles: Vec<u64>,
}

/// Global user record (username, avatar).
#[derive(Clone, Debug, PartialEq)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub global_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Outgoing message body.
#[derive(Clone, Debug, PartialEq)]
pub enum MessagePayload {
    Text(String),
    Embed(Embed),
}

impl MessagePayload {
    /// Plain-text rendering, used in logs and by adapters without embed support.
    pub fn preview(&self) -> &str {
        match self {
            MessagePayload::Text(t) => t,
            MessagePayload::Embed(e) => e.title.as_deref().unwrap_or("<embed>"),
        }
    }
}

impl From<&str> for MessagePayload {
    fn from(s: &str) -> Self {
        MessagePayload::Text(s.to_string())
    }
}

impl From<String> for MessagePayload {
    fn from(s: String) -> Self {
        MessagePayload::Text(s)
    }
}

impl From<Embed> for MessagePayload {
    fn from(e: Embed) -> Self {
        MessagePayload::Embed(e)
    }
}

/// Platform-neutral rich embed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub color: Option<u32>,
    pub author: Option<EmbedAuthor>,
    pub thumbnail: Option<String>,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmbedAuthor {
    pub name: String,
    pub icon_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn author(mut self, name: impl Into<String>, icon_url: Option<String>) -> Self {
        self.author = Some(EmbedAuthor {
            name: name.into(),
            icon_url,
        });
        self
    }

    pub fn thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail = Some(url.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }

    pub fn timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }
}
