use bastion_core::{
    chat::types::{
        Author, Embed, GuildMemberRecord, InboundMessage, MessagePayload, UserRecord,
    },
    domain,
};
use serenity::{
    builder::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter, CreateMessage, EditMessage},
    model::{
        channel::Message,
        guild::Member,
        id::{ChannelId, GuildId, MessageId, UserId},
        user::User,
        Timestamp,
    },
};

pub(crate) fn user_id(id: UserId) -> domain::UserId {
    domain::UserId(id.get())
}

pub(crate) fn to_user_id(id: domain::UserId) -> UserId {
    UserId::new(id.0)
}

pub(crate) fn to_channel_id(id: domain::ChannelId) -> ChannelId {
    ChannelId::new(id.0)
}

pub(crate) fn to_guild_id(id: domain::GuildId) -> GuildId {
    GuildId::new(id.0)
}

pub(crate) fn to_message_id(id: domain::MessageId) -> MessageId {
    MessageId::new(id.0)
}

pub(crate) fn message_ref(msg: &Message) -> domain::MessageRef {
    domain::MessageRef {
        channel_id: domain::ChannelId(msg.channel_id.get()),
        message_id: domain::MessageId(msg.id.get()),
    }
}

pub(crate) fn inbound_message(msg: &Message) -> InboundMessage {
    InboundMessage {
        id: domain::MessageId(msg.id.get()),
        channel_id: domain::ChannelId(msg.channel_id.get()),
        guild_id: msg.guild_id.map(|g| domain::GuildId(g.get())),
        author: Author {
            id: user_id(msg.author.id),
            name: msg.author.name.clone(),
            bot: msg.author.bot,
        },
        content: msg.content.clone(),
    }
}

pub(crate) fn user_record(user: &User) -> UserRecord {
    UserRecord {
        id: user_id(user.id),
        username: user.name.clone(),
        global_name: user.global_name.clone(),
        avatar_url: user.avatar_url(),
    }
}

pub(crate) fn member_record(member: &Member) -> GuildMemberRecord {
    GuildMemberRecord {
        user_id: user_id(member.user.id),
        nickname: member.nick.clone(),
        roles: member.roles.iter().map(|r| r.get()).collect(),
    }
}

pub(crate) fn create_embed(embed: &Embed) -> CreateEmbed {
    let mut out = CreateEmbed::new();
    if let Some(title) = &embed.title {
        out = out.title(title);
    }
    if let Some(description) = &embed.description {
        out = out.description(description);
    }
    if let Some(url) = &embed.url {
        out = out.url(url);
    }
    if let Some(color) = embed.color {
        out = out.colour(color);
    }
    if let Some(author) = &embed.author {
        let mut a = CreateEmbedAuthor::new(&author.name);
        if let Some(icon) = &author.icon_url {
            a = a.icon_url(icon);
        }
        out = out.author(a);
    }
    if let Some(thumbnail) = &embed.thumbnail {
        out = out.thumbnail(thumbnail);
    }
    for field in &embed.fields {
        out = out.field(&field.name, &field.value, field.inline);
    }
    if let Some(footer) = &embed.footer {
        out = out.footer(CreateEmbedFooter::new(footer));
    }
    if let Some(ts) = embed
        .timestamp
        .and_then(|ts| Timestamp::from_unix_timestamp(ts.timestamp()).ok())
    {
        out = out.timestamp(ts);
    }
    out
}

pub(crate) fn create_message(payload: &MessagePayload) -> CreateMessage {
    match payload {
        MessagePayload::Text(text) => CreateMessage::new().content(text),
        MessagePayload::Embed(embed) => CreateMessage::new().embed(create_embed(embed)),
    }
}

pub(crate) fn edit_message(payload: &MessagePayload) -> EditMessage {
    match payload {
        MessagePayload::Text(text) => EditMessage::new().content(text).embeds(vec![]),
        MessagePayload::Embed(embed) => EditMessage::new().content("").embed(create_embed(embed)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn embed_conversion_keeps_fields() {
        let embed = Embed::new()
            .title("Fiver just ran!")
            .color(0xFC4C02)
            .author("Fiver", Some("https://cdn.test/a.png".to_string()))
            .field("Time", "30m 00s", true)
            .footer("footer")
            .timestamp(Utc.with_ymd_and_hms(2024, 3, 4, 7, 0, 0).unwrap());

        let json = serde_json::to_value(create_embed(&embed)).unwrap();
        assert_eq!(json["title"], "Fiver just ran!");
        assert_eq!(json["author"]["name"], "Fiver");
        assert_eq!(json["author"]["icon_url"], "https://cdn.test/a.png");
        assert_eq!(json["fields"][0]["name"], "Time");
        assert_eq!(json["fields"][0]["inline"], true);
        assert_eq!(json["footer"]["text"], "footer");
        assert!(json["timestamp"].as_str().unwrap().starts_with("2024-03-04T07:00:00"));
    }

    #[test]
    fn id_conversions() {
        let id = domain::UserId(1234);
        assert_eq!(user_id(to_user_id(id)), id);
        assert_eq!(to_channel_id(domain::ChannelId(9)).get(), 9);
    }
}
