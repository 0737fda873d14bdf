//! In-memory fakes of the core ports, shared by unit tests across the workspace.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::{
    chat::{
        port::ChatBackend,
        types::{
            Author, GuildMemberRecord, InboundMessage, MessagePayload, UserRecord,
        },
    },
    domain::{ChannelId, GuildId, MessageId, MessageRef, StravaId, UserId},
    errors::Error,
    fit::{
        activity::{Activity, ActivityKind},
        strava::{AccessToken, Athlete, StravaApi, TokenGrant},
    },
    Result,
};

/// Fake chat connection recording every outbound call.
#[derive(Default)]
pub struct FakeChat {
    members: Mutex<HashMap<UserId, GuildMemberRecord>>,
    users: Mutex<HashMap<UserId, UserRecord>>,
    warm: Mutex<HashSet<UserId>>,
    channels: Mutex<HashSet<ChannelId>>,
    sent: Mutex<Vec<(ChannelId, MessagePayload)>>,
    edited: Mutex<Vec<(MessageRef, MessagePayload)>>,
    deleted: Mutex<Vec<MessageRef>>,
    direct: Mutex<Vec<(UserId, MessagePayload)>>,
    fetches: AtomicUsize,
    fail_users: AtomicBool,
    next_id: AtomicU64,
}

impl FakeChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(
        &self,
        id: u64,
        username: &str,
        nickname: Option<&str>,
        avatar_url: Option<&str>,
    ) {
        self.add_guild_member(id, nickname);
        self.users.lock().unwrap().insert(
            UserId(id),
            UserRecord {
                id: UserId(id),
                username: username.to_string(),
                global_name: None,
                avatar_url: avatar_url.map(str::to_string),
            },
        );
    }

    pub fn add_user_only(&self, id: u64, username: &str) {
        self.users.lock().unwrap().insert(
            UserId(id),
            UserRecord {
                id: UserId(id),
                username: username.to_string(),
                global_name: None,
                avatar_url: None,
            },
        );
    }

    pub fn add_guild_member_only(&self, id: u64) {
        self.add_guild_member(id, None);
    }

    fn add_guild_member(&self, id: u64, nickname: Option<&str>) {
        self.members.lock().unwrap().insert(
            UserId(id),
            GuildMemberRecord {
                user_id: UserId(id),
                nickname: nickname.map(str::to_string),
                roles: vec![],
            },
        );
    }

    /// Make the member visible through the synchronous cache reads.
    pub fn warm_cache(&self, id: u64) {
        self.warm.lock().unwrap().insert(UserId(id));
    }

    pub fn add_channel(&self, id: u64) {
        self.channels.lock().unwrap().insert(ChannelId(id));
    }

    pub fn fail_user_fetches(&self) {
        self.fail_users.store(true, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(ChannelId, MessagePayload)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|(_, p)| match p {
                MessagePayload::Text(t) => Some(t),
                MessagePayload::Embed(_) => None,
            })
            .collect()
    }

    pub fn edited(&self) -> Vec<(MessageRef, MessagePayload)> {
        self.edited.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn direct(&self) -> Vec<(UserId, MessagePayload)> {
        self.direct.lock().unwrap().clone()
    }

    fn alloc(&self, channel_id: ChannelId) -> MessageRef {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        MessageRef {
            channel_id,
            message_id: MessageId(id),
        }
    }
}

#[async_trait]
impl ChatBackend for FakeChat {
    fn cached_guild_member(&self, id: UserId) -> Option<GuildMemberRecord> {
        if !self.warm.lock().unwrap().contains(&id) {
            return None;
        }
        self.members.lock().unwrap().get(&id).cloned()
    }

    fn cached_user(&self, id: UserId) -> Option<UserRecord> {
        if !self.warm.lock().unwrap().contains(&id) {
            return None;
        }
        self.users.lock().unwrap().get(&id).cloned()
    }

    async fn fetch_guild_member(&self, id: UserId) -> Result<Option<GuildMemberRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.members.lock().unwrap().get(&id).cloned())
    }

    async fn fetch_user(&self, id: UserId) -> Result<Option<UserRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_users.load(Ordering::SeqCst) {
            return Err(Error::External("user fetch failed".to_string()));
        }
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    fn has_channel(&self, id: ChannelId) -> bool {
        self.channels.lock().unwrap().contains(&id)
    }

    async fn send_message(
        &self,
        channel: ChannelId,
        payload: MessagePayload,
    ) -> Result<MessageRef> {
        self.sent.lock().unwrap().push((channel, payload));
        Ok(self.alloc(channel))
    }

    async fn edit_message(&self, msg: MessageRef, payload: MessagePayload) -> Result<()> {
        self.edited.lock().unwrap().push((msg, payload));
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.deleted.lock().unwrap().push(msg);
        Ok(())
    }

    async fn send_direct(&self, user: UserId, payload: MessagePayload) -> Result<MessageRef> {
        self.direct.lock().unwrap().push((user, payload));
        Ok(self.alloc(ChannelId(user.0)))
    }
}

/// Build an inbound guild message.
pub fn message(author: u64, content: &str) -> InboundMessage {
    InboundMessage {
        id: MessageId(1),
        channel_id: ChannelId(100),
        guild_id: Some(GuildId(1)),
        author: Author {
            id: UserId(author),
            name: format!("user{author}"),
            bot: false,
        },
        content: content.to_string(),
    }
}

/// Fake Strava API serving canned grants and activities.
#[derive(Default)]
pub struct FakeStrava {
    activities: Mutex<HashMap<String, Activity>>,
    grants: Mutex<HashMap<String, TokenGrant>>,
    rotate_to: Mutex<Option<String>>,
    activity_fetches: AtomicUsize,
}

impl FakeStrava {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_activity(&self, activity: Activity) {
        self.activities
            .lock()
            .unwrap()
            .insert(activity.id.clone(), activity);
    }

    /// Accept `code` as belonging to `athlete_id`.
    pub fn add_grant(&self, code: &str, athlete_id: &str, sex: Option<&str>) {
        self.grants.lock().unwrap().insert(
            code.to_string(),
            TokenGrant {
                athlete: Athlete {
                    id: StravaId::from(athlete_id),
                    sex: sex.map(str::to_string),
                },
                access_token: format!("access-{code}"),
                refresh_token: format!("refresh-{code}"),
                expires_at: 0,
            },
        );
    }

    /// Every later refresh hands back `token` as the new refresh token.
    pub fn rotate_refresh_tokens_to(&self, token: &str) {
        *self.rotate_to.lock().unwrap() = Some(token.to_string());
    }

    pub fn activity_fetches(&self) -> usize {
        self.activity_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StravaApi for FakeStrava {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://strava.test/oauth/authorize?state={state}")
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        self.grants
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or_else(|| Error::External(format!("unknown code {code}")))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AccessToken> {
        let next = self
            .rotate_to
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| refresh_token.to_string());
        Ok(AccessToken {
            access_token: format!("access-{refresh_token}"),
            refresh_token: next,
            expires_at: 0,
        })
    }

    async fn fetch_activity(&self, _access_token: &str, activity_id: &str) -> Result<Activity> {
        self.activity_fetches.fetch_add(1, Ordering::SeqCst);
        self.activities
            .lock()
            .unwrap()
            .get(activity_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("activity {activity_id}")))
    }
}

/// A run of `minutes` that started an hour ago, without heart-rate data.
pub fn sample_activity(id: &str, minutes: u64) -> Activity {
    Activity {
        id: id.to_string(),
        name: "Lunch Run".to_string(),
        kind: ActivityKind::Run,
        distance_m: 5000.0,
        moving_time_s: minutes * 60,
        elapsed_time_s: minutes * 60 + 120,
        average_heartrate: None,
        max_heartrate: None,
        elevation_gain_m: 42.0,
        start: Utc::now() - Duration::hours(1),
    }
}
