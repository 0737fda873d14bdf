use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use futures_util::future::try_join_all;
use tracing::{debug, warn};

use crate::{
    chat::{
        port::ChatBackend,
        types::{GuildMemberRecord, UserRecord, DEFAULT_AVATAR_URL},
    },
    domain::UserId,
    errors::Error,
    Result,
};

/// A resolved guild member: the guild record merged with the global user record.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscordMember {
    pub id: UserId,
    pub display_name: String,
    pub username: String,
    pub avatar_url: String,
    pub roles: Vec<u64>,
}

impl DiscordMember {
    fn merge(member: GuildMemberRecord, user: UserRecord) -> Self {
        let display_name = member
            .nickname
            .clone()
            .or_else(|| user.global_name.clone())
            .unwrap_or_else(|| user.username.clone());

        Self {
            id: user.id,
            display_name,
            username: user.username,
            avatar_url: user
                .avatar_url
                .unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string()),
            roles: member.roles,
        }
    }
}

/// Two-tier member cache.
///
/// Tier 1 is our own map of merged members; tier 2 is whatever the chat
/// connection has cached. On a miss in both, the member and user records are
/// fetched concurrently and the merged result is stored in tier 1.
pub struct MemberResolver {
    backend: Arc<dyn ChatBackend>,
    cache: Mutex<HashMap<UserId, DiscordMember>>,
}

impl MemberResolver {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            backend,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_member(&self, id: UserId) -> Result<DiscordMember> {
        if let Some(hit) = self.cached(id) {
            return Ok(hit);
        }

        if let (Some(member), Some(user)) = (
            self.backend.cached_guild_member(id),
            self.backend.cached_user(id),
        ) {
            return Ok(self.populate(DiscordMember::merge(member, user)));
        }

        debug!(user_id = %id, "member cache miss, fetching");
        let (member, user) = tokio::join!(
            self.backend.fetch_guild_member(id),
            self.backend.fetch_user(id)
        );

        match (member, user) {
            (Ok(Some(member)), Ok(Some(user))) => {
                Ok(self.populate(DiscordMember::merge(member, user)))
            }
            (member, user) => {
                warn!(
                    user_id = %id,
                    member_found = matches!(member, Ok(Some(_))),
                    user_found = matches!(user, Ok(Some(_))),
                    "unable to fetch discord member or user"
                );
                Err(Error::MissingUser(format!("Could not get user with id {id}")))
            }
        }
    }

    /// Resolve many members concurrently into an id → display name map.
    ///
    /// Any single failure fails the whole batch.
    pub async fn nicknames_map(&self, ids: &[UserId]) -> Result<HashMap<UserId, String>> {
        let members = try_join_all(ids.iter().map(|id| self.get_member(*id))).await?;
        Ok(members
            .into_iter()
            .map(|m| (m.id, m.display_name))
            .collect())
    }

    fn cached(&self, id: UserId) -> Option<DiscordMember> {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
    }

    fn populate(&self, member: DiscordMember) -> DiscordMember {
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(member.id, member.clone());
        member
    }
}
