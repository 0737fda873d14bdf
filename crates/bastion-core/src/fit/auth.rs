use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    domain::{StravaId, UserId},
    errors::Error,
    Result,
};

const PASSWORD_LEN: usize = 24;

/// Link between a Discord member and their Strava athlete.
///
/// Only a hash of the password is kept; the plain password exists once, in
/// the connect token handed to the member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRecord {
    pub discord_id: UserId,
    password_hash: String,
    pub strava_id: Option<StravaId>,
    pub refresh_token: Option<String>,
}

impl AuthRecord {
    /// New unlinked record plus its plain password.
    pub fn create(discord_id: UserId) -> (Self, String) {
        let password = generate_password();
        let record = Self {
            discord_id,
            password_hash: hash_password(&password),
            strava_id: None,
            refresh_token: None,
        };
        (record, password)
    }

    pub fn verify(&self, password: &str) -> bool {
        self.password_hash == hash_password(password)
    }

    /// Replace the password, keeping any Strava link.
    pub fn reset_password(&mut self) -> String {
        let password = generate_password();
        self.password_hash = hash_password(&password);
        password
    }

    pub fn is_connected(&self) -> bool {
        self.strava_id.is_some() && self.refresh_token.is_some()
    }

    pub fn link_to_strava(&mut self, strava_id: StravaId, refresh_token: impl Into<String>) {
        self.strava_id = Some(strava_id);
        self.refresh_token = Some(refresh_token.into());
    }
}

pub fn connect_token(discord_id: UserId, password: &str) -> String {
    format!("{discord_id}.{password}")
}

/// Split a `discordId.password` token.
pub fn parse_token(token: &str) -> Result<(UserId, &str)> {
    let (id, password) = token
        .trim()
        .split_once('.')
        .ok_or_else(|| Error::Unauthorized("malformed token".to_string()))?;
    let id = UserId::parse(id).ok_or_else(|| Error::Unauthorized("malformed token".to_string()))?;
    if password.is_empty() {
        return Err(Error::Unauthorized("malformed token".to_string()));
    }
    Ok((id, password))
}

fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect()
}

fn hash_password(password: &str) -> String {
    Sha256::digest(password.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
