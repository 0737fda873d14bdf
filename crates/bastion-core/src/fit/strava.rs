use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    domain::StravaId,
    errors::Error,
    fit::{activity::Activity, store::AuthRepository},
    Result,
};

/// OAuth scopes the bot cannot work without.
pub const REQUIRED_SCOPES: [&str; 2] = ["activity:read_all", "profile:read_all"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Athlete {
    pub id: StravaId,
    pub sex: Option<String>,
}

/// Result of exchanging an authorization code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGrant {
    pub athlete: Athlete,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

#[async_trait]
pub trait StravaApi: Send + Sync {
    /// Authorization page URL carrying `state` back to the accept callback.
    fn authorize_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant>;

    async fn refresh(&self, refresh_token: &str) -> Result<AccessToken>;

    async fn fetch_activity(&self, access_token: &str, activity_id: &str) -> Result<Activity>;
}

/// Whether a granted scope string (comma separated) covers [`REQUIRED_SCOPES`].
pub fn has_required_scopes(granted: &str) -> bool {
    let granted: Vec<&str> = granted.split(',').map(str::trim).collect();
    REQUIRED_SCOPES.iter().all(|s| granted.contains(s))
}

/// Fetches activities on behalf of linked athletes.
#[derive(Clone)]
pub struct ActivityFetcher {
    auth: Arc<dyn AuthRepository>,
    strava: Arc<dyn StravaApi>,
}

impl ActivityFetcher {
    pub fn new(auth: Arc<dyn AuthRepository>, strava: Arc<dyn StravaApi>) -> Self {
        Self { auth, strava }
    }

    pub async fn get_activity_by_strava_id(
        &self,
        strava_id: &StravaId,
        activity_id: &str,
    ) -> Result<Activity> {
        let mut record = self
            .auth
            .find_by_strava_id(strava_id)
            .await?
            .ok_or_else(|| Error::NotConnected(format!("strava athlete {strava_id} is not linked")))?;
        let refresh_token = record
            .refresh_token
            .clone()
            .ok_or_else(|| Error::NotConnected(format!("strava athlete {strava_id} has no token")))?;

        let token = self.strava.refresh(&refresh_token).await?;
        if token.refresh_token != refresh_token {
            record.refresh_token = Some(token.refresh_token.clone());
            self.auth.save_auth(&record).await?;
        }

        self.strava
            .fetch_activity(&token.access_token, activity_id)
            .await
    }
}
