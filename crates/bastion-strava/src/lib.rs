//! Strava adapter: OAuth token exchange/refresh and activity fetches.

use std::time::Duration;

use async_trait::async_trait;
use bastion_core::{
    domain::StravaId,
    errors::Error,
    fit::{
        activity::{Activity, ActivityKind},
        strava::{AccessToken, Athlete, StravaApi, TokenGrant},
    },
    Result,
};
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

const AUTHORIZE_URL: &str = "https://www.strava.com/oauth/authorize";
const TOKEN_URL: &str = "https://www.strava.com/oauth/token";
const API_BASE: &str = "https://www.strava.com/api/v3";
const SCOPE: &str = "read,activity:read_all,profile:read_all";

#[derive(Clone, Debug)]
pub struct StravaClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    authorize_base: Url,
    http: reqwest::Client,
}

impl StravaClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::External(format!("strava client build error: {e}")))?;
        let authorize_base = Url::parse(AUTHORIZE_URL)
            .map_err(|e| Error::Config(format!("bad strava authorize url: {e}")))?;
        Ok(Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            authorize_base,
            http,
        })
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        form.extend_from_slice(params);

        let resp = self
            .http
            .post(TOKEN_URL)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::External(format!("strava request error: {e}")))?;
        read_json(resp, "token").await
    }
}

#[async_trait]
impl StravaApi for StravaClient {
    fn authorize_url(&self, state: &str) -> String {
        let mut url = self.authorize_base.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("approval_prompt", "force")
            .append_pair("scope", SCOPE)
            .append_pair("state", state);
        url.to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        let token = self
            .token_request(&[("code", code), ("grant_type", "authorization_code")])
            .await?;
        let athlete = token.athlete.ok_or_else(|| {
            Error::External("strava token response without athlete".to_string())
        })?;
        debug!(athlete_id = athlete.id, "exchanged strava authorization code");
        Ok(TokenGrant {
            athlete: Athlete {
                id: StravaId(athlete.id.to_string()),
                sex: athlete.sex,
            },
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_at,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AccessToken> {
        let token = self
            .token_request(&[
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .await?;
        Ok(AccessToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_at,
        })
    }

    async fn fetch_activity(&self, access_token: &str, activity_id: &str) -> Result<Activity> {
        let resp = self
            .http
            .get(format!("{API_BASE}/activities/{activity_id}"))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::External(format!("strava request error: {e}")))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("strava activity {activity_id}")));
        }
        let raw: StravaActivity = read_json(resp, "activity").await?;
        Ok(raw.into_activity())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(resp: reqwest::Response, what: &str) -> Result<T> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::NotConnected(format!("strava rejected {what} request")));
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::External(format!(
            "strava {what} request failed: {status} {}",
            body.chars().take(200).collect::<String>()
        )));
    }
    resp.json()
        .await
        .map_err(|e| Error::External(format!("strava {what} json error: {e}")))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
    #[serde(default)]
    athlete: Option<RawAthlete>,
}

#[derive(Debug, Deserialize)]
struct RawAthlete {
    id: u64,
    #[serde(default)]
    sex: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StravaActivity {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    sport_type: Option<String>,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    moving_time: u64,
    #[serde(default)]
    elapsed_time: u64,
    #[serde(default)]
    average_heartrate: Option<f64>,
    #[serde(default)]
    max_heartrate: Option<f64>,
    #[serde(default)]
    total_elevation_gain: f64,
    start_date: DateTime<Utc>,
}

impl StravaActivity {
    fn into_activity(self) -> Activity {
        let kind = self.sport_type.as_deref().unwrap_or(&self.kind);
        Activity {
            id: self.id.to_string(),
            kind: ActivityKind::from_strava(kind),
            name: self.name,
            distance_m: self.distance,
            moving_time_s: self.moving_time,
            elapsed_time_s: self.elapsed_time,
            average_heartrate: self.average_heartrate,
            max_heartrate: self.max_heartrate,
            elevation_gain_m: self.total_elevation_gain,
            start: self.start_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_carries_scope_and_state() {
        let client = StravaClient::new("123", "secret", "http://localhost:3000/auth/accept").unwrap();
        let url = Url::parse(&client.authorize_url("42.abc")).unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("www.strava.com"));
        assert_eq!(pairs["client_id"], "123");
        assert_eq!(pairs["state"], "42.abc");
        assert_eq!(pairs["scope"], SCOPE);
        assert_eq!(pairs["redirect_uri"], "http://localhost:3000/auth/accept");
        assert_eq!(pairs["response_type"], "code");
    }

    #[test]
    fn parses_activity_payload() {
        let raw: StravaActivity = serde_json::from_str(
            r#"{
                "id": 987,
                "name": "Evening Ride",
                "type": "Ride",
                "sport_type": "GravelRide",
                "distance": 25000.5,
                "moving_time": 3600,
                "elapsed_time": 4000,
                "average_heartrate": 140.2,
                "total_elevation_gain": 210.0,
                "start_date": "2024-03-04T17:00:00Z",
                "map": {"id": "x"}
            }"#,
        )
        .unwrap();
        let activity = raw.into_activity();
        assert_eq!(activity.id, "987");
        assert_eq!(activity.kind, ActivityKind::Ride);
        assert_eq!(activity.moving_time_s, 3600);
        assert_eq!(activity.average_heartrate, Some(140.2));
        assert_eq!(activity.max_heartrate, None);
    }

    #[test]
    fn parses_token_response_with_athlete() {
        let token: TokenResponse = serde_json::from_str(
            r#"{
                "token_type": "Bearer",
                "access_token": "a",
                "refresh_token": "r",
                "expires_at": 1700000000,
                "athlete": {"id": 55, "sex": "F", "firstname": "Sam"}
            }"#,
        )
        .unwrap();
        let athlete = token.athlete.unwrap();
        assert_eq!(athlete.id, 55);
        assert_eq!(athlete.sex.as_deref(), Some("F"));
        assert_eq!(token.expires_at, 1_700_000_000);
    }
}
