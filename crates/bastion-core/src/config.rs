use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    domain::{ChannelId, GuildId},
    errors::Error,
    Result,
};

/// Typed configuration shared by the bot and the web service.
#[derive(Clone, Debug)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: GuildId,
    pub instigator: String,
    pub max_concurrent_commands: Option<usize>,

    // Activity posting
    pub post_channel: Option<ChannelId>,
    pub is_production: bool,
    pub post_delay: Duration,
    pub activity_max_age: Duration,

    // Strava
    pub strava_client_id: String,
    pub strava_client_secret: String,
    pub strava_redirect_uri: String,

    // Web
    pub web_bind_address: String,
    pub public_url: String,
    pub settings_url: String,

    // Storage
    pub data_file: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process env in `load`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars(&lookup);

        // Required
        let discord_token = vars.str("DISCORD_TOKEN").unwrap_or_default();
        if discord_token.trim().is_empty() {
            return Err(Error::Config(
                "DISCORD_TOKEN environment variable is required".to_string(),
            ));
        }
        let guild_id = vars
            .u64("DISCORD_SERVER_ID")
            .map(GuildId)
            .ok_or_else(|| {
                Error::Config("DISCORD_SERVER_ID environment variable is required".to_string())
            })?;

        let instigator = vars.str("BOT_INSTIGATOR").unwrap_or_else(|| "!".to_string());
        if instigator.trim().is_empty() {
            return Err(Error::Config("BOT_INSTIGATOR must not be empty".to_string()));
        }
        let max_concurrent_commands = vars.usize("MAX_CONCURRENT_COMMANDS").filter(|n| *n > 0);

        let post_channel = vars.u64("FIT_POST_CHANNEL").map(ChannelId);
        let is_production = vars
            .str("APP_ENV")
            .map(|s| s.trim().eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        // Strava can fire the webhook before the activity is fully processed.
        let post_delay = if is_production {
            Duration::from_millis(vars.u64("POST_DELAY_MS").unwrap_or(45_000))
        } else {
            Duration::ZERO
        };
        let activity_max_age =
            Duration::from_secs(vars.u64("ACTIVITY_MAX_AGE_HOURS").unwrap_or(36) * 3600);

        let strava_client_id = vars.str("STRAVA_CLIENT_ID").unwrap_or_default();
        let strava_client_secret = vars.str("STRAVA_CLIENT_SECRET").unwrap_or_default();

        let web_bind_address = vars
            .str("WEB_BIND_ADDRESS")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let public_url = vars
            .str("PUBLIC_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let strava_redirect_uri = vars
            .str("STRAVA_REDIRECT_URI")
            .unwrap_or_else(|| format!("{public_url}/auth/accept"));
        let settings_url = vars
            .str("SETTINGS_URL")
            .unwrap_or_else(|| format!("{public_url}/settings"));

        let data_file = vars.str("DATA_FILE").and_then(non_empty).map(PathBuf::from);

        Ok(Self {
            discord_token,
            guild_id,
            instigator,
            max_concurrent_commands,
            post_channel,
            is_production,
            post_delay,
            activity_max_age,
            strava_client_id,
            strava_client_secret,
            strava_redirect_uri,
            web_bind_address,
            public_url,
            settings_url,
            data_file,
        })
    }
}

struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    fn str(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn u64(&self, key: &str) -> Option<u64> {
        self.str(key).and_then(|s| s.trim().parse::<u64>().ok())
    }

    fn usize(&self, key: &str) -> Option<usize> {
        self.str(key).and_then(|s| s.trim().parse::<usize>().ok())
    }
}

/// Apply `.env` entries that are not already set in the process env.
fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };
    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_none() {
            env::set_var(key, val);
        }
    }
}

/// `KEY=value` pairs from a dotenv file. Accepts an `export ` prefix and
/// quoted values; unquoted values end at ` #`.
fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, val) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), dotenv_value(val.trim())))
        })
        .collect()
}

fn dotenv_value(raw: &str) -> String {
    for quote in ['"', '\''] {
        if let Some(inner) = raw
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    match raw.find(" #") {
        Some(idx) => raw[..idx].trim_end().to_string(),
        None => raw.to_string(),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
