use std::{sync::Arc, time::Duration};

use chrono::Utc;
use serde::{Deserialize, Deserializer};
use tracing::{debug, error, info};

use crate::{
    bastion::Bastion,
    config::Config,
    domain::{ChannelId, MessageRef, StravaId},
    fit::{embeds::activity_embed, user::User, workout::WorkoutLog, FitContext},
    recent::RecentIds,
    Result,
};

/// Strava push-subscription event. Ids arrive as numbers but are accepted as
/// strings too.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct WebhookEvent {
    #[serde(deserialize_with = "id_string")]
    pub owner_id: String,
    #[serde(deserialize_with = "id_string")]
    pub object_id: String,
    pub aspect_type: String,
    #[serde(default)]
    pub object_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Num(u64),
    Str(String),
}

fn id_string<'de, D>(d: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawId::deserialize(d)? {
        RawId::Num(n) => n.to_string(),
        RawId::Str(s) => s,
    })
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NotCreate,
    Duplicate,
    TooOld,
    NoPostChannel,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PostOutcome {
    Posted { message: MessageRef, exp: f64 },
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct PosterSettings {
    pub post_channel: Option<ChannelId>,
    pub post_delay: Duration,
    pub max_age: Duration,
}

impl From<&Config> for PosterSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            post_channel: cfg.post_channel,
            post_delay: cfg.post_delay,
            max_age: cfg.activity_max_age,
        }
    }
}

/// Turns webhook events into exp awards and channel posts.
pub struct ActivityPoster {
    ctx: FitContext,
    bastion: Arc<Bastion>,
    settings: PosterSettings,
    recent: RecentIds,
}

impl ActivityPoster {
    pub fn new(ctx: FitContext, bastion: Arc<Bastion>, settings: PosterSettings) -> Self {
        Self {
            ctx,
            bastion,
            settings,
            recent: RecentIds::default(),
        }
    }

    pub async fn handle_event(&self, event: WebhookEvent) -> PostOutcome {
        if event.aspect_type != "create" {
            debug!(aspect = %event.aspect_type, object_id = %event.object_id, "ignoring non-create event");
            return PostOutcome::Skipped(SkipReason::NotCreate);
        }
        if !self.recent.check_and_insert(&event.object_id) {
            debug!(object_id = %event.object_id, "ignoring duplicate activity event");
            return PostOutcome::Skipped(SkipReason::Duplicate);
        }

        match self.post(&event).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_expected() => {
                debug!(owner_id = %event.owner_id, object_id = %event.object_id, error = %e, "activity not posted");
                PostOutcome::Failed(e.to_string())
            }
            Err(e) => {
                error!(owner_id = %event.owner_id, object_id = %event.object_id, error = %e, "failed to post activity");
                PostOutcome::Failed(e.to_string())
            }
        }
    }

    async fn post(&self, event: &WebhookEvent) -> Result<PostOutcome> {
        if !self.settings.post_delay.is_zero() {
            tokio::time::sleep(self.settings.post_delay).await;
        }

        let strava_id = StravaId(event.owner_id.clone());
        let fetcher = self.ctx.activity_fetcher();
        let (linked, activity) = tokio::try_join!(
            self.ctx.users.get_user_by_strava_id(&strava_id),
            fetcher.get_activity_by_strava_id(&strava_id, &event.object_id),
        )?;

        let age = Utc::now().signed_duration_since(activity.start);
        let max_age = chrono::Duration::from_std(self.settings.max_age)
            .unwrap_or(chrono::Duration::MAX);
        if age > max_age {
            debug!(object_id = %activity.id, age_hours = age.num_hours(), "skipping old activity");
            return Ok(PostOutcome::Skipped(SkipReason::TooOld));
        }

        // Other deliveries for the same athlete may be awarding right now.
        let mut exp = 0.0;
        let user = self
            .ctx
            .users
            .update_user(linked.id, &mut |user: &mut User| {
                exp = user.add_activity(&activity);
                Ok(())
            })
            .await?;
        let log = WorkoutLog::create(user.id, &activity, exp);
        self.ctx.workouts.insert_workout(&log).await?;
        info!(user_id = %user.id, object_id = %activity.id, exp, level = user.level, "awarded activity exp");

        let Some(channel) = self.settings.post_channel else {
            return Ok(PostOutcome::Skipped(SkipReason::NoPostChannel));
        };

        let (member, weekly) = tokio::try_join!(
            self.bastion.get_member(user.id),
            self.ctx.workouts.current_logs_for_user(user.id),
        )?;
        let embed = activity_embed(&member, &user.profile(), &activity, exp, weekly.total_exp);
        let message = self.bastion.send_to(channel, embed).await?;
        Ok(PostOutcome::Posted { message, exp })
    }
}
