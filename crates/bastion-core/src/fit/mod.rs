//! Strava-backed fitness tracking: exp, levels, fit score and activity posts.

pub mod activity;
pub mod auth;
pub mod commands;
pub mod embeds;
pub mod poster;
pub mod store;
pub mod strava;
pub mod user;
pub mod workout;

use std::sync::Arc;

use store::{AuthRepository, MemoryStore, UserRepository, WorkoutLogRepository};
use strava::{ActivityFetcher, StravaApi};

/// Shared handles used by the fit commands, the poster and the web service.
#[derive(Clone)]
pub struct FitContext {
    pub users: Arc<dyn UserRepository>,
    pub auth: Arc<dyn AuthRepository>,
    pub workouts: Arc<dyn WorkoutLogRepository>,
    pub strava: Arc<dyn StravaApi>,
    pub instigator: String,
}

impl FitContext {
    /// Back every repository with the same store.
    pub fn from_store(
        store: Arc<MemoryStore>,
        strava: Arc<dyn StravaApi>,
        instigator: impl Into<String>,
    ) -> Self {
        Self {
            users: store.clone(),
            auth: store.clone(),
            workouts: store,
            strava,
            instigator: instigator.into(),
        }
    }

    pub fn activity_fetcher(&self) -> ActivityFetcher {
        ActivityFetcher::new(self.auth.clone(), self.strava.clone())
    }
}
