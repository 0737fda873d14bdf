use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{domain::UserId, errors::Error, fit::activity::Activity, Result};

pub const MAX_FIT_SCORE: f64 = 100.0;
const FIT_SCORE_DIVISOR: f64 = 10.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unspecified,
}

impl Gender {
    /// Strava's athlete `sex` field: "M", "F" or null.
    pub fn from_strava(sex: Option<&str>) -> Self {
        match sex.map(str::trim) {
            Some("M") => Gender::Male,
            Some("F") => Gender::Female,
            _ => Gender::Unspecified,
        }
    }
}

/// Bot-side profile of a member: exp, level and fit score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub gender: Gender,
    pub max_hr: Option<u32>,
    /// Exp towards the next level.
    pub exp: f64,
    pub total_exp: f64,
    pub level: u32,
    pub fit_score: f64,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UserProfile {
    pub level: u32,
    pub exp: f64,
    pub exp_to_next: f64,
    pub total_exp: f64,
    pub fit_score: f64,
    pub gender: Gender,
    pub max_hr: Option<u32>,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            gender: Gender::Unspecified,
            max_hr: None,
            exp: 0.0,
            total_exp: 0.0,
            level: 1,
            fit_score: 0.0,
            last_activity: None,
        }
    }

    /// Award exp for an activity, applying level-ups. Returns the exp gained.
    pub fn add_activity(&mut self, activity: &Activity) -> f64 {
        let gained = activity_exp(activity, self.max_hr);

        self.exp += gained;
        self.total_exp += gained;
        while self.exp >= exp_for_level(self.level) {
            self.exp -= exp_for_level(self.level);
            self.level += 1;
        }

        self.fit_score = (self.fit_score + gained / FIT_SCORE_DIVISOR).clamp(0.0, MAX_FIT_SCORE);
        self.last_activity = Some(match self.last_activity {
            Some(prev) if prev > activity.start => prev,
            _ => activity.start,
        });

        gained
    }

    pub fn update_gender(&mut self, sex: Option<&str>) {
        self.gender = Gender::from_strava(sex);
    }

    pub fn update_max_heartrate(&mut self, hr: u32) -> Result<()> {
        if !(100..=250).contains(&hr) {
            return Err(Error::InvalidInput(format!(
                "max heart rate must be between 100 and 250 (got {hr})"
            )));
        }
        self.max_hr = Some(hr);
        Ok(())
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            level: self.level,
            exp: self.exp,
            exp_to_next: exp_for_level(self.level),
            total_exp: self.total_exp,
            fit_score: self.fit_score,
            gender: self.gender,
            max_hr: self.max_hr,
        }
    }
}

/// Exp required to go from `level` to `level + 1`.
pub fn exp_for_level(level: u32) -> f64 {
    100.0 + 50.0 * level.saturating_sub(1) as f64
}

/// One exp per moving minute, scaled by heart-rate zone when both the
/// athlete's max HR and the activity's average HR are known, otherwise by
/// activity kind.
pub fn activity_exp(activity: &Activity, max_hr: Option<u32>) -> f64 {
    let minutes = activity.moving_minutes();
    let multiplier = match (max_hr, activity.average_heartrate) {
        (Some(max), Some(avg)) if max > 0 && avg > 0.0 => zone_multiplier(avg / max as f64),
        _ => activity.kind.multiplier(),
    };
    (minutes * multiplier * 10.0).round() / 10.0
}

fn zone_multiplier(intensity: f64) -> f64 {
    match intensity {
        i if i < 0.5 => 0.5,
        i if i < 0.6 => 1.0,
        i if i < 0.7 => 1.5,
        i if i < 0.8 => 2.0,
        i if i < 0.9 => 3.0,
        _ => 4.0,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub fit_score: f64,
    pub level: u32,
}

/// Users with a positive fit score, best first.
pub fn fit_score_leaderboard(users: &[User]) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = users
        .iter()
        .filter(|u| u.fit_score > 0.0)
        .map(|u| LeaderboardEntry {
            user_id: u.id,
            fit_score: u.fit_score,
            level: u.level,
        })
        .collect();

    entries.sort_by(|a, b| {
        b.fit_score
            .total_cmp(&a.fit_score)
            .then(b.level.cmp(&a.level))
            .then(a.user_id.cmp(&b.user_id))
    });
    entries
}
