use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::UserId,
    fit::activity::{Activity, ActivityKind},
};

/// One recorded activity and the exp it earned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkoutLog {
    pub user_id: UserId,
    pub activity_id: String,
    pub kind: ActivityKind,
    pub distance_m: f64,
    pub moving_time_s: u64,
    pub exp: f64,
    pub timestamp: DateTime<Utc>,
}

impl WorkoutLog {
    pub fn create(user_id: UserId, activity: &Activity, exp: f64) -> Self {
        Self {
            user_id,
            activity_id: activity.id.clone(),
            kind: activity.kind.clone(),
            distance_m: activity.distance_m,
            moving_time_s: activity.moving_time_s,
            exp,
            timestamp: activity.start,
        }
    }
}

/// Monday 00:00 UTC of the week containing `now`.
pub fn week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let date = now.date_naive() - Duration::days(now.weekday().num_days_from_monday() as i64);
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeeklyLogs {
    pub logs: Vec<WorkoutLog>,
    pub total_exp: f64,
}

impl WeeklyLogs {
    /// Keep the logs falling in the week of `now`.
    pub fn from_logs(logs: impl IntoIterator<Item = WorkoutLog>, now: DateTime<Utc>) -> Self {
        let start = week_start(now);
        let logs: Vec<WorkoutLog> = logs.into_iter().filter(|l| l.timestamp >= start).collect();
        let total_exp = logs.iter().map(|l| l.exp).sum();
        Self { logs, total_exp }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SummaryEntry {
    pub kind: ActivityKind,
    pub count: usize,
    pub distance_m: f64,
    pub moving_time_s: u64,
    pub exp: f64,
}

/// Per-kind totals, most frequent kind first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActivitySummary {
    pub entries: Vec<SummaryEntry>,
}

impl ActivitySummary {
    pub fn from_logs<'a>(logs: impl IntoIterator<Item = &'a WorkoutLog>) -> Self {
        let mut by_kind: HashMap<ActivityKind, SummaryEntry> = HashMap::new();
        for log in logs {
            let entry = by_kind.entry(log.kind.clone()).or_insert_with(|| SummaryEntry {
                kind: log.kind.clone(),
                count: 0,
                distance_m: 0.0,
                moving_time_s: 0,
                exp: 0.0,
            });
            entry.count += 1;
            entry.distance_m += log.distance_m;
            entry.moving_time_s += log.moving_time_s;
            entry.exp += log.exp;
        }

        let mut entries: Vec<SummaryEntry> = by_kind.into_values().collect();
        entries.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.kind.label().cmp(b.kind.label()))
        });
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
