use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sport type, as reported by Strava's `type`/`sport_type`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    Run,
    Ride,
    Swim,
    Walk,
    Hike,
    Workout,
    Other(String),
}

impl ActivityKind {
    pub fn from_strava(raw: &str) -> Self {
        match raw {
            "Run" | "TrailRun" | "VirtualRun" => ActivityKind::Run,
            "Ride" | "VirtualRide" | "EBikeRide" | "GravelRide" | "MountainBikeRide" => {
                ActivityKind::Ride
            }
            "Swim" => ActivityKind::Swim,
            "Walk" => ActivityKind::Walk,
            "Hike" => ActivityKind::Hike,
            "Workout" | "WeightTraining" | "Crossfit" | "Yoga" => ActivityKind::Workout,
            other => ActivityKind::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ActivityKind::Run => "Run",
            ActivityKind::Ride => "Ride",
            ActivityKind::Swim => "Swim",
            ActivityKind::Walk => "Walk",
            ActivityKind::Hike => "Hike",
            ActivityKind::Workout => "Workout",
            ActivityKind::Other(s) => s,
        }
    }

    /// Past-tense verb for post titles ("Alice just ran!").
    pub fn verb(&self) -> &'static str {
        match self {
            ActivityKind::Run => "ran",
            ActivityKind::Ride => "rode",
            ActivityKind::Swim => "swam",
            ActivityKind::Walk => "walked",
            ActivityKind::Hike => "hiked",
            ActivityKind::Workout => "worked out",
            ActivityKind::Other(_) => "recorded an activity",
        }
    }

    /// Exp multiplier used when no heart-rate data is available.
    pub fn multiplier(&self) -> f64 {
        match self {
            ActivityKind::Run => 1.5,
            ActivityKind::Ride => 1.0,
            ActivityKind::Swim => 2.0,
            ActivityKind::Walk => 0.5,
            ActivityKind::Hike => 1.0,
            ActivityKind::Workout => 1.0,
            ActivityKind::Other(_) => 1.0,
        }
    }

    pub fn color(&self) -> u32 {
        match self {
            ActivityKind::Run => 0xFC4C02,
            ActivityKind::Ride => 0x2E86DE,
            ActivityKind::Swim => 0x00B8D4,
            ActivityKind::Walk | ActivityKind::Hike => 0x27AE60,
            ActivityKind::Workout => 0x8E44AD,
            ActivityKind::Other(_) => 0x95A5A6,
        }
    }

    /// Whether distance is meaningful for this kind (pace/distance fields).
    pub fn has_distance(&self) -> bool {
        !matches!(self, ActivityKind::Workout)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub name: String,
    pub kind: ActivityKind,
    pub distance_m: f64,
    pub moving_time_s: u64,
    pub elapsed_time_s: u64,
    pub average_heartrate: Option<f64>,
    pub max_heartrate: Option<f64>,
    pub elevation_gain_m: f64,
    pub start: DateTime<Utc>,
}

impl Activity {
    pub fn moving_minutes(&self) -> f64 {
        self.moving_time_s as f64 / 60.0
    }

    /// Seconds per kilometre, if the activity covered any distance.
    pub fn pace_secs_per_km(&self) -> Option<u64> {
        if self.distance_m < 1.0 || self.moving_time_s == 0 {
            return None;
        }
        Some((self.moving_time_s as f64 / (self.distance_m / 1000.0)).round() as u64)
    }
}
