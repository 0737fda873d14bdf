use std::collections::HashMap;

use crate::{
    chat::types::Embed,
    domain::UserId,
    fit::{
        activity::Activity,
        user::{LeaderboardEntry, UserProfile, MAX_FIT_SCORE},
        workout::ActivitySummary,
    },
    member::DiscordMember,
};

const PROFILE_COLOR: u32 = 0xFC4C02;
const LEADERBOARD_COLOR: u32 = 0xF1C40F;
const BAR_WIDTH: usize = 10;

pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        return format!("{hours}h {mins:02}m {secs:02}s");
    }
    if mins > 0 {
        return format!("{mins}m {secs:02}s");
    }
    format!("{secs}s")
}

pub fn format_distance(meters: f64) -> String {
    format!("{:.2} km", meters / 1000.0)
}

pub fn format_pace(secs_per_km: u64) -> String {
    format!("{}:{:02} /km", secs_per_km / 60, secs_per_km % 60)
}

/// `▰▰▰▱▱▱▱▱▱▱` style bar for a 0..=1 fraction.
pub fn progress_bar(fraction: f64) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!("{}{}", "▰".repeat(filled), "▱".repeat(BAR_WIDTH - filled))
}

fn level_field(profile: &UserProfile) -> String {
    format!(
        "Level {}\n{} {:.0}/{:.0} exp",
        profile.level,
        progress_bar(profile.exp / profile.exp_to_next),
        profile.exp,
        profile.exp_to_next
    )
}

fn fit_score_field(fit_score: f64) -> String {
    format!(
        "{} {:.1}",
        progress_bar(fit_score / MAX_FIT_SCORE),
        fit_score
    )
}

/// Channel post announcing a new activity.
pub fn activity_embed(
    member: &DiscordMember,
    profile: &UserProfile,
    activity: &Activity,
    exp_gained: f64,
    weekly_exp: f64,
) -> Embed {
    let mut embed = Embed::new()
        .author(member.display_name.clone(), Some(member.avatar_url.clone()))
        .title(format!("{} just {}!", member.display_name, activity.kind.verb()))
        .description(activity.name.clone())
        .url(format!("https://www.strava.com/activities/{}", activity.id))
        .color(activity.kind.color())
        .thumbnail(member.avatar_url.clone())
        .field("Time", format_duration(activity.moving_time_s), true);

    if activity.kind.has_distance() && activity.distance_m > 0.0 {
        embed = embed.field("Distance", format_distance(activity.distance_m), true);
        if let Some(pace) = activity.pace_secs_per_km() {
            embed = embed.field("Pace", format_pace(pace), true);
        }
    }
    if let Some(hr) = activity.average_heartrate {
        embed = embed.field("Avg HR", format!("{hr:.0} bpm"), true);
    }

    embed
        .field("Exp gained", format!("+{exp_gained:.1}"), true)
        .field("This week", format!("{weekly_exp:.1} exp"), true)
        .field("Progress", level_field(profile), false)
        .field("Fit score", fit_score_field(profile.fit_score), false)
        .timestamp(activity.start)
}

pub fn profile_embed(
    member: &DiscordMember,
    profile: &UserProfile,
    summary: &ActivitySummary,
) -> Embed {
    let mut embed = Embed::new()
        .author(member.display_name.clone(), Some(member.avatar_url.clone()))
        .title(format!("{}'s profile", member.display_name))
        .color(PROFILE_COLOR)
        .thumbnail(member.avatar_url.clone())
        .field("Progress", level_field(profile), false)
        .field("Fit score", fit_score_field(profile.fit_score), false)
        .field("Total exp", format!("{:.0}", profile.total_exp), true);

    if let Some(hr) = profile.max_hr {
        embed = embed.field("Max HR", format!("{hr} bpm"), true);
    }

    if summary.is_empty() {
        return embed.footer("No activities recorded yet");
    }
    for entry in &summary.entries {
        let mut line = format!("{}× · {}", entry.count, format_duration(entry.moving_time_s));
        if entry.kind.has_distance() && entry.distance_m > 0.0 {
            line.push_str(&format!(" · {}", format_distance(entry.distance_m)));
        }
        line.push_str(&format!(" · {:.0} exp", entry.exp));
        embed = embed.field(entry.kind.label(), line, false);
    }
    embed
}

pub fn leaderboard_embed(
    entries: &[LeaderboardEntry],
    nicknames: &HashMap<UserId, String>,
) -> Embed {
    let lines: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let name = nicknames
                .get(&e.user_id)
                .cloned()
                .unwrap_or_else(|| e.user_id.to_string());
            let rank = match i {
                0 => "🥇".to_string(),
                1 => "🥈".to_string(),
                2 => "🥉".to_string(),
                n => format!("{}.", n + 1),
            };
            format!("{rank} **{name}** {:.1} (lvl {})", e.fit_score, e.level)
        })
        .collect();

    Embed::new()
        .title("Fit score leaderboard")
        .color(LEADERBOARD_COLOR)
        .description(lines.join("\n"))
}
