use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};

use crate::analysis::TimeWindow;

pub fn generate_code_verifier() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(128)
        .map(char::from)
        .collect()
}

pub fn generate_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Formats a track duration as `m:ss`, or `h:mm:ss` from one hour on.
pub fn format_duration(ms: u64) -> String {
    let total_secs = ms / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// `count` back-to-back windows of `days` days each, oldest first.
///
/// Windows sit on a fixed grid of `days`-day steps counted from the Unix
/// epoch, so every run until the newest window is over sees the same windows.
/// The newest window is the one containing `now`.
pub fn analysis_windows(now: DateTime<Utc>, days: u32, count: usize) -> Vec<TimeWindow> {
    let span = TimeDelta::days(i64::from(days.max(1)));
    let step = span.num_seconds();
    let current = now.timestamp().div_euclid(step);
    let end = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds((current + 1) * step);

    let mut windows: Vec<TimeWindow> = (0..count as i32)
        .map(|i| {
            let window_end = end - span * i;
            TimeWindow::new(window_end - span, window_end)
        })
        .collect();
    windows.reverse();
    windows
}

/// Parses a `YYYY-MM-DD` date into the UTC midnight that starts it.
pub fn parse_day_start(date: &str) -> Result<DateTime<Utc>, String> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .map_err(|e| format!("invalid date {:?}: {}", date, e))
}

/// Renders a 0..1 score as a percentage with one decimal.
pub fn percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}
