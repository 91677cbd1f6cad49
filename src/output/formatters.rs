//! Reusable formatting utilities for CLI output
//!
//! Sizes, durations and quota reset times shown by several commands.

use std::time::Duration;

use chrono::{DateTime, Local, Utc};

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Format a duration as `1h 2m 3s`, `2m 5s`, `45s` or `0.4s`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    if total == 0 {
        return format!("{:.1}s", duration.as_secs_f64());
    }

    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

/// Local wall-clock time of a quota reset plus the time left, e.g.
/// `14:30 (in 12m 5s)`. Past resets read `14:30 (now)`.
pub fn format_reset(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let clock = reset_at.with_timezone(&Local).format("%H:%M").to_string();
    match (reset_at - now).to_std() {
        Ok(left) if !left.is_zero() => format!("{} (in {})", clock, format_duration(left)),
        _ => format!("{} (now)", clock),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.00 GB");
    }

    #[test]
    fn test_format_duration_hours() {
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 1m 1s");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h 0m 0s");
    }

    #[test]
    fn test_format_duration_minutes() {
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m 0s");
    }

    #[test]
    fn test_format_duration_subsecond() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_millis(400)), "0.4s");
    }

    #[test]
    fn test_format_reset() {
        let now = Utc::now();
        let future = format_reset(now + chrono::Duration::seconds(125), now);
        assert!(future.ends_with("(in 2m 5s)"), "{}", future);

        let past = format_reset(now - chrono::Duration::seconds(5), now);
        assert!(past.ends_with("(now)"));
    }
}
