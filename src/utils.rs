//! Small helpers shared across the bot: text truncation and
//! human-readable durations.

use std::time::Duration;

/// Safely truncates a string to a maximum character length (not bytes).
///
/// This is UTF-8 safe and will not panic on multi-byte characters.
///
/// # Examples
///
/// ```
/// use filegate_bot::utils::truncate_str;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_str(s, 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Formats a delay the way it is shown to users, e.g. `30 seconds`,
/// `1 minute`, `1 minute 30 seconds`.
///
/// # Examples
///
/// ```
/// use filegate_bot::utils::format_delay;
/// use std::time::Duration;
///
/// assert_eq!(format_delay(Duration::from_secs(30)), "30 seconds");
/// assert_eq!(format_delay(Duration::from_secs(60)), "1 minute");
/// assert_eq!(format_delay(Duration::from_secs(150)), "2 minutes 30 seconds");
/// ```
#[must_use]
pub fn format_delay(delay: Duration) -> String {
    fn unit(n: u64, singular: &str) -> String {
        if n == 1 {
            format!("1 {singular}")
        } else {
            format!("{n} {singular}s")
        }
    }

    let secs = delay.as_secs();
    let (minutes, seconds) = (secs / 60, secs % 60);
    match (minutes, seconds) {
        (0, s) => unit(s, "second"),
        (m, 0) => unit(m, "minute"),
        (m, s) => format!("{} {}", unit(m, "minute"), unit(s, "second")),
    }
}
