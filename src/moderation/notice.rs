//! Notice formatting
//!
//! Builds the direct-message text explaining a punishment to the user.
//! Pure string assembly: this never fails, even with empty inputs.

use chrono::Duration;

/// Render a duration the way the notice shows it: minutes below two hours,
/// hours with one decimal place at or above.
#[must_use]
pub fn pretty_duration(duration: Duration) -> String {
    let minutes = duration.num_minutes();
    if minutes < 120 {
        format!("{minutes} minutes")
    } else {
        let hours = duration.num_seconds() as f64 / 3600.0;
        format!("{:.1} hours", (hours * 10.0).round() / 10.0)
    }
}

/// Build the user-facing explanation for a punishment.
///
/// A `duration` means a timeout; its absence means an untimed action
/// (warning or ban) and the text says so. An empty rule falls back to a
/// generic phrase.
#[must_use]
pub fn format_notice(rule: &str, note: Option<&str>, duration: Option<Duration>) -> String {
    let rule = if rule.trim().is_empty() {
        "Rule violation"
    } else {
        rule
    };

    let mut lines = Vec::with_capacity(4);
    match duration {
        Some(duration) => lines.push(format!(
            "You were timed out for **{}** due to a server rule violation.",
            pretty_duration(duration)
        )),
        None => lines.push(
            "You received a moderation action (not time-limited) due to a server rule violation."
                .to_string(),
        ),
    }
    lines.push(format!("**Violated rule:** {rule}"));
    if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
        lines.push(format!("**Moderator note:** {note}"));
    }
    lines.push("If you believe this was a mistake, you may reply here.".to_string());

    lines.join("\n")
}
