//! Human-readable duration parsing and formatting

/// Parse a duration string into whole seconds.
///
/// Accepts raw seconds (`"90"`), `M:SS` (`"5:00"`) and `H:MM:SS` (`"1:30:00"`).
/// Anything else yields `0`, so callers must check the result is positive.
pub fn parse(input: &str) -> u64 {
    let input = input.trim();
    if input.is_empty() {
        return 0;
    }

    if is_digits(input) {
        return input.parse().unwrap_or(0);
    }

    let fields: Option<Vec<u64>> = input
        .split(':')
        .map(|field| is_digits(field).then(|| field.parse().ok()).flatten())
        .collect();

    match fields.as_deref() {
        Some([minutes, seconds]) => combine(0, *minutes, *seconds),
        Some([hours, minutes, seconds]) => combine(*hours, *minutes, *seconds),
        _ => 0,
    }
}

/// Format seconds as `H:MM:SS` from one hour upwards, `M:SS` below that.
pub fn format(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn combine(hours: u64, minutes: u64, seconds: u64) -> u64 {
    hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .and_then(|hm| hm.checked_add(seconds))
        .unwrap_or(0)
}
