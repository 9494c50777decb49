use std::time::Duration;

const UNITS: [(&str, u128); 5] = [
    ("day", 86_400_000),
    ("hour", 3_600_000),
    ("minute", 60_000),
    ("second", 1_000),
    ("millisecond", 1),
];

/// Renders a duration as its two most significant non-zero units, e.g.
/// `"5 minutes"` or `"1 hour 30 minutes"`. Anything below a millisecond
/// is dropped.
#[must_use]
pub fn human_duration(duration: Duration) -> String {
    let mut remaining = duration.as_millis();
    let mut parts = Vec::with_capacity(2);

    for (unit, millis) in UNITS {
        if parts.len() == 2 {
            break;
        }
        let count = remaining / millis;
        remaining %= millis;
        if count > 0 {
            let plural = if count == 1 { "" } else { "s" };
            parts.push(format!("{count} {unit}{plural}"));
        }
    }

    if parts.is_empty() {
        return "0 seconds".to_string();
    }
    parts.join(" ")
}
