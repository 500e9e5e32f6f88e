//! Duration parsing for config values.
//!
//! Accepts a bare integer (seconds) or a string of `<number><unit>` groups
//! such as `"5s"`, `"2m"` or `"1h30m15s"`. Units: `y w d h m s`. A trailing
//! number without a unit counts as seconds.

use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Parse a duration string like "90", "5s" or "1d12h" into a `Duration`.
///
/// Returns `None` for empty input, unknown units or overflow.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let mut total: u64 = 0;
    let mut current: u64 = 0;
    let mut pending = false;

    for c in s.chars() {
        if let Some(digit) = c.to_digit(10) {
            current = current.checked_mul(10)?.checked_add(u64::from(digit))?;
            pending = true;
            continue;
        }

        let multiplier: u64 = match c.to_ascii_lowercase() {
            'y' => 31_557_600,
            'w' => 604_800,
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        if !pending {
            return None;
        }
        total = total.checked_add(current.checked_mul(multiplier)?)?;
        current = 0;
        pending = false;
    }

    total = total.checked_add(current)?;
    Some(Duration::from_secs(total))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

impl RawDuration {
    fn into_duration<E: serde::de::Error>(self) -> Result<Duration, E> {
        match self {
            Self::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Self::Text(text) => parse_duration(&text)
                .ok_or_else(|| E::custom(format!("invalid duration: {text:?}"))),
        }
    }
}

/// serde `deserialize_with` helper for required durations.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    RawDuration::deserialize(deserializer)?.into_duration()
}

/// serde `deserialize_with` helper for optional durations.
pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawDuration>::deserialize(deserializer)?
        .map(RawDuration::into_duration)
        .transpose()
}
