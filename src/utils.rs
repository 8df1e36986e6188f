//! Small parsing helpers shared by [`crate::cli`] and [`crate::config`].
//!
//! `parse_duration` generalizes a `m`/`h`/`d`-suffix parser that required a
//! suffix into a `{integer}{ms,s,m,h}` grammar with a bare integer
//! defaulting to seconds — a strict superset restricted to durations, not
//! covering `d` (no duration field here is ever specified in days).

use std::time::Duration;

use crate::errors::EngineError;

/// Parse a duration string like `"500ms"`, `"30s"`, `"5m"`, `"2h"`, or a
/// bare integer (interpreted as whole seconds).
pub fn parse_duration(input: &str) -> Result<Duration, EngineError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(EngineError::validation("duration string is empty"));
    }

    let (digits, suffix) = split_digits_and_suffix(input);
    if digits.is_empty() {
        return Err(EngineError::validation(format!(
            "duration '{input}' has no numeric component"
        )));
    }
    let value: u64 = digits
        .parse()
        .map_err(|_| EngineError::validation(format!("duration '{input}' is not a valid integer")))?;

    let duration = match suffix {
        "" | "s" => Duration::from_secs(value),
        "ms" => Duration::from_millis(value),
        "m" => Duration::from_secs(value * 60),
        "h" => Duration::from_secs(value * 3600),
        other => {
            return Err(EngineError::validation(format!(
                "duration '{input}' has unknown unit '{other}' (expected ms, s, m, or h)"
            )))
        }
    };
    Ok(duration)
}

fn split_digits_and_suffix(input: &str) -> (&str, &str) {
    let split_at = input
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(input.len());
    (&input[..split_at], &input[split_at..])
}
