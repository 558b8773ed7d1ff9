//! Duration parsing for command-line options.

use anyhow::Context;
use std::time::Duration;

/// Parse a duration string like "1h", "30m", "300s" or "300" into seconds.
///
/// A plain number is read as seconds.
pub fn parse_duration_to_secs(s: &str) -> anyhow::Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty duration string");
    }

    let (num_str, unit, multiplier) = if let Some(n) = s.strip_suffix('h') {
        (n, "hours", 3600)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, "minutes", 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, "seconds", 1)
    } else {
        (s, "duration", 1)
    };

    let value: u64 = num_str
        .parse()
        .with_context(|| format!("Invalid {unit} value: {num_str}"))?;
    value
        .checked_mul(multiplier)
        .with_context(|| format!("Duration out of range: {s}"))
}

/// clap value parser producing a non-zero [`Duration`]
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let secs = parse_duration_to_secs(s)?;
    if secs == 0 {
        anyhow::bail!("Duration must be greater than zero: {s}");
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_to_secs() {
        assert_eq!(parse_duration_to_secs("300").unwrap(), 300);
        assert_eq!(parse_duration_to_secs("300s").unwrap(), 300);
        assert_eq!(parse_duration_to_secs("5m").unwrap(), 300);
        assert_eq!(parse_duration_to_secs("2h").unwrap(), 7200);
        assert_eq!(parse_duration_to_secs(" 10s ").unwrap(), 10);
    }

    #[test]
    fn test_parse_duration_rejects_bad_input() {
        assert!(parse_duration_to_secs("").is_err());
        assert!(parse_duration_to_secs("-5s").is_err());
        assert!(parse_duration_to_secs("tenm").is_err());
        assert!(parse_duration_to_secs("1d").is_err());
        assert!(parse_duration("0s").is_err());
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
    }
}
