//! CLI string conversion utilities

use anyhow::{Context, Result};

/// Parse a count string (e.g., "1000", "500k", "1M", "2g") to a number
///
/// Suffixes are decimal: k = 1 000, m = 1 000 000, g = 1 000 000 000.
/// Underscores are accepted as digit separators ("1_000_000").
pub fn parse_count(s: &str) -> Result<usize> {
    let s = s.trim().to_lowercase().replace('_', "");

    let (num_str, multiplier) = if let Some(num) = s.strip_suffix('k') {
        (num, 1_000usize)
    } else if let Some(num) = s.strip_suffix('m') {
        (num, 1_000_000)
    } else if let Some(num) = s.strip_suffix('g') {
        (num, 1_000_000_000)
    } else {
        (s.as_str(), 1)
    };

    let num: usize = num_str
        .parse()
        .with_context(|| format!("Invalid count format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Count too large: {}", s))
}

/// Parse a timeout string (e.g., "90", "30s", "5min", "2h") to whole seconds
///
/// A bare number is seconds. Zero is returned as-is; the validator rejects it.
pub fn parse_duration(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);

    let seconds_per_unit: u64 = match unit.trim() {
        "" | "s" | "sec" | "secs" => 1,
        "m" | "min" | "mins" => 60,
        "h" | "hr" | "hrs" => 3600,
        other => anyhow::bail!("Unknown duration unit '{}' in: {}", other, s),
    };

    let value: u64 = digits
        .parse()
        .with_context(|| format!("Invalid duration: {}", s))?;

    value
        .checked_mul(seconds_per_unit)
        .with_context(|| format!("Duration too large: {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count_plain() {
        assert_eq!(parse_count("1000").unwrap(), 1000);
        assert_eq!(parse_count("1_000_000").unwrap(), 1_000_000);
    }

    #[test]
    fn test_parse_count_suffixes() {
        assert_eq!(parse_count("500k").unwrap(), 500_000);
        assert_eq!(parse_count("1M").unwrap(), 1_000_000);
        assert_eq!(parse_count("2g").unwrap(), 2_000_000_000);
    }

    #[test]
    fn test_parse_count_invalid() {
        assert!(parse_count("lots").is_err());
        assert!(parse_count("1.5m").is_err());
    }

    #[test]
    fn test_parse_timeout_units() {
        assert_eq!(parse_duration("90").unwrap(), 90);
        assert_eq!(parse_duration("30s").unwrap(), 30);
        assert_eq!(parse_duration(" 2 min").unwrap(), 120);
        assert_eq!(parse_duration("2h").unwrap(), 7200);
    }

    #[test]
    fn test_parse_timeout_invalid() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("1.5s").is_err());
    }
}
