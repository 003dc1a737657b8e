//! Cut-list parsing.
//!
//! A cut-list names the spans of a recording to keep, one per line:
//!
//! ```text
//! # start      end
//! 0            00:14:30
//! 00:17:05 - 00:31:10.500
//! 2240
//! ```
//!
//! Timestamps are seconds or `[HH:]MM:SS[.mmm]`. Only the last span may omit
//! its end.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::Path;
use std::time::Duration;

use super::types::{validate_segments, Segment};
use crate::config::ConfigError;

static CLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+):)?(\d{1,2}):(\d{1,2})(?:\.(\d{1,3}))?$").expect("valid clock regex")
});

static SECONDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)(?:\.(\d{1,3}))?$").expect("valid seconds regex"));

/// Parses one timestamp.
pub fn parse_timestamp(value: &str) -> Option<Duration> {
    let value = value.trim();

    if let Some(caps) = SECONDS.captures(value) {
        let secs: u64 = caps.get(1)?.as_str().parse().ok()?;
        let millis = caps.get(2).map(|m| fraction_millis(m.as_str())).unwrap_or(0);
        return Some(Duration::from_secs(secs) + Duration::from_millis(millis));
    }

    let caps = CLOCK.captures(value)?;
    let hours: u64 = caps
        .get(1)
        .map(|m| m.as_str().parse().unwrap_or(0))
        .unwrap_or(0);
    let minutes: u64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: u64 = caps.get(3)?.as_str().parse().ok()?;
    if minutes >= 60 || seconds >= 60 {
        return None;
    }
    let millis = caps.get(4).map(|m| fraction_millis(m.as_str())).unwrap_or(0);

    Some(
        Duration::from_secs(hours * 3600 + minutes * 60 + seconds)
            + Duration::from_millis(millis),
    )
}

/// ".5" means 500 ms, ".05" means 50 ms.
fn fraction_millis(digits: &str) -> u64 {
    let padded = format!("{:0<3}", digits);
    padded[..3].parse().unwrap_or(0)
}

/// Parses cut-list text into validated segments.
pub fn parse_cutlist(text: &str) -> Result<Vec<Segment>, ConfigError> {
    let mut segments = Vec::new();

    for (number, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let (start, end) = match line.split_once('-') {
            Some((start, end)) => (start.trim(), end.trim()),
            None => {
                let mut fields = line.split_whitespace();
                let start = fields.next().unwrap_or("");
                let end = fields.next().unwrap_or("");
                if fields.next().is_some() {
                    return Err(invalid_line(number, raw));
                }
                (start, end)
            }
        };

        let start = parse_timestamp(start).ok_or_else(|| invalid_line(number, raw))?;
        let end = if end.is_empty() {
            None
        } else {
            Some(parse_timestamp(end).ok_or_else(|| invalid_line(number, raw))?)
        };
        segments.push(Segment::new(start, end));
    }

    if segments.is_empty() {
        return Ok(vec![Segment::whole()]);
    }

    validate_segments(&segments).map_err(ConfigError::ValidationError)?;
    Ok(segments)
}

/// Reads and parses a cut-list file.
pub fn load_cutlist(path: &Path) -> Result<Vec<Segment>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::ValidationError(format!("cannot read cut-list {}: {}", path.display(), e))
    })?;
    parse_cutlist(&text)
}

fn invalid_line(number: usize, raw: &str) -> ConfigError {
    ConfigError::ValidationError(format!(
        "invalid cut-list line {}: '{}'",
        number + 1,
        raw.trim()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_timestamp("1.5"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_timestamp("14:30"), Some(Duration::from_secs(870)));
        assert_eq!(
            parse_timestamp("01:02:03.25"),
            Some(Duration::from_millis(3_723_250))
        );
        assert_eq!(parse_timestamp("00:61:00"), None);
        assert_eq!(parse_timestamp("abc"), None);
    }

    #[test]
    fn test_parse_cutlist() {
        let text = "\
# keep the show, drop the ads
0            00:14:30
00:17:05 - 00:31:10.500

2240
";
        let segments = parse_cutlist(text).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0], Segment::new(Duration::ZERO, Some(Duration::from_secs(870))));
        assert_eq!(
            segments[1],
            Segment::new(
                Duration::from_secs(1025),
                Some(Duration::from_millis(1_870_500))
            )
        );
        assert_eq!(segments[2], Segment::new(Duration::from_secs(2240), None));
    }

    #[test]
    fn test_empty_cutlist_is_whole_file() {
        let segments = parse_cutlist("# nothing cut\n\n").unwrap();
        assert_eq!(segments, vec![Segment::whole()]);
    }

    #[test]
    fn test_unordered_cutlist_rejected() {
        let err = parse_cutlist("600 900\n0 300\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_garbage_line_rejected() {
        let err = parse_cutlist("0 10 20\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
