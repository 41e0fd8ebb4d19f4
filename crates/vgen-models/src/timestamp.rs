//! Timestamp parsing and formatting helpers.
//!
//! Templates are authored by hand, so section durations arrive in several
//! shapes: plain seconds (`12.5`), suffixed labels (`"8s"`), ranges
//! (`"0-5s"`) and clock strings (`"00:45"`).

/// Parse a clock timestamp (`HH:MM:SS[.mmm]`, `MM:SS[.mmm]` or `SS[.mmm]`)
/// into seconds.
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    if parts.len() > 3 {
        return Err(TimestampError::InvalidFormat(ts.to_string()));
    }

    let names = ["seconds", "minutes", "hours"];
    let mut total = 0.0;
    for (idx, part) in parts.iter().rev().enumerate() {
        let value: f64 = part
            .trim()
            .parse()
            .map_err(|_| TimestampError::InvalidValue(names[idx], part.to_string()))?;
        if value < 0.0 {
            return Err(TimestampError::Negative);
        }
        total += value * 60f64.powi(idx as i32);
    }

    Ok(total)
}

/// Parse a template duration label into seconds.
///
/// Accepts `"12"`, `"12.5s"`, `"0-5s"` (range, yields its length) and
/// clock strings accepted by [`parse_timestamp`].
pub fn parse_duration_label(label: &str) -> Result<f64, TimestampError> {
    let label = label.trim();
    let stripped = label
        .strip_suffix("seconds")
        .or_else(|| label.strip_suffix("sec"))
        .or_else(|| label.strip_suffix('s'))
        .unwrap_or(label)
        .trim();

    if let Some((lo, hi)) = stripped.split_once('-') {
        let lo = parse_timestamp(lo)?;
        let hi = parse_timestamp(hi)?;
        if hi < lo {
            return Err(TimestampError::ReversedRange(label.to_string()));
        }
        return Ok(hi - lo);
    }

    parse_timestamp(stripped)
}

/// Format seconds as `HH:MM:SS`, with milliseconds when they are not zero.
pub fn format_seconds(secs: f64) -> String {
    let millis = (secs.max(0.0) * 1000.0).round() as u64;
    let (whole, ms) = (millis / 1000, millis % 1000);
    let clock = format!("{:02}:{:02}:{:02}", whole / 3600, whole / 60 % 60, whole % 60);
    match ms {
        0 => clock,
        ms => format!("{}.{:03}", clock, ms),
    }
}

/// Errors from parsing clock timestamps and duration labels.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimestampError {
    #[error("empty timestamp")]
    Empty,

    #[error("negative timestamp component")]
    Negative,

    #[error("bad {0} component: {1}")]
    InvalidValue(&'static str, String),

    #[error("'{0}' has more than three ':'-separated components")]
    InvalidFormat(String),

    #[error("range '{0}' ends before it starts")]
    ReversedRange(String),
}
