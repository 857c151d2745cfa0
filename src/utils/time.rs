use chrono::{DateTime, Utc};

/// Renders a datetime as a Slack history boundary token (`secs.micros`).
pub fn to_slack_ts(dt: DateTime<Utc>) -> String {
    let micros = dt.timestamp_subsec_micros();
    format!("{}.{:06}", dt.timestamp(), micros)
}

/// Parses a Slack message timestamp token into a UTC datetime.
///
/// Slack tokens carry microsecond precision; rolls are keyed at
/// millisecond precision, so the tail is truncated.
pub fn from_slack_ts(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, frac) = match ts.split_once('.') {
        Some((s, f)) => (s, f),
        None => (ts, ""),
    };
    let secs: i64 = secs.parse().ok()?;
    let millis: i64 = if frac.is_empty() {
        0
    } else {
        // pad/truncate the fractional part to exactly three digits
        let frac: String = format!("{:0<3}", frac).chars().take(3).collect();
        frac.parse().ok()?
    };
    DateTime::from_timestamp_millis(secs * 1000 + millis)
}

pub fn to_unix_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub fn from_unix_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}
