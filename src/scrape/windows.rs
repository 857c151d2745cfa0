use chrono::{DateTime, Months, Utc};

/// A bounded time range `[oldest, newest]` fetched in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeWindow {
    pub oldest: DateTime<Utc>,
    pub newest: DateTime<Utc>,
    pub kind: WindowKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Historic,
    Incremental,
}

/// Computes the scrape windows for one run from the persisted watermarks.
///
/// The historic window covers `[now − horizon, earliest)` and exists only
/// while already-captured history has not yet reached the backfill
/// horizon. The incremental window `[latest, now]` is always produced;
/// with an empty store its lower bound falls back to the horizon.
pub fn plan_windows(
    now: DateTime<Utc>,
    horizon_years: i32,
    earliest: Option<DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
) -> Vec<ScrapeWindow> {
    let horizon_start = now - Months::new(12 * horizon_years.max(0) as u32);
    let mut windows = Vec::with_capacity(2);

    if let Some(earliest) = earliest {
        if earliest > horizon_start {
            windows.push(ScrapeWindow {
                oldest: horizon_start,
                newest: earliest,
                kind: WindowKind::Historic,
            });
        }
    }

    windows.push(ScrapeWindow {
        oldest: latest.unwrap_or(horizon_start),
        newest: now,
        kind: WindowKind::Incremental,
    });

    windows
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn utc(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    #[test]
    fn empty_store_yields_single_window_from_horizon() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let windows = plan_windows(now, 2, None, None);

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].kind, WindowKind::Incremental);
        assert_eq!(
            windows[0].oldest,
            Utc.with_ymd_and_hms(2022, 6, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(windows[0].newest, now);
    }

    #[test]
    fn shallow_history_adds_historic_window_first() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let earliest = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let latest = Utc.with_ymd_and_hms(2024, 5, 30, 9, 0, 0).unwrap();

        let windows = plan_windows(now, 2, Some(earliest), Some(latest));

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].kind, WindowKind::Historic);
        assert_eq!(
            windows[0].oldest,
            Utc.with_ymd_and_hms(2022, 6, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(windows[0].newest, earliest);

        assert_eq!(windows[1].kind, WindowKind::Incremental);
        assert_eq!(windows[1].oldest, latest);
        assert_eq!(windows[1].newest, now);
    }

    #[test]
    fn deep_history_skips_historic_window() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let earliest = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let latest = Utc.with_ymd_and_hms(2024, 5, 30, 9, 0, 0).unwrap();

        let windows = plan_windows(now, 2, Some(earliest), Some(latest));

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].kind, WindowKind::Incremental);
        assert_eq!(windows[0].oldest, latest);
    }

    #[test]
    fn earliest_exactly_at_horizon_is_already_covered() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let horizon_start = Utc.with_ymd_and_hms(2022, 6, 1, 12, 0, 0).unwrap();

        let windows = plan_windows(now, 2, Some(horizon_start), Some(utc(1_700_000_000_000)));
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].kind, WindowKind::Incremental);
    }
}
