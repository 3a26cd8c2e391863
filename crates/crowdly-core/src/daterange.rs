//! Date-range presets for the analytics queries.
//!
//! Every dashboard query carries a `[from_utc, to_utc]` window in epoch
//! milliseconds. Presets resolve relative to local midnight so "Today"
//! matches what an operator standing at the site means by today.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone};

/// One of the selectable query windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateRange {
    Today,
    Yesterday,
    Last7Days,
    Last30Days,
    /// Explicit bounds from the date inputs. Missing or inverted bounds
    /// fall back to [`Today`](Self::Today) at resolution time.
    Custom {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
}

impl DateRange {
    /// Short label for selector widgets.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Today => "Today",
            Self::Yesterday => "Yesterday",
            Self::Last7Days => "Last 7 Days",
            Self::Last30Days => "Last 30 Days",
            Self::Custom { .. } => "Custom",
        }
    }

    /// Resolve to `(from_utc, to_utc)` in epoch milliseconds, relative
    /// to `now`. Guarantees `from_utc <= to_utc`.
    pub fn resolve(&self, now: DateTime<Local>) -> (i64, i64) {
        let midnight = start_of_day(now);

        match self {
            Self::Today => (midnight.timestamp_millis(), now.timestamp_millis()),

            Self::Yesterday => {
                let start = midnight - Duration::days(1);
                let end = midnight - Duration::milliseconds(1);
                (start.timestamp_millis(), end.timestamp_millis())
            }

            Self::Last7Days => {
                let start = midnight - Duration::days(7);
                (start.timestamp_millis(), now.timestamp_millis())
            }

            Self::Last30Days => {
                let start = midnight - Duration::days(30);
                (start.timestamp_millis(), now.timestamp_millis())
            }

            Self::Custom { from, to } => match (from, to) {
                (Some(from), Some(to)) if from <= to => {
                    let start = date_start(*from, now);
                    let end = date_end(*to, now);
                    (start.timestamp_millis(), end.timestamp_millis())
                }
                // Incomplete or inverted bounds: behave like Today
                _ => Self::Today.resolve(now),
            },
        }
    }
}

fn start_of_day(now: DateTime<Local>) -> DateTime<Local> {
    date_start(now.date_naive(), now)
}

fn date_start(date: NaiveDate, fallback: DateTime<Local>) -> DateTime<Local> {
    Local
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .unwrap_or(fallback)
}

fn date_end(date: NaiveDate, fallback: DateTime<Local>) -> DateTime<Local> {
    let end = date
        .and_hms_milli_opt(23, 59, 59, 999)
        .unwrap_or_else(|| fallback.naive_local());
    Local.from_local_datetime(&end).earliest().unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn noon() -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2026, 3, 15, 12, 30, 0)
            .single()
            .expect("valid local time")
    }

    #[test]
    fn today_spans_midnight_to_now() {
        let now = noon();
        let (from, to) = DateRange::Today.resolve(now);

        assert_eq!(to, now.timestamp_millis());
        let midnight = Local
            .with_ymd_and_hms(2026, 3, 15, 0, 0, 0)
            .single()
            .expect("valid");
        assert_eq!(from, midnight.timestamp_millis());
        assert!(from <= to);
    }

    #[test]
    fn yesterday_is_a_fixed_historical_window() {
        let now = noon();
        let (from, to) = DateRange::Yesterday.resolve(now);

        let start = Local
            .with_ymd_and_hms(2026, 3, 14, 0, 0, 0)
            .single()
            .expect("valid");
        assert_eq!(from, start.timestamp_millis());

        // Ends at 23:59:59.999 of yesterday, strictly before today
        let today_midnight = Local
            .with_ymd_and_hms(2026, 3, 15, 0, 0, 0)
            .single()
            .expect("valid");
        assert_eq!(to, today_midnight.timestamp_millis() - 1);
        assert!(from <= to);
        assert!(to < now.timestamp_millis());
    }

    #[test]
    fn rolling_windows_end_at_now() {
        let now = noon();

        for range in [DateRange::Last7Days, DateRange::Last30Days] {
            let (from, to) = range.resolve(now);
            assert_eq!(to, now.timestamp_millis(), "{range:?}");
            assert!(from <= to, "{range:?}");
        }

        let (from7, _) = DateRange::Last7Days.resolve(now);
        let (from30, _) = DateRange::Last30Days.resolve(now);
        assert!(from30 < from7);
    }

    #[test]
    fn custom_with_both_bounds_uses_them() {
        let now = noon();
        let range = DateRange::Custom {
            from: NaiveDate::from_ymd_opt(2026, 3, 1),
            to: NaiveDate::from_ymd_opt(2026, 3, 7),
        };
        let (from, to) = range.resolve(now);

        let expected_from = Local
            .with_ymd_and_hms(2026, 3, 1, 0, 0, 0)
            .single()
            .expect("valid");
        assert_eq!(from, expected_from.timestamp_millis());
        assert!(from <= to);
        // `to` covers the whole final day
        let next_midnight = Local
            .with_ymd_and_hms(2026, 3, 8, 0, 0, 0)
            .single()
            .expect("valid");
        assert_eq!(to, next_midnight.timestamp_millis() - 1);
    }

    #[test]
    fn custom_missing_a_bound_falls_back_to_today() {
        let now = noon();
        let incomplete = DateRange::Custom {
            from: NaiveDate::from_ymd_opt(2026, 3, 1),
            to: None,
        };
        assert_eq!(incomplete.resolve(now), DateRange::Today.resolve(now));

        let empty = DateRange::Custom { from: None, to: None };
        assert_eq!(empty.resolve(now), DateRange::Today.resolve(now));
    }

    #[test]
    fn custom_inverted_bounds_fall_back_to_today() {
        let now = noon();
        let inverted = DateRange::Custom {
            from: NaiveDate::from_ymd_opt(2026, 3, 10),
            to: NaiveDate::from_ymd_opt(2026, 3, 1),
        };
        assert_eq!(inverted.resolve(now), DateRange::Today.resolve(now));
    }

    #[test]
    fn all_presets_satisfy_ordering() {
        let now = noon();
        let ranges = [
            DateRange::Today,
            DateRange::Yesterday,
            DateRange::Last7Days,
            DateRange::Last30Days,
            DateRange::Custom { from: None, to: None },
        ];
        for range in ranges {
            let (from, to) = range.resolve(now);
            assert!(from <= to, "{range:?} violated from <= to");
        }
    }
}
