//! Time utilities: timezone-aware report windows and local timestamps.

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{LedgerError, Result};

/// Parse an IANA zone name like "America/Chicago".
pub fn parse_timezone(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| LedgerError::InvalidWindow(format!("invalid timezone: {tz}")))
}

/// First instant of `date` in `tz`. When local midnight falls into a DST gap
/// the day starts at the first representable hour.
fn start_of_day(date: NaiveDate, tz: Tz) -> Result<DateTime<Tz>> {
    (0..3)
        .filter_map(|hour| date.and_hms_opt(hour, 0, 0))
        .find_map(|ndt| tz.from_local_datetime(&ndt).earliest())
        .ok_or_else(|| LedgerError::InvalidWindow(format!("no local midnight for {date} in {tz}")))
}

/// Inclusive `[start, end]` bounds of a report, resolved to start-of-day and
/// end-of-day (last millisecond) in the caller's zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportWindow {
    pub timezone: Tz,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl ReportWindow {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, timezone: Tz) -> Result<Self> {
        if start_date > end_date {
            return Err(LedgerError::InvalidWindow(format!(
                "start {start_date} is after end {end_date}"
            )));
        }

        let start = start_of_day(start_date, timezone)?;
        let next_day = end_date.succ_opt().ok_or_else(|| {
            LedgerError::InvalidWindow(format!("end date out of range: {end_date}"))
        })?;
        let end = start_of_day(next_day, timezone)? - Duration::milliseconds(1);

        Ok(Self {
            timezone,
            start,
            end,
        })
    }

    /// A window covering only the current day in `timezone`.
    pub fn today(timezone: Tz) -> Result<Self> {
        let today = Utc::now().with_timezone(&timezone).date_naive();
        Self::new(today, today, timezone)
    }

    pub fn contains(&self, block_time: i64) -> bool {
        let Some(millis) = block_time.checked_mul(1000) else {
            return false;
        };
        self.start.timestamp_millis() <= millis && millis <= self.end.timestamp_millis()
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date_naive()
    }
}

/// Block time rendered in the report zone.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LocalStamp {
    /// `YYYY-MM-DD`
    pub day: String,
    /// Clock time with zone abbreviation, e.g. `3:04:05 PM EST`
    pub time: String,
    /// RFC 3339 with millisecond precision and local offset
    pub timestamp: String,
    /// IANA zone name
    pub timezone: String,
}

/// Returns `None` when `block_time` is outside chrono's representable range.
pub fn local_stamp(block_time: i64, tz: Tz) -> Option<LocalStamp> {
    let local = DateTime::from_timestamp(block_time, 0)?.with_timezone(&tz);
    Some(LocalStamp {
        day: local.format("%Y-%m-%d").to_string(),
        time: local.format("%-I:%M:%S %p %Z").to_string(),
        timestamp: local.to_rfc3339_opts(SecondsFormat::Millis, false),
        timezone: tz.name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_bounds_chicago() {
        // Mar 18 2024 is CDT (UTC-5)
        let tz = parse_timezone("America/Chicago").unwrap();
        let w = ReportWindow::new(date(2024, 3, 18), date(2024, 3, 18), tz).unwrap();
        assert_eq!(w.start.to_rfc3339(), "2024-03-18T00:00:00-05:00");
        assert_eq!(
            w.end.to_rfc3339_opts(SecondsFormat::Millis, false),
            "2024-03-18T23:59:59.999-05:00"
        );
    }

    #[test]
    fn test_window_is_inclusive() {
        let tz = parse_timezone("UTC").unwrap();
        let w = ReportWindow::new(date(2024, 1, 1), date(2024, 1, 2), tz).unwrap();
        let start = w.start.timestamp();
        let last_second = w.end.timestamp();
        assert!(w.contains(start));
        assert!(w.contains(last_second));
        assert!(!w.contains(start - 1));
        assert!(!w.contains(last_second + 1));
    }

    #[test]
    fn test_window_rejects_reversed_dates() {
        let tz = parse_timezone("UTC").unwrap();
        let err = ReportWindow::new(date(2024, 2, 1), date(2024, 1, 1), tz).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidWindow(_)));
    }

    #[test]
    fn test_invalid_timezone() {
        assert!(matches!(
            parse_timezone("Mars/Olympus"),
            Err(LedgerError::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_local_stamp_new_york() {
        let tz = parse_timezone("America/New_York").unwrap();
        // 2024-01-15T20:30:05Z
        let stamp = local_stamp(1_705_350_605, tz).unwrap();
        assert_eq!(stamp.day, "2024-01-15");
        assert_eq!(stamp.time, "3:30:05 PM EST");
        assert_eq!(stamp.timestamp, "2024-01-15T15:30:05.000-05:00");
        assert_eq!(stamp.timezone, "America/New_York");
    }
}
