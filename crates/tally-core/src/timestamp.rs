//! Locale-formatted submission timestamps.
//!
//! The ledger stores submission times the way a Singapore-locale browser
//! prints them: `18/10/2026, 9:05:07 am`. Day and month are zero-padded, the
//! 12-hour clock is not, and the meridiem marker is lowercase. The wall-clock
//! value is local to one configured timezone, so parsing it back needs that
//! timezone to recover an absolute instant.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{Error, Result};

/// Timezone the ledger is written in unless configured otherwise.
pub const DEFAULT_LEDGER_TIMEZONE: Tz = chrono_tz::Asia::Singapore;

const FORMAT: &str = "%d/%m/%Y, %-I:%M:%S %P";

/// A ledger timestamp could not be turned back into an instant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ledger timestamp {value:?}: {reason}")]
pub struct TimestampParseError {
    /// The raw cell value.
    pub value: String,
    /// What was wrong with it.
    pub reason: &'static str,
}

impl TimestampParseError {
    fn new(value: &str, reason: &'static str) -> Self {
        Self {
            value: value.to_string(),
            reason,
        }
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync + fmt::Debug + 'static {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time from the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Formats and parses ledger timestamps in a fixed timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerTime {
    tz: Tz,
}

impl Default for LedgerTime {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_TIMEZONE)
    }
}

impl LedgerTime {
    /// Creates a formatter for the given timezone.
    #[must_use]
    pub const fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Creates a formatter from an IANA timezone name such as `Asia/Singapore`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the name is not a known timezone.
    pub fn from_name(name: &str) -> Result<Self> {
        name.trim()
            .parse::<Tz>()
            .map(Self::new)
            .map_err(|_| Error::InvalidInput(format!("unknown timezone: {name}")))
    }

    /// Returns the configured timezone.
    #[must_use]
    pub const fn tz(&self) -> Tz {
        self.tz
    }

    /// Renders `instant` as a ledger timestamp.
    #[must_use]
    pub fn format(&self, instant: DateTime<Utc>) -> String {
        instant.with_timezone(&self.tz).format(FORMAT).to_string()
    }

    /// Parses a ledger timestamp (`DD/MM/YYYY, h:mm:ss am|pm`) into an instant.
    ///
    /// Hours may be written with or without a leading zero and the meridiem is
    /// case-insensitive. `12 am` is midnight and `12 pm` is noon. Local times
    /// repeated by a DST change resolve to the earlier instant.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampParseError`] if any segment is missing or out of range.
    pub fn parse(&self, raw: &str) -> std::result::Result<DateTime<Utc>, TimestampParseError> {
        let local = parse_local(raw)?;
        self.tz
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| TimestampParseError::new(raw, "local time does not exist"))
    }
}

fn parse_local(raw: &str) -> std::result::Result<NaiveDateTime, TimestampParseError> {
    let (date, time) = raw
        .trim()
        .split_once(',')
        .ok_or_else(|| TimestampParseError::new(raw, "expected `date, time`"))?;

    let date = parse_date(raw, date.trim())?;
    let time = parse_time(raw, time.trim())?;
    Ok(NaiveDateTime::new(date, time))
}

fn parse_date(raw: &str, date: &str) -> std::result::Result<NaiveDate, TimestampParseError> {
    let fields: Vec<&str> = date.split('/').collect();
    let [day, month, year] = fields.as_slice() else {
        return Err(TimestampParseError::new(raw, "expected DD/MM/YYYY"));
    };
    let day: u32 = parse_field(raw, day, "day is not a number")?;
    let month: u32 = parse_field(raw, month, "month is not a number")?;
    let year: i32 = parse_field(raw, year, "year is not a number")?;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| TimestampParseError::new(raw, "date is out of range"))
}

fn parse_time(raw: &str, time: &str) -> std::result::Result<NaiveTime, TimestampParseError> {
    let (clock, meridiem) = time
        .split_once(char::is_whitespace)
        .ok_or_else(|| TimestampParseError::new(raw, "missing am/pm marker"))?;

    let fields: Vec<&str> = clock.split(':').collect();
    let [hour, minute, second] = fields.as_slice() else {
        return Err(TimestampParseError::new(raw, "expected h:mm:ss"));
    };
    let hour: u32 = parse_field(raw, hour, "hour is not a number")?;
    let minute: u32 = parse_field(raw, minute, "minute is not a number")?;
    let second: u32 = parse_field(raw, second, "second is not a number")?;

    if !(1..=12).contains(&hour) {
        return Err(TimestampParseError::new(raw, "hour must be 1-12"));
    }
    let hour = match meridiem.trim().to_ascii_lowercase().as_str() {
        "am" => hour % 12,
        "pm" => hour % 12 + 12,
        _ => return Err(TimestampParseError::new(raw, "unknown am/pm marker")),
    };

    NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| TimestampParseError::new(raw, "time is out of range"))
}

fn parse_field<T: std::str::FromStr>(
    raw: &str,
    field: &str,
    reason: &'static str,
) -> std::result::Result<T, TimestampParseError> {
    field
        .trim()
        .parse()
        .map_err(|_| TimestampParseError::new(raw, reason))
}
