// ⏰ Time Selectors
//
// Two different selectors drive the dashboard:
// 1. Period: the lookback window for building the historical series
// 2. TimeRange: the trend-view range, which also fixes the year fraction
//    used by the growth rate
//
// Windows are anchored at an explicit `now` so that every computation is
// reproducible in tests.

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// PERIOD
// ============================================================================

/// Lookback window for the historical net-worth series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

impl Period {
    pub const ALL: [Period; 4] = [Period::Week, Period::Month, Period::Quarter, Period::Year];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Week => "week",
            Period::Month => "month",
            Period::Quarter => "quarter",
            Period::Year => "year",
        }
    }

    /// Start of the window ending at `now`.
    ///
    /// Weeks are 7 days. Months use calendar subtraction, not 30-day blocks;
    /// a day that does not exist in the target month is clamped to its last
    /// day (Mar 31 minus one month is Feb 28/29).
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Period::Week => now - Duration::days(7),
            Period::Month => months_before(now, 1),
            Period::Quarter => months_before(now, 3),
            Period::Year => months_before(now, 12),
        }
    }

    /// Cycle used by the terminal dashboard
    pub fn next(&self) -> Period {
        match self {
            Period::Week => Period::Month,
            Period::Month => Period::Quarter,
            Period::Quarter => Period::Year,
            Period::Year => Period::Week,
        }
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "week" | "1w" | "7d" => Ok(Period::Week),
            "month" | "1m" => Ok(Period::Month),
            "quarter" | "3m" => Ok(Period::Quarter),
            "year" | "1y" | "12m" => Ok(Period::Year),
            other => anyhow::bail!("Unknown period: {} (expected week, month, quarter or year)", other),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TIME RANGE
// ============================================================================

/// Trend-view range selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TimeRange {
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "3m")]
    ThreeMonths,
    #[serde(rename = "6m")]
    SixMonths,
    #[serde(rename = "1y")]
    #[default]
    OneYear,
    #[serde(rename = "all")]
    All,
}

impl TimeRange {
    pub const ALL: [TimeRange; 5] = [
        TimeRange::OneMonth,
        TimeRange::ThreeMonths,
        TimeRange::SixMonths,
        TimeRange::OneYear,
        TimeRange::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::OneMonth => "1m",
            TimeRange::ThreeMonths => "3m",
            TimeRange::SixMonths => "6m",
            TimeRange::OneYear => "1y",
            TimeRange::All => "all",
        }
    }

    /// Fixed year fraction for the growth rate. `All` counts as two years.
    /// This is NOT the elapsed time between samples.
    pub fn years(&self) -> f64 {
        match self {
            TimeRange::OneMonth => 1.0 / 12.0,
            TimeRange::ThreeMonths => 3.0 / 12.0,
            TimeRange::SixMonths => 6.0 / 12.0,
            TimeRange::OneYear => 1.0,
            TimeRange::All => 2.0,
        }
    }

    /// First calendar day included by the range; `None` for `All`
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<NaiveDate> {
        let months = match self {
            TimeRange::OneMonth => 1,
            TimeRange::ThreeMonths => 3,
            TimeRange::SixMonths => 6,
            TimeRange::OneYear => 12,
            TimeRange::All => return None,
        };
        Some(months_before(now, months).date_naive())
    }

    pub fn next(&self) -> TimeRange {
        match self {
            TimeRange::OneMonth => TimeRange::ThreeMonths,
            TimeRange::ThreeMonths => TimeRange::SixMonths,
            TimeRange::SixMonths => TimeRange::OneYear,
            TimeRange::OneYear => TimeRange::All,
            TimeRange::All => TimeRange::OneMonth,
        }
    }
}

impl FromStr for TimeRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        TimeRange::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == normalized)
            .ok_or_else(|| anyhow::anyhow!("Unknown time range: {} (expected 1m, 3m, 6m, 1y or all)", s))
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn months_before(now: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Parse a timestamp given either as RFC 3339 or as a bare `YYYY-MM-DD`
/// (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ============================================================================
// TESTS
// ============================================================================
