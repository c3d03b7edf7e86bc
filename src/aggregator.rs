// 📈 Net Worth Aggregator
//
// Pure transformations over financial sources:
// - current net worth (latest balance of each active source)
// - historical series bucketed by calendar day
// - change metrics and CAGR-style growth over a series
//
// Nothing here errors. Missing or degenerate data folds to zero/empty.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entities::{BalanceUpdate, FinancialSource, SourceType};
use crate::temporal::{Period, TimeRange};

// ============================================================================
// OUTPUT TYPES
// ============================================================================

/// One source's contribution to a day's total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceContribution {
    pub source_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub color_code: String,
    pub balance: f64,
}

/// A point of the historical series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetWorthSample {
    pub date: NaiveDate,
    pub total: f64,
    #[serde(default)]
    pub sources: Vec<SourceContribution>,
}

impl NetWorthSample {
    pub fn new(date: NaiveDate, total: f64) -> Self {
        NetWorthSample {
            date,
            total,
            sources: Vec::new(),
        }
    }
}

/// Change between the first and last sample of a series.
/// `percentage` is a fraction (0.2 = 20%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChangeMetrics {
    pub amount: f64,
    pub percentage: f64,
    pub is_positive: bool,
}

impl Default for ChangeMetrics {
    fn default() -> Self {
        ChangeMetrics {
            amount: 0.0,
            percentage: 0.0,
            is_positive: true,
        }
    }
}

// ============================================================================
// CURRENT NET WORTH
// ============================================================================

/// Sum of the latest balance of every active source.
/// Sources without updates contribute 0.
pub fn current_net_worth(sources: &[FinancialSource]) -> f64 {
    sources
        .iter()
        .filter(|s| s.is_active)
        .map(|s| s.current_balance())
        .sum()
}

// ============================================================================
// HISTORICAL NET WORTH
// ============================================================================

/// Net worth per calendar day (UTC) over the `period` window ending at `now`.
///
/// A day's total only includes sources that have an update ON that day;
/// earlier balances are not carried forward. When a source has several
/// updates on the same day, its latest one counts.
pub fn historical_net_worth(
    sources: &[FinancialSource],
    period: Period,
    now: DateTime<Utc>,
) -> Vec<NetWorthSample> {
    let window_start = period.window_start(now);

    // date -> [(source, latest update of that source on that date)]
    let mut buckets: BTreeMap<NaiveDate, Vec<(&FinancialSource, &BalanceUpdate)>> =
        BTreeMap::new();

    for source in sources.iter().filter(|s| s.is_active) {
        for update in source.updates.iter().filter(|u| u.created_at >= window_start) {
            let day = buckets.entry(update.created_at.date_naive()).or_default();
            match day.iter_mut().find(|entry| entry.0.id == source.id) {
                Some(entry) if update.created_at >= entry.1.created_at => entry.1 = update,
                Some(_) => {}
                None => day.push((source, update)),
            }
        }
    }

    buckets
        .into_iter()
        .map(|(date, entries)| {
            let sources: Vec<SourceContribution> = entries
                .into_iter()
                .map(|(source, update)| SourceContribution {
                    source_id: source.id.clone(),
                    name: source.name.clone(),
                    source_type: source.source_type,
                    color_code: source.color_code.clone(),
                    balance: update.balance,
                })
                .collect();
            NetWorthSample {
                date,
                total: sources.iter().map(|c| c.balance).sum(),
                sources,
            }
        })
        .collect()
}

/// Narrow a series to a trend range (samples on or after the cutoff day)
pub fn filter_series(
    series: &[NetWorthSample],
    range: TimeRange,
    now: DateTime<Utc>,
) -> Vec<NetWorthSample> {
    match range.cutoff(now) {
        Some(cutoff) => series.iter().filter(|s| s.date >= cutoff).cloned().collect(),
        None => series.to_vec(),
    }
}

// ============================================================================
// DERIVED METRICS
// ============================================================================

/// First and last totals after ordering by date; `None` below two points
fn endpoints(series: &[NetWorthSample]) -> Option<(f64, f64)> {
    if series.len() < 2 {
        return None;
    }
    // Ties keep slice order, as a stable sort would
    let first = series.iter().min_by_key(|s| s.date)?;
    let last = series.iter().max_by_key(|s| s.date)?;
    Some((first.total, last.total))
}

/// Absolute and relative change between the first and last sample
pub fn derive_change_metrics(series: &[NetWorthSample]) -> ChangeMetrics {
    let Some((first, last)) = endpoints(series) else {
        return ChangeMetrics::default();
    };

    let amount = last - first;
    let percentage = if first != 0.0 { amount / first } else { 0.0 };

    ChangeMetrics {
        amount,
        percentage: if percentage.is_finite() { percentage } else { 0.0 },
        is_positive: amount >= 0.0,
    }
}

/// CAGR-style growth: `(last / first)^(1 / years) - 1`, with `years` fixed
/// by the selected range rather than measured from the samples.
/// Returns 0 when the first value is not positive or the result is not finite.
pub fn growth_rate(series: &[NetWorthSample], range: TimeRange) -> f64 {
    let Some((first, last)) = endpoints(series) else {
        return 0.0;
    };
    if first <= 0.0 {
        return 0.0;
    }

    let rate = (last / first).powf(1.0 / range.years()) - 1.0;
    if rate.is_finite() {
        rate
    } else {
        0.0
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 18, 0, 0).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn source_with(name: &str, history: &[(f64, DateTime<Utc>)]) -> FinancialSource {
        let mut source = FinancialSource::new(name, SourceType::BankAccount);
        let id = source.id.clone();
        for (balance, at) in history {
            source.push_update(BalanceUpdate::new(&id, *balance, None, *at));
        }
        source
    }

    fn sample(d: &str, total: f64) -> NetWorthSample {
        NetWorthSample::new(date(d), total)
    }

    // ------------------------------------------------------------------------
    // current_net_worth
    // ------------------------------------------------------------------------

    #[test]
    fn test_current_net_worth_empty() {
        assert_eq!(current_net_worth(&[]), 0.0);
    }

    #[test]
    fn test_current_net_worth_latest_wins() {
        let day1 = now() - Duration::days(10);
        let day2 = now() - Duration::days(9);
        let day3 = now() - Duration::days(8);
        let source = source_with("Bank", &[(100.0, day1), (150.0, day3), (120.0, day2)]);

        assert_eq!(current_net_worth(&[source]), 150.0);
    }

    #[test]
    fn test_current_net_worth_sums_active_sources() {
        let t = now() - Duration::days(1);
        let bank = source_with("Bank", &[(1000.0, t)]);
        let mpesa = source_with("M-Pesa", &[(250.5, t)]);
        let empty = source_with("Empty", &[]);
        let mut closed = source_with("Closed", &[(99999.0, now())]);
        closed.is_active = false;

        let sources = vec![bank, mpesa, empty, closed];
        assert_eq!(current_net_worth(&sources), 1250.5);
    }

    #[test]
    fn test_current_net_worth_idempotent() {
        let t = now();
        let sources = vec![
            source_with("A", &[(10.0, t), (20.0, t + Duration::hours(1))]),
            source_with("B", &[(-5.0, t)]),
        ];
        let first = current_net_worth(&sources);
        let second = current_net_worth(&sources);
        assert_eq!(first, second);
        assert_eq!(first, 15.0);
    }

    #[test]
    fn test_current_net_worth_negative_total() {
        let loan = source_with("Overdraft", &[(-400.0, now())]);
        assert_eq!(current_net_worth(&[loan]), -400.0);
    }

    // ------------------------------------------------------------------------
    // historical_net_worth
    // ------------------------------------------------------------------------

    #[test]
    fn test_historical_groups_by_day_ascending() {
        let d1 = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let d2 = Utc.with_ymd_and_hms(2024, 3, 12, 9, 0, 0).unwrap();
        let bank = source_with("Bank", &[(1000.0, d2), (900.0, d1)]);
        let mpesa = source_with("M-Pesa", &[(50.0, d1)]);

        let series = historical_net_worth(&[bank, mpesa], Period::Month, now());

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, date("2024-03-10"));
        assert_eq!(series[0].total, 950.0);
        assert_eq!(series[0].sources.len(), 2);
        assert_eq!(series[1].date, date("2024-03-12"));
        // No carry-forward: M-Pesa has no update on the 12th
        assert_eq!(series[1].total, 1000.0);
        assert_eq!(series[1].sources.len(), 1);
        assert_eq!(series[1].sources[0].name, "Bank");
    }

    #[test]
    fn test_historical_same_day_uses_latest_update_per_source() {
        let morning = Utc.with_ymd_and_hms(2024, 3, 14, 8, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 3, 14, 20, 0, 0).unwrap();
        let bank = source_with("Bank", &[(500.0, evening), (300.0, morning)]);

        let series = historical_net_worth(&[bank], Period::Week, now());
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].total, 500.0);
        assert_eq!(series[0].sources.len(), 1);
    }

    #[test]
    fn test_historical_excludes_inactive_sources() {
        let t = now() - Duration::days(2);
        let active = source_with("Active", &[(100.0, t)]);
        let mut inactive = source_with("Inactive", &[(700.0, t)]);
        inactive.is_active = false;

        let series = historical_net_worth(&[active, inactive], Period::Month, now());
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].total, 100.0);
        assert!(series[0].sources.iter().all(|c| c.name == "Active"));
    }

    #[test]
    fn test_historical_week_window() {
        let inside = now() - Duration::days(6);
        let boundary = now() - Duration::days(7);
        let outside = now() - Duration::days(8);
        let bank = source_with("Bank", &[(1.0, outside), (2.0, boundary), (4.0, inside)]);

        let series = historical_net_worth(&[bank], Period::Week, now());
        let totals: Vec<f64> = series.iter().map(|s| s.total).collect();
        assert_eq!(totals, vec![2.0, 4.0]);
    }

    #[test]
    fn test_historical_month_window_is_calendar_month() {
        // now = Mar 15 -> window starts Feb 15 18:00
        let feb_16 = Utc.with_ymd_and_hms(2024, 2, 16, 0, 0, 0).unwrap();
        let feb_14 = Utc.with_ymd_and_hms(2024, 2, 14, 0, 0, 0).unwrap();
        let bank = source_with("Bank", &[(10.0, feb_14), (20.0, feb_16)]);

        let series = historical_net_worth(&[bank], Period::Month, now());
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].date, date("2024-02-16"));
    }

    #[test]
    fn test_historical_contribution_carries_source_tags() {
        let mut stocks = source_with("NSE Portfolio", &[(3000.0, now())]);
        stocks.source_type = SourceType::Stocks;
        stocks.color_code = "#123456".to_string();
        let id = stocks.id.clone();

        let series = historical_net_worth(&[stocks], Period::Week, now());
        let contribution = &series[0].sources[0];
        assert_eq!(contribution.source_id, id);
        assert_eq!(contribution.source_type, SourceType::Stocks);
        assert_eq!(contribution.color_code, "#123456");
        assert_eq!(contribution.balance, 3000.0);
    }

    #[test]
    fn test_historical_empty() {
        assert!(historical_net_worth(&[], Period::Year, now()).is_empty());
        let empty = source_with("Empty", &[]);
        assert!(historical_net_worth(&[empty], Period::Year, now()).is_empty());
    }

    #[test]
    fn test_filter_series_by_range() {
        let series = vec![
            sample("2023-01-01", 1.0),
            sample("2024-01-20", 2.0),
            sample("2024-03-01", 3.0),
        ];
        let recent = filter_series(&series, TimeRange::OneMonth, now());
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].total, 3.0);

        assert_eq!(filter_series(&series, TimeRange::All, now()).len(), 3);
        assert_eq!(filter_series(&series, TimeRange::ThreeMonths, now()).len(), 2);
    }

    // ------------------------------------------------------------------------
    // derive_change_metrics
    // ------------------------------------------------------------------------

    #[test]
    fn test_change_metrics_empty_and_single() {
        let neutral = ChangeMetrics {
            amount: 0.0,
            percentage: 0.0,
            is_positive: true,
        };
        assert_eq!(derive_change_metrics(&[]), neutral);
        assert_eq!(derive_change_metrics(&[sample("2024-01-01", 500.0)]), neutral);
    }

    #[test]
    fn test_change_metrics_two_points() {
        let series = vec![sample("2024-01-01", 1000.0), sample("2024-02-01", 1200.0)];
        let metrics = derive_change_metrics(&series);
        assert_eq!(metrics.amount, 200.0);
        assert!((metrics.percentage - 0.2).abs() < 1e-9);
        assert!(metrics.is_positive);
    }

    #[test]
    fn test_change_metrics_sorts_by_date() {
        let series = vec![
            sample("2024-02-01", 1200.0),
            sample("2024-01-15", 1100.0),
            sample("2024-01-01", 1000.0),
        ];
        let metrics = derive_change_metrics(&series);
        assert_eq!(metrics.amount, 200.0);
    }

    #[test]
    fn test_change_metrics_decline() {
        let series = vec![sample("2024-01-01", 1000.0), sample("2024-02-01", 750.0)];
        let metrics = derive_change_metrics(&series);
        assert_eq!(metrics.amount, -250.0);
        assert!((metrics.percentage + 0.25).abs() < 1e-9);
        assert!(!metrics.is_positive);
    }

    #[test]
    fn test_change_metrics_zero_start() {
        let series = vec![sample("2024-01-01", 0.0), sample("2024-02-01", 800.0)];
        let metrics = derive_change_metrics(&series);
        assert_eq!(metrics.amount, 800.0);
        assert_eq!(metrics.percentage, 0.0);
        assert!(metrics.is_positive);
    }

    // ------------------------------------------------------------------------
    // growth_rate
    // ------------------------------------------------------------------------

    #[test]
    fn test_growth_rate_one_year_is_simple_ratio() {
        let series = vec![sample("2023-03-01", 1000.0), sample("2024-03-01", 1100.0)];
        assert!((growth_rate(&series, TimeRange::OneYear) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_growth_rate_uses_fixed_year_fraction() {
        // Samples only two weeks apart; the 3m range still assumes a quarter
        let series = vec![sample("2024-03-01", 1000.0), sample("2024-03-15", 1100.0)];
        let expected = 1.1_f64.powf(4.0) - 1.0;
        assert!((growth_rate(&series, TimeRange::ThreeMonths) - expected).abs() < 1e-9);

        let all = 1.1_f64.powf(0.5) - 1.0;
        assert!((growth_rate(&series, TimeRange::All) - all).abs() < 1e-9);
    }

    #[test]
    fn test_growth_rate_degenerate_inputs() {
        assert_eq!(growth_rate(&[], TimeRange::OneYear), 0.0);
        assert_eq!(growth_rate(&[sample("2024-01-01", 10.0)], TimeRange::OneYear), 0.0);

        let from_zero = vec![sample("2024-01-01", 0.0), sample("2024-02-01", 10.0)];
        assert_eq!(growth_rate(&from_zero, TimeRange::OneYear), 0.0);

        let from_negative = vec![sample("2024-01-01", -10.0), sample("2024-02-01", 10.0)];
        assert_eq!(growth_rate(&from_negative, TimeRange::OneYear), 0.0);

        // Negative ratio with a fractional exponent would be NaN
        let to_negative = vec![sample("2024-01-01", 10.0), sample("2024-02-01", -10.0)];
        assert_eq!(growth_rate(&to_negative, TimeRange::All), 0.0);
    }

    #[test]
    fn test_pipeline_from_sources_to_metrics() {
        let d1 = now() - Duration::days(20);
        let d2 = now() - Duration::days(1);
        let bank = source_with("Bank", &[(1000.0, d1), (1200.0, d2)]);

        let series = historical_net_worth(&[bank], Period::Month, now());
        let metrics = derive_change_metrics(&series);
        assert_eq!(metrics.amount, 200.0);
        assert!((metrics.percentage - 0.2).abs() < 1e-9);
    }
}
