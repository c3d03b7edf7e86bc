// 📊 Reports - portfolio distribution and dashboard summary
//
// Built on top of the aggregator; still pure, still fail-soft.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::aggregator::{
    current_net_worth, derive_change_metrics, filter_series, growth_rate, historical_net_worth,
    ChangeMetrics, NetWorthSample,
};
use crate::entities::{FinancialSource, SourceType};
use crate::temporal::{Period, TimeRange};

/// A slice of the portfolio. `share` is a fraction of total net worth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub key: String,
    pub label: String,
    pub color_code: String,
    pub balance: f64,
    pub share: f64,
}

fn share_of(balance: f64, total: f64) -> f64 {
    if total != 0.0 {
        balance / total
    } else {
        0.0
    }
}

/// Percentage-of-portfolio per active source, largest balance first
pub fn distribution(sources: &[FinancialSource]) -> Vec<Allocation> {
    let total = current_net_worth(sources);

    let mut allocations: Vec<Allocation> = sources
        .iter()
        .filter(|s| s.is_active)
        .map(|s| {
            let balance = s.current_balance();
            Allocation {
                key: s.id.clone(),
                label: s.name.clone(),
                color_code: s.color_code.clone(),
                balance,
                share: share_of(balance, total),
            }
        })
        .collect();

    allocations.sort_by(|a, b| b.balance.total_cmp(&a.balance));
    allocations
}

/// Percentage-of-portfolio per source type, largest balance first
pub fn distribution_by_type(sources: &[FinancialSource]) -> Vec<Allocation> {
    let total = current_net_worth(sources);

    let mut by_type: BTreeMap<SourceType, f64> = BTreeMap::new();
    for source in sources.iter().filter(|s| s.is_active) {
        *by_type.entry(source.source_type).or_insert(0.0) += source.current_balance();
    }

    let mut allocations: Vec<Allocation> = by_type
        .into_iter()
        .map(|(source_type, balance)| Allocation {
            key: source_type.as_str().to_string(),
            label: source_type.label().to_string(),
            color_code: source_type.default_color().to_string(),
            balance,
            share: share_of(balance, total),
        })
        .collect();

    allocations.sort_by(|a, b| b.balance.total_cmp(&a.balance));
    allocations
}

/// Everything the dashboard shows, computed in one pass over the sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub net_worth: f64,
    pub active_sources: usize,
    pub total_sources: usize,
    pub period: Period,
    pub range: TimeRange,
    pub history: Vec<NetWorthSample>,
    pub change: ChangeMetrics,
    pub growth_rate: f64,
    pub distribution: Vec<Allocation>,
    pub distribution_by_type: Vec<Allocation>,
}

impl DashboardSummary {
    /// `period` selects the history window; `range` narrows the series used
    /// for the change metrics and fixes the growth-rate year fraction.
    pub fn build(
        sources: &[FinancialSource],
        period: Period,
        range: TimeRange,
        now: DateTime<Utc>,
    ) -> Self {
        let history = historical_net_worth(sources, period, now);
        let trend = filter_series(&history, range, now);

        DashboardSummary {
            net_worth: current_net_worth(sources),
            active_sources: sources.iter().filter(|s| s.is_active).count(),
            total_sources: sources.len(),
            period,
            range,
            change: derive_change_metrics(&trend),
            growth_rate: growth_rate(&trend, range),
            history,
            distribution: distribution(sources),
            distribution_by_type: distribution_by_type(sources),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::BalanceUpdate;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn source(name: &str, source_type: SourceType, balances: &[(f64, i64)]) -> FinancialSource {
        let mut source = FinancialSource::new(name, source_type);
        let id = source.id.clone();
        for (balance, days_ago) in balances {
            source.push_update(BalanceUpdate::new(
                &id,
                *balance,
                None,
                now() - Duration::days(*days_ago),
            ));
        }
        source
    }

    #[test]
    fn test_distribution_shares() {
        let sources = vec![
            source("Bank", SourceType::BankAccount, &[(300.0, 1)]),
            source("M-Pesa", SourceType::MobileMoney, &[(100.0, 1)]),
            source("Stocks", SourceType::Stocks, &[(600.0, 1)]),
        ];

        let allocations = distribution(&sources);
        assert_eq!(allocations.len(), 3);
        assert_eq!(allocations[0].label, "Stocks");
        assert!((allocations[0].share - 0.6).abs() < 1e-9);
        assert!((allocations[2].share - 0.1).abs() < 1e-9);

        let total_share: f64 = allocations.iter().map(|a| a.share).sum();
        assert!((total_share - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_distribution_skips_inactive_and_handles_zero_total() {
        let mut closed = source("Closed", SourceType::Cash, &[(500.0, 1)]);
        closed.is_active = false;
        let empty = source("Empty", SourceType::Cash, &[]);

        let allocations = distribution(&[closed, empty]);
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].label, "Empty");
        assert_eq!(allocations[0].share, 0.0);
    }

    #[test]
    fn test_distribution_by_type_groups() {
        let sources = vec![
            source("Equity", SourceType::BankAccount, &[(200.0, 1)]),
            source("KCB", SourceType::BankAccount, &[(300.0, 1)]),
            source("Wallet", SourceType::Cash, &[(500.0, 1)]),
        ];

        let allocations = distribution_by_type(&sources);
        assert_eq!(allocations.len(), 2);
        let bank = allocations.iter().find(|a| a.key == "bank_account").unwrap();
        assert_eq!(bank.balance, 500.0);
        assert!((bank.share - 0.5).abs() < 1e-9);
        assert_eq!(bank.label, "Bank Account");
    }

    #[test]
    fn test_dashboard_summary() {
        let mut closed = source("Closed", SourceType::Other, &[(1.0, 1)]);
        closed.is_active = false;
        let sources = vec![
            source("Bank", SourceType::BankAccount, &[(1000.0, 20), (1200.0, 2)]),
            closed,
        ];

        let summary = DashboardSummary::build(&sources, Period::Month, TimeRange::OneMonth, now());

        assert_eq!(summary.net_worth, 1200.0);
        assert_eq!(summary.active_sources, 1);
        assert_eq!(summary.total_sources, 2);
        assert_eq!(summary.history.len(), 2);
        assert_eq!(summary.change.amount, 200.0);
        let expected_growth = 1.2_f64.powf(12.0) - 1.0;
        assert!((summary.growth_rate - expected_growth).abs() < 1e-6);
        assert_eq!(summary.distribution.len(), 1);
    }

    #[test]
    fn test_dashboard_summary_empty() {
        let summary = DashboardSummary::build(&[], Period::Week, TimeRange::All, now());
        assert_eq!(summary.net_worth, 0.0);
        assert!(summary.history.is_empty());
        assert_eq!(summary.change, ChangeMetrics::default());
        assert_eq!(summary.growth_rate, 0.0);
        assert!(summary.distribution.is_empty());
    }
}
