// Net Worth Tracker - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod aggregator;
pub mod config;
pub mod db;
pub mod entities;
pub mod money;
pub mod reports;
pub mod repository;
pub mod temporal;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use aggregator::{
    current_net_worth, derive_change_metrics, filter_series, growth_rate, historical_net_worth,
    ChangeMetrics, NetWorthSample, SourceContribution,
};
pub use config::Config;
pub use db::{
    get_events_for_entity, import_balance_updates, insert_event, load_balance_csv,
    setup_database, BalanceRow, Event, ImportReport, SqliteRepository,
};
pub use entities::{BalanceUpdate, FinancialSource, NewSource, SourceChanges, SourceType};
pub use reports::{distribution, distribution_by_type, Allocation, DashboardSummary};
pub use repository::{MemoryRepository, SourceRepository};
pub use temporal::{Period, TimeRange};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
