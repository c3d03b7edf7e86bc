// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use networth_tracker::temporal::parse_timestamp;
use networth_tracker::{
    historical_net_worth, import_balance_updates, load_balance_csv, money, Config,
    DashboardSummary, FinancialSource, NewSource, Period, SourceChanges, SourceRepository,
    SourceType, SqliteRepository, TimeRange,
};

/// Track financial sources and your net worth over time.
#[derive(Parser, Debug)]
struct Args {
    /// JSON config file
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database (overrides config and NETWORTH_DB)
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the database file
    Init,

    /// Add a financial source
    AddSource {
        name: String,
        /// bank_account, money_market, stocks, mobile_money, cooperative_savings, cash, other
        #[clap(long = "type", default_value = "other")]
        source_type: String,
        #[clap(long)]
        institution: Option<String>,
        #[clap(long)]
        description: Option<String>,
        #[clap(long)]
        color: Option<String>,
        #[clap(long, allow_negative_numbers = true)]
        initial_balance: Option<String>,
    },

    /// Record a new balance for a source (by name or id)
    Record {
        source: String,
        /// Negative for overdrafts and debts
        #[clap(allow_negative_numbers = true)]
        balance: String,
        #[clap(long)]
        notes: Option<String>,
        /// RFC 3339 timestamp or YYYY-MM-DD; defaults to now
        #[clap(long)]
        date: Option<String>,
    },

    /// Import balance history from CSV (source,balance,date,notes[,type])
    Import { csv: PathBuf },

    /// List sources with their current balances
    Sources,

    /// Stop counting a source towards net worth
    Deactivate { source: String },

    /// Count a source towards net worth again
    Activate { source: String },

    /// Delete a source and its balance history
    Remove { source: String },

    /// Net worth, change and distribution
    Summary {
        #[clap(long)]
        period: Option<Period>,
        #[clap(long)]
        range: Option<TimeRange>,
    },

    /// Net worth per day over a period
    History {
        #[clap(long)]
        period: Option<Period>,
    },

    /// Interactive terminal dashboard
    Ui {
        #[clap(long)]
        period: Option<Period>,
        #[clap(long)]
        range: Option<TimeRange>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(db) = args.db {
        config.database_path = db;
    }

    let repo = SqliteRepository::open(&config.database_path)?.with_actor("cli");

    match args.command {
        Command::Init => {
            println!("✓ Database ready at {}", config.database_path.display());
            Ok(())
        }
        Command::AddSource {
            name,
            source_type,
            institution,
            description,
            color,
            initial_balance,
        } => {
            let source_type: SourceType = source_type.parse().map_err(|e: String| anyhow!(e))?;
            let new_source = NewSource {
                name,
                source_type,
                institution,
                description,
                color_code: color,
                initial_balance: initial_balance.as_deref().map(money::parse_amount),
            };
            let source = repo.create_source(new_source)?;
            println!("✓ Added {} ({}) id={}", source.name, source.source_type, source.id);
            Ok(())
        }
        Command::Record {
            source,
            balance,
            notes,
            date,
        } => run_record(&repo, &source, &balance, notes, date.as_deref()),
        Command::Import { csv } => run_import(&repo, &csv),
        Command::Sources => run_sources(&repo),
        Command::Deactivate { source } => set_active(&repo, &source, false),
        Command::Activate { source } => set_active(&repo, &source, true),
        Command::Remove { source } => {
            let found = resolve(&repo, &source)?;
            repo.delete_source(&found.id)?;
            println!("✓ Removed {}", found.name);
            Ok(())
        }
        Command::Summary { period, range } => run_summary(
            &repo,
            period.unwrap_or(config.default_period),
            range.unwrap_or(config.default_range),
        ),
        Command::History { period } => run_history(&repo, period.unwrap_or(config.default_period)),
        Command::Ui { period, range } => run_ui_mode(
            &repo,
            period.unwrap_or(config.default_period),
            range.unwrap_or(config.default_range),
        ),
    }
}

fn resolve(repo: &SqliteRepository, name_or_id: &str) -> Result<FinancialSource> {
    repo.find_source(name_or_id)?
        .ok_or_else(|| anyhow!("Source not found: {}", name_or_id))
}

fn run_record(
    repo: &SqliteRepository,
    source: &str,
    balance: &str,
    notes: Option<String>,
    date: Option<&str>,
) -> Result<()> {
    let source = resolve(repo, source)?;
    let created_at = match date {
        Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| anyhow!("Invalid date: {}", raw))?),
        None => None,
    };

    let update = repo.append_balance_update(&source.id, money::parse_amount(balance), notes, created_at)?;
    println!(
        "✓ {}: {:.2} recorded at {}",
        source.name,
        update.balance,
        update.created_at.format("%Y-%m-%d %H:%M")
    );
    Ok(())
}

fn run_import(repo: &SqliteRepository, csv_path: &std::path::Path) -> Result<()> {
    println!("📂 Loading {}...", csv_path.display());
    let rows = load_balance_csv(csv_path)
        .with_context(|| format!("Failed to import {}", csv_path.display()))?;
    println!("✓ Loaded {} rows", rows.len());

    let report = import_balance_updates(repo, &rows)?;
    println!("✓ Inserted: {} balance updates", report.inserted);
    println!("✓ Skipped duplicates: {}", report.duplicates);
    if report.skipped > 0 {
        println!("⚠ Skipped invalid rows: {}", report.skipped);
    }
    if report.sources_created > 0 {
        println!("✓ New sources: {}", report.sources_created);
    }
    Ok(())
}

fn run_sources(repo: &SqliteRepository) -> Result<()> {
    let sources = repo.list_sources()?;
    if sources.is_empty() {
        println!("No sources yet. Add one with: networth add-source <name> --type bank_account");
        return Ok(());
    }

    println!("{:<28} {:<20} {:>14} {:<8} {}", "Name", "Type", "Balance", "Active", "Last update");
    for source in &sources {
        println!(
            "{:<28} {:<20} {:>14.2} {:<8} {}",
            source.name,
            source.source_type.label(),
            source.current_balance(),
            if source.is_active { "yes" } else { "no" },
            source
                .last_updated()
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    Ok(())
}

fn set_active(repo: &SqliteRepository, name_or_id: &str, active: bool) -> Result<()> {
    let source = resolve(repo, name_or_id)?;
    let changes = SourceChanges {
        is_active: Some(active),
        ..Default::default()
    };
    let updated = repo.update_source(&source.id, changes)?;
    println!(
        "✓ {} is now {}",
        updated.name,
        if updated.is_active { "active" } else { "inactive" }
    );
    Ok(())
}

fn run_summary(repo: &SqliteRepository, period: Period, range: TimeRange) -> Result<()> {
    let sources = repo.list_sources()?;
    let summary = DashboardSummary::build(&sources, period, range, Utc::now());

    println!("💰 Net worth: {:.2}", summary.net_worth);
    println!(
        "   Sources: {} active / {} total",
        summary.active_sources, summary.total_sources
    );
    println!(
        "   Change ({} history, {} range): {}{:.2} ({:+.2}%)",
        period,
        range,
        if summary.change.is_positive { "+" } else { "" },
        summary.change.amount,
        summary.change.percentage * 100.0
    );
    println!("   Growth rate (annualized): {:+.2}%", summary.growth_rate * 100.0);

    if !summary.distribution_by_type.is_empty() {
        println!("\n📊 Distribution by type");
        for allocation in &summary.distribution_by_type {
            println!(
                "   {:<22} {:>14.2} {:>6.1}%",
                allocation.label,
                allocation.balance,
                allocation.share * 100.0
            );
        }
    }
    Ok(())
}

fn run_history(repo: &SqliteRepository, period: Period) -> Result<()> {
    let sources = repo.list_sources()?;
    let series = historical_net_worth(&sources, period, Utc::now());

    if series.is_empty() {
        println!("No balance updates in the last {}", period);
        return Ok(());
    }

    println!("{:<12} {:>14} {}", "Date", "Total", "Sources");
    for sample in &series {
        let names: Vec<&str> = sample.sources.iter().map(|c| c.name.as_str()).collect();
        println!("{:<12} {:>14.2} {}", sample.date.to_string(), sample.total, names.join(", "));
    }
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(repo: &SqliteRepository, period: Period, range: TimeRange) -> Result<()> {
    let sources = repo.list_sources()?;
    let mut app = ui::App::new(sources, period, range);
    ui::run_ui(&mut app)?;
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_repo: &SqliteRepository, _period: Period, _range: TimeRange) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin networth-server --features server");
    std::process::exit(1);
}
