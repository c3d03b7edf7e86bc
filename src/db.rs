use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::entities::{BalanceUpdate, FinancialSource, NewSource, SourceChanges, SourceType};
use crate::money;
use crate::repository::SourceRepository;
use crate::temporal::parse_timestamp;

/// Event for audit trail ("Every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Sources
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sources (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            source_type TEXT NOT NULL,
            institution TEXT,
            description TEXT,
            color_code TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Balance updates (append-only, deduplicated by hash)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS balance_updates (
            row_id INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT UNIQUE NOT NULL,
            source_id TEXT NOT NULL REFERENCES sources(id),
            idempotency_hash TEXT UNIQUE NOT NULL,
            balance REAL NOT NULL,
            notes TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_updates_source ON balance_updates(source_id, created_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            format_time(&event.timestamp),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_time(1, &timestamp_str)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

// Fixed-width so that text ordering matches time ordering
fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ============================================================================
// SQLITE REPOSITORY
// ============================================================================

const SOURCE_COLUMNS: &str =
    "id, name, source_type, institution, description, color_code, is_active, created_at";

const UPDATE_COLUMNS: &str = "id, source_id, balance, notes, created_at";

fn source_from_row(row: &Row) -> rusqlite::Result<FinancialSource> {
    let source_type: String = row.get(2)?;
    let created_at: String = row.get(7)?;

    Ok(FinancialSource {
        id: row.get(0)?,
        name: row.get(1)?,
        source_type: SourceType::parse_lenient(&source_type),
        institution: row.get(3)?,
        description: row.get(4)?,
        color_code: row.get(5)?,
        is_active: row.get(6)?,
        created_at: parse_time(7, &created_at)?,
        updates: Vec::new(),
    })
}

fn update_from_row(row: &Row) -> rusqlite::Result<BalanceUpdate> {
    let created_at: String = row.get(4)?;

    Ok(BalanceUpdate {
        id: row.get(0)?,
        source_id: row.get(1)?,
        balance: row.get(2)?,
        notes: row.get(3)?,
        created_at: parse_time(4, &created_at)?,
    })
}

/// Durable engine backed by SQLite
pub struct SqliteRepository {
    conn: Connection,
    actor: String,
}

impl SqliteRepository {
    /// Wrap an open connection, creating tables if needed
    pub fn new(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteRepository {
            conn,
            actor: "networth".to_string(),
        })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Self::new(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// Name recorded as the actor of audit events
    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn record_event(&self, event_type: &str, entity_type: &str, entity_id: &str, data: serde_json::Value) {
        let event = Event::new(event_type, entity_type, entity_id, data, &self.actor);
        if let Err(e) = insert_event(&self.conn, &event) {
            log::warn!("Failed to record {} event for {}: {}", event_type, entity_id, e);
        }
    }

    fn insert_source(&self, source: &FinancialSource) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO sources ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)", SOURCE_COLUMNS),
            params![
                source.id,
                source.name,
                source.source_type.as_str(),
                source.institution,
                source.description,
                source.color_code,
                source.is_active,
                format_time(&source.created_at),
            ],
        )?;
        Ok(())
    }

    /// Insert a snapshot; `Ok(false)` when an identical one already exists
    pub fn insert_update(&self, update: &BalanceUpdate) -> Result<bool> {
        let result = self.conn.execute(
            "INSERT INTO balance_updates (id, source_id, idempotency_hash, balance, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                update.id,
                update.source_id,
                update.idempotency_hash(),
                update.balance,
                update.notes,
                format_time(&update.created_at),
            ],
        );

        match result {
            Ok(_) => {
                self.record_event(
                    "balance_recorded",
                    "source",
                    &update.source_id,
                    serde_json::json!({
                        "update_id": update.id,
                        "balance": update.balance,
                        "created_at": format_time(&update.created_at),
                    }),
                );
                Ok(true)
            }
            Err(e) if is_constraint_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn updates_for(&self, source_id: &str) -> Result<Vec<BalanceUpdate>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM balance_updates WHERE source_id = ?1 ORDER BY created_at, row_id",
            UPDATE_COLUMNS
        ))?;
        let updates = stmt
            .query_map([source_id], update_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(updates)
    }

    /// Insert a source with its initial updates. Callers own the transaction.
    fn store_new_source(&self, new_source: NewSource) -> Result<FinancialSource> {
        new_source.validate().map_err(|e| anyhow!(e))?;
        let source = new_source.into_source(Utc::now());

        self.insert_source(&source)?;
        for update in &source.updates {
            self.insert_update(update)?;
        }

        self.record_event(
            "source_created",
            "source",
            &source.id,
            serde_json::json!({
                "name": source.name,
                "type": source.source_type.as_str(),
                "initial_balance": source.current_balance(),
            }),
        );
        log::debug!("Created source {} ({})", source.name, source.id);

        Ok(source)
    }

    pub fn count_updates(&self) -> Result<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM balance_updates", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn events_for_source(&self, source_id: &str) -> Result<Vec<Event>> {
        get_events_for_entity(&self.conn, "source", source_id)
    }
}

impl SourceRepository for SqliteRepository {
    fn list_sources(&self) -> Result<Vec<FinancialSource>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM sources ORDER BY created_at, rowid",
            SOURCE_COLUMNS
        ))?;
        let mut sources = stmt
            .query_map([], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM balance_updates ORDER BY created_at, row_id",
            UPDATE_COLUMNS
        ))?;
        let mut by_source: HashMap<String, Vec<BalanceUpdate>> = HashMap::new();
        for update in stmt.query_map([], update_from_row)? {
            let update = update?;
            by_source.entry(update.source_id.clone()).or_default().push(update);
        }

        for source in &mut sources {
            if let Some(updates) = by_source.remove(&source.id) {
                for update in updates {
                    source.push_update(update);
                }
            }
        }

        Ok(sources)
    }

    fn get_source(&self, id: &str) -> Result<Option<FinancialSource>> {
        let source = self
            .conn
            .query_row(
                &format!("SELECT {} FROM sources WHERE id = ?1", SOURCE_COLUMNS),
                [id],
                source_from_row,
            )
            .optional()?;

        match source {
            Some(mut source) => {
                for update in self.updates_for(id)? {
                    source.push_update(update);
                }
                Ok(Some(source))
            }
            None => Ok(None),
        }
    }

    fn create_source(&self, new_source: NewSource) -> Result<FinancialSource> {
        let tx = self.conn.unchecked_transaction()?;
        let source = self.store_new_source(new_source)?;
        tx.commit()?;
        Ok(source)
    }

    fn update_source(&self, id: &str, changes: SourceChanges) -> Result<FinancialSource> {
        let mut source = self
            .get_source(id)?
            .ok_or_else(|| anyhow!("Source not found: {}", id))?;

        changes.apply(&mut source);

        self.conn.execute(
            "UPDATE sources
             SET name = ?1, source_type = ?2, institution = ?3, description = ?4,
                 color_code = ?5, is_active = ?6
             WHERE id = ?7",
            params![
                source.name,
                source.source_type.as_str(),
                source.institution,
                source.description,
                source.color_code,
                source.is_active,
                id,
            ],
        )?;

        self.record_event(
            "source_updated",
            "source",
            id,
            serde_json::json!({
                "name": source.name,
                "type": source.source_type.as_str(),
                "is_active": source.is_active,
            }),
        );
        log::debug!("Updated source {} ({})", source.name, id);

        Ok(source)
    }

    fn delete_source(&self, id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM balance_updates WHERE source_id = ?1", [id])?;
        let deleted = tx.execute("DELETE FROM sources WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(anyhow!("Source not found: {}", id));
        }
        tx.commit()?;

        self.record_event("source_deleted", "source", id, serde_json::json!({}));
        log::debug!("Deleted source {}", id);
        Ok(())
    }

    fn append_balance_update(
        &self,
        source_id: &str,
        balance: f64,
        notes: Option<String>,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<BalanceUpdate> {
        let exists: Option<String> = self
            .conn
            .query_row("SELECT id FROM sources WHERE id = ?1", [source_id], |row| row.get(0))
            .optional()?;
        if exists.is_none() {
            return Err(anyhow!("Source not found: {}", source_id));
        }

        let update = BalanceUpdate::new(
            source_id,
            balance,
            notes,
            created_at.unwrap_or_else(Utc::now),
        );
        if !self.insert_update(&update)? {
            return Err(anyhow!(
                "Duplicate balance update for source {} at {}",
                source_id,
                format_time(&update.created_at)
            ));
        }
        log::debug!("Recorded balance {} for {}", update.balance, source_id);

        Ok(update)
    }
}

// ============================================================================
// CSV IMPORT
// ============================================================================

/// One row of a balance-history CSV: `source,balance,date,notes[,type]`
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceRow {
    pub source: String,
    pub balance: String,
    pub date: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, rename = "type")]
    pub source_type: Option<String>,
}

/// Outcome of an import run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    pub rows: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub sources_created: usize,
}

pub fn load_balance_csv(csv_path: &Path) -> Result<Vec<BalanceRow>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open CSV file")?;

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: BalanceRow = result.context("Failed to deserialize balance row")?;
        rows.push(row);
    }

    Ok(rows)
}

/// Import balance rows. Unknown source names are created on the fly;
/// rows already imported are skipped via the idempotency hash.
pub fn import_balance_updates(repo: &SqliteRepository, rows: &[BalanceRow]) -> Result<ImportReport> {
    let mut report = ImportReport {
        rows: rows.len(),
        ..Default::default()
    };

    // All or nothing: a failure mid-file leaves neither updates nor new sources
    let tx = repo.connection().unchecked_transaction()?;

    let mut known: HashMap<String, String> = repo
        .list_sources()?
        .into_iter()
        .flat_map(|s| [(s.name.to_lowercase(), s.id.clone()), (s.id.clone(), s.id)])
        .collect();

    for (line, row) in rows.iter().enumerate() {
        let name = row.source.trim();
        if name.is_empty() {
            log::warn!("Row {}: missing source name, skipped", line + 1);
            report.skipped += 1;
            continue;
        }

        let Some(created_at) = parse_timestamp(&row.date) else {
            log::warn!("Row {}: unparseable date {:?}, skipped", line + 1, row.date);
            report.skipped += 1;
            continue;
        };

        let existing = known
            .get(&name.to_lowercase())
            .or_else(|| known.get(name))
            .cloned();
        let source_id = match existing {
            Some(id) => id,
            None => {
                let source_type = row
                    .source_type
                    .as_deref()
                    .map(SourceType::parse_lenient)
                    .unwrap_or(SourceType::Other);
                let source = repo.store_new_source(NewSource::new(name, source_type))?;
                known.insert(name.to_lowercase(), source.id.clone());
                report.sources_created += 1;
                source.id
            }
        };

        let notes = row.notes.clone().filter(|n| !n.trim().is_empty());
        let update = BalanceUpdate::new(&source_id, money::parse_amount(&row.balance), notes, created_at);

        if repo.insert_update(&update)? {
            report.inserted += 1;
        } else {
            report.duplicates += 1;
        }
    }

    tx.commit()?;

    log::info!(
        "Imported {} balance updates ({} duplicates, {} skipped, {} new sources)",
        report.inserted,
        report.duplicates,
        report.skipped,
        report.sources_created
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::current_net_worth;
    use chrono::{Duration, TimeZone};
    use std::io::Write;

    fn row(source: &str, balance: &str, date: &str) -> BalanceRow {
        BalanceRow {
            source: source.to_string(),
            balance: balance.to_string(),
            date: date.to_string(),
            notes: None,
            source_type: None,
        }
    }

    #[test]
    fn test_create_and_reload_source() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let created = repo
            .create_source(
                NewSource::new("Equity Savings", SourceType::BankAccount)
                    .with_institution("Equity Bank")
                    .with_initial_balance(2500.0),
            )
            .unwrap();

        let loaded = repo.get_source(&created.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Equity Savings");
        assert_eq!(loaded.source_type, SourceType::BankAccount);
        assert_eq!(loaded.institution.as_deref(), Some("Equity Bank"));
        assert_eq!(loaded.updates.len(), 1);
        assert_eq!(loaded.current_balance(), 2500.0);
        assert!(loaded.is_active);

        assert!(repo.get_source("missing").unwrap().is_none());
    }

    #[test]
    fn test_list_sources_attaches_history() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let bank = repo
            .create_source(NewSource::new("Bank", SourceType::BankAccount))
            .unwrap();
        let wallet = repo
            .create_source(NewSource::new("Wallet", SourceType::MobileMoney))
            .unwrap();

        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        repo.append_balance_update(&bank.id, 100.0, None, Some(t)).unwrap();
        repo.append_balance_update(&bank.id, 150.0, None, Some(t + Duration::days(2))).unwrap();
        repo.append_balance_update(&bank.id, 120.0, None, Some(t + Duration::days(1))).unwrap();
        repo.append_balance_update(&wallet.id, 30.0, Some("airtime".into()), Some(t)).unwrap();

        let sources = repo.list_sources().unwrap();
        assert_eq!(sources.len(), 2);
        let bank = sources.iter().find(|s| s.name == "Bank").unwrap();
        let balances: Vec<f64> = bank.updates.iter().map(|u| u.balance).collect();
        assert_eq!(balances, vec![100.0, 120.0, 150.0]);
        assert_eq!(current_net_worth(&sources), 180.0);
    }

    #[test]
    fn test_append_to_missing_source_fails() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let err = repo.append_balance_update("missing", 1.0, None, None).unwrap_err();
        assert!(err.to_string().contains("Source not found"));
    }

    #[test]
    fn test_update_and_delete_source() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let source = repo
            .create_source(NewSource::new("Cash", SourceType::Cash).with_initial_balance(40.0))
            .unwrap();

        let updated = repo
            .update_source(
                &source.id,
                SourceChanges {
                    is_active: Some(false),
                    color_code: Some("#000000".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(!updated.is_active);

        let reloaded = repo.get_source(&source.id).unwrap().unwrap();
        assert!(!reloaded.is_active);
        assert_eq!(reloaded.color_code, "#000000");

        repo.delete_source(&source.id).unwrap();
        assert!(repo.get_source(&source.id).unwrap().is_none());
        assert_eq!(repo.count_updates().unwrap(), 0);
        assert!(repo.delete_source(&source.id).is_err());
    }

    #[test]
    fn test_mutations_write_audit_events() {
        let repo = SqliteRepository::open_in_memory().unwrap().with_actor("tester");
        let source = repo
            .create_source(NewSource::new("Audited", SourceType::Other).with_initial_balance(1.0))
            .unwrap();
        repo.append_balance_update(&source.id, 2.0, None, None).unwrap();

        let events = repo.events_for_source(&source.id).unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert!(types.contains(&"source_created"));
        assert_eq!(types.iter().filter(|t| **t == "balance_recorded").count(), 2);
        assert!(events.iter().all(|e| e.actor == "tester"));
    }

    #[test]
    fn test_event_log() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let event = Event::new(
            "test_event",
            "source",
            "test_id_123",
            serde_json::json!({"test": "data"}),
            "test_actor",
        );

        insert_event(&conn, &event).unwrap();

        let events = get_events_for_entity(&conn, "source", "test_id_123").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "test_event");
        assert_eq!(events[0].actor, "test_actor");
        assert_eq!(events[0].data["test"], "data");
    }

    #[test]
    fn test_import_is_idempotent() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let rows = vec![
            row("Equity", "1,000.00", "2024-01-01"),
            row("Equity", "1,200.00", "2024-02-01"),
            row("M-Pesa", "KES 350", "2024-02-01T09:30:00Z"),
        ];

        let first = import_balance_updates(&repo, &rows).unwrap();
        assert_eq!(first.rows, 3);
        assert_eq!(first.inserted, 3);
        assert_eq!(first.sources_created, 2);
        assert_eq!(first.duplicates, 0);

        let second = import_balance_updates(&repo, &rows).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 3);
        assert_eq!(second.sources_created, 0);

        assert_eq!(repo.count_updates().unwrap(), 3);
        let sources = repo.list_sources().unwrap();
        assert_eq!(current_net_worth(&sources), 1550.0);
    }

    #[test]
    fn test_failed_import_rolls_back() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        // Any update noted "boom" hits an integer overflow inside SQLite
        repo.connection()
            .execute_batch(
                "CREATE TRIGGER fail_on_boom BEFORE INSERT ON balance_updates
                 WHEN NEW.notes = 'boom'
                 BEGIN SELECT abs(-9223372036854775807 - 1); END;",
            )
            .unwrap();

        let mut failing = row("Equity", "500", "2024-01-02");
        failing.notes = Some("boom".to_string());
        let rows = vec![
            row("Equity", "400", "2024-01-01"),
            row("Stanbic", "90", "2024-01-01"),
            failing,
        ];

        assert!(import_balance_updates(&repo, &rows).is_err());

        assert_eq!(repo.count_updates().unwrap(), 0);
        assert!(repo.list_sources().unwrap().is_empty());
        let events: i64 = repo
            .connection()
            .query_row("SELECT COUNT(*) FROM events", [], |r| r.get(0))
            .unwrap();
        assert_eq!(events, 0);
    }

    #[test]
    fn test_import_matches_existing_source_case_insensitive() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        repo.create_source(NewSource::new("KCB Bank", SourceType::BankAccount))
            .unwrap();

        let report = import_balance_updates(&repo, &[row("kcb bank", "10", "2024-03-01")]).unwrap();
        assert_eq!(report.sources_created, 0);
        assert_eq!(report.inserted, 1);
        assert_eq!(repo.list_sources().unwrap().len(), 1);
    }

    #[test]
    fn test_import_skips_bad_rows_and_coerces_balances() {
        let repo = SqliteRepository::open_in_memory().unwrap();
        let mut typed = row("Shares", "oops", "2024-01-01");
        typed.source_type = Some("stocks".to_string());
        let rows = vec![
            row("", "10", "2024-01-01"),
            row("Bank", "10", "not a date"),
            typed,
        ];

        let report = import_balance_updates(&repo, &rows).unwrap();
        assert_eq!(report.skipped, 2);
        assert_eq!(report.inserted, 1);

        let sources = repo.list_sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].source_type, SourceType::Stocks);
        assert_eq!(sources[0].current_balance(), 0.0);
    }

    #[test]
    fn test_load_balance_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "source,balance,date,notes").unwrap();
        writeln!(file, "Equity,\"1,500.50\",2024-01-01,salary").unwrap();
        writeln!(file, "M-Pesa,200,2024-01-02,").unwrap();
        file.flush().unwrap();

        let rows = load_balance_csv(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].source, "Equity");
        assert_eq!(money::parse_amount(&rows[0].balance), 1500.5);
        assert_eq!(rows[0].notes.as_deref(), Some("salary"));
        assert!(rows[1].source_type.is_none());
    }

    #[test]
    fn test_sqlite_file_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("networth.db");

        {
            let repo = SqliteRepository::open(&path).unwrap();
            repo.create_source(NewSource::new("Persisted", SourceType::Cash).with_initial_balance(7.0))
                .unwrap();
        }

        let repo = SqliteRepository::open(&path).unwrap();
        let sources = repo.list_sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].current_balance(), 7.0);
    }
}
