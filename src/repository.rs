// 🗂️ Source Repository - explicit storage interface
//
// The aggregator only READS sources. Everything that creates, edits or
// appends goes through this trait, whatever engine sits behind it:
// - MemoryRepository: in-process, no persistence (library callers, API tests)
// - SqliteRepository (db.rs): durable store with audit trail

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};

use crate::entities::{BalanceUpdate, FinancialSource, NewSource, SourceChanges};

pub trait SourceRepository {
    /// All sources with their update history (ascending)
    fn list_sources(&self) -> Result<Vec<FinancialSource>>;

    fn get_source(&self, id: &str) -> Result<Option<FinancialSource>>;

    fn create_source(&self, new_source: NewSource) -> Result<FinancialSource>;

    fn update_source(&self, id: &str, changes: SourceChanges) -> Result<FinancialSource>;

    /// Remove a source together with its balance history
    fn delete_source(&self, id: &str) -> Result<()>;

    /// Append a balance snapshot. `created_at` defaults to now.
    fn append_balance_update(
        &self,
        source_id: &str,
        balance: f64,
        notes: Option<String>,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<BalanceUpdate>;

    /// Find a source by name (case-insensitive) or by id
    fn find_source(&self, name_or_id: &str) -> Result<Option<FinancialSource>> {
        let wanted = name_or_id.trim().to_lowercase();
        Ok(self
            .list_sources()?
            .into_iter()
            .find(|s| s.id == name_or_id || s.name.to_lowercase() == wanted))
    }
}

// ============================================================================
// MEMORY REPOSITORY
// ============================================================================

/// In-memory engine. Clones share the same storage.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    sources: Arc<RwLock<Vec<FinancialSource>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing sources
    pub fn with_sources(sources: Vec<FinancialSource>) -> Self {
        MemoryRepository {
            sources: Arc::new(RwLock::new(sources)),
        }
    }

    pub fn count(&self) -> usize {
        self.sources.read().map(|s| s.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("Source store lock poisoned")
}

impl SourceRepository for MemoryRepository {
    fn list_sources(&self) -> Result<Vec<FinancialSource>> {
        let sources = self.sources.read().map_err(poisoned)?;
        Ok(sources.clone())
    }

    fn get_source(&self, id: &str) -> Result<Option<FinancialSource>> {
        let sources = self.sources.read().map_err(poisoned)?;
        Ok(sources.iter().find(|s| s.id == id).cloned())
    }

    fn create_source(&self, new_source: NewSource) -> Result<FinancialSource> {
        new_source.validate().map_err(|e| anyhow!(e))?;
        let source = new_source.into_source(Utc::now());

        let mut sources = self.sources.write().map_err(poisoned)?;
        sources.push(source.clone());
        log::debug!("Created source {} ({})", source.name, source.id);
        Ok(source)
    }

    fn update_source(&self, id: &str, changes: SourceChanges) -> Result<FinancialSource> {
        let mut sources = self.sources.write().map_err(poisoned)?;
        let source = sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| anyhow!("Source not found: {}", id))?;

        changes.apply(source);
        log::debug!("Updated source {} ({})", source.name, source.id);
        Ok(source.clone())
    }

    fn delete_source(&self, id: &str) -> Result<()> {
        let mut sources = self.sources.write().map_err(poisoned)?;
        let before = sources.len();
        sources.retain(|s| s.id != id);
        if sources.len() == before {
            return Err(anyhow!("Source not found: {}", id));
        }
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
        let mut sources = self.sources.write().map_err(poisoned)?;
        let source = sources
            .iter_mut()
            .find(|s| s.id == source_id)
            .ok_or_else(|| anyhow!("Source not found: {}", source_id))?;

        let update = BalanceUpdate::new(
            source_id,
            balance,
            notes,
            created_at.unwrap_or_else(Utc::now),
        );
        source.push_update(update.clone());
        log::debug!("Recorded balance {} for {}", update.balance, source_id);
        Ok(update)
    }
}

// ============================================================================
// TESTS
// ============================================================================
