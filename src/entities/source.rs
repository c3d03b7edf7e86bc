// 🏦 Financial Source Entity - stable identity with append-only balance history
//
// "Source name is a VALUE (can change), Source UUID is IDENTITY (never changes)"
//
// - A source (bank account, M-Pesa wallet, stock portfolio...) has a UUID
// - Balance updates are immutable snapshots, only ever appended
// - The current balance is DERIVED from the newest snapshot, never stored

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// SOURCE TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Checking or savings account at a bank
    BankAccount,

    /// Money market fund
    MoneyMarket,

    /// Brokerage / stock holdings
    Stocks,

    /// Mobile money wallet (M-Pesa, Airtel Money, ...)
    MobileMoney,

    /// SACCO / cooperative savings
    CooperativeSavings,

    /// Physical cash
    Cash,

    /// Other / Unknown
    Other,
}

impl SourceType {
    pub const ALL: [SourceType; 7] = [
        SourceType::BankAccount,
        SourceType::MoneyMarket,
        SourceType::Stocks,
        SourceType::MobileMoney,
        SourceType::CooperativeSavings,
        SourceType::Cash,
        SourceType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::BankAccount => "bank_account",
            SourceType::MoneyMarket => "money_market",
            SourceType::Stocks => "stocks",
            SourceType::MobileMoney => "mobile_money",
            SourceType::CooperativeSavings => "cooperative_savings",
            SourceType::Cash => "cash",
            SourceType::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceType::BankAccount => "Bank Account",
            SourceType::MoneyMarket => "Money Market",
            SourceType::Stocks => "Stocks",
            SourceType::MobileMoney => "Mobile Money",
            SourceType::CooperativeSavings => "Cooperative Savings",
            SourceType::Cash => "Cash",
            SourceType::Other => "Other",
        }
    }

    /// Color used when a source is created without one
    pub fn default_color(&self) -> &'static str {
        match self {
            SourceType::BankAccount => "#3B82F6",
            SourceType::MoneyMarket => "#10B981",
            SourceType::Stocks => "#8B5CF6",
            SourceType::MobileMoney => "#F59E0B",
            SourceType::CooperativeSavings => "#EC4899",
            SourceType::Cash => "#6B7280",
            SourceType::Other => "#14B8A6",
        }
    }

    /// Lenient parse: unknown names fall back to `Other`
    pub fn parse_lenient(raw: &str) -> SourceType {
        raw.parse().unwrap_or(SourceType::Other)
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        SourceType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Unknown source type: {}", s))
    }
}

// Accepts the snake_case key or the label; anything else reads as `Other`
impl<'de> Deserialize<'de> for SourceType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(SourceType::parse_lenient(&raw))
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// BALANCE UPDATE
// ============================================================================

/// An immutable balance snapshot (not a delta)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub id: String,
    pub source_id: String,
    pub balance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BalanceUpdate {
    pub fn new(
        source_id: &str,
        balance: f64,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        BalanceUpdate {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            balance,
            notes,
            created_at,
        }
    }

    /// Hash used to skip re-imports of the same snapshot.
    /// Identity = id (UUID), deduplication = hash.
    pub fn idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}",
            self.source_id,
            self.balance,
            self.created_at.to_rfc3339()
        ));
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// FINANCIAL SOURCE ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSource {
    /// Stable identity (UUID) - NEVER changes
    pub id: String,

    pub name: String,

    #[serde(rename = "type")]
    pub source_type: SourceType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub color_code: String,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,

    /// Balance history, ascending by `created_at`
    #[serde(default)]
    pub updates: Vec<BalanceUpdate>,
}

impl FinancialSource {
    /// Create new source entity with UUID and no history
    pub fn new(name: &str, source_type: SourceType) -> Self {
        FinancialSource {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            source_type,
            institution: None,
            description: None,
            color_code: source_type.default_color().to_string(),
            is_active: true,
            created_at: Utc::now(),
            updates: Vec::new(),
        }
    }

    /// The update with the greatest `created_at`.
    ///
    /// On a timestamp tie the one appended last wins.
    pub fn latest_update(&self) -> Option<&BalanceUpdate> {
        self.updates.iter().max_by_key(|u| u.created_at)
    }

    /// Current balance; 0 when the source has no updates
    pub fn current_balance(&self) -> f64 {
        self.latest_update().map(|u| u.balance).unwrap_or(0.0)
    }

    /// Append a snapshot, keeping history ordered by `created_at`.
    /// Equal timestamps keep insertion order.
    pub fn push_update(&mut self, update: BalanceUpdate) {
        let position = self
            .updates
            .partition_point(|u| u.created_at <= update.created_at);
        self.updates.insert(position, update);
    }

    /// Balance change between the oldest and newest snapshot
    pub fn balance_change(&self) -> f64 {
        match (self.updates.first(), self.latest_update()) {
            (Some(first), Some(last)) => last.balance - first.balance,
            _ => 0.0,
        }
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.latest_update().map(|u| u.created_at)
    }
}

// ============================================================================
// INPUTS
// ============================================================================

/// Fields needed to create a source
#[derive(Debug, Clone, Deserialize)]
pub struct NewSource {
    pub name: String,

    #[serde(rename = "type", default = "default_source_type")]
    pub source_type: SourceType,

    #[serde(default)]
    pub institution: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub color_code: Option<String>,

    /// Recorded as the first balance update when present
    #[serde(default, deserialize_with = "crate::money::lenient_opt")]
    pub initial_balance: Option<f64>,
}

fn default_source_type() -> SourceType {
    SourceType::Other
}

impl NewSource {
    pub fn new(name: &str, source_type: SourceType) -> Self {
        NewSource {
            name: name.to_string(),
            source_type,
            institution: None,
            description: None,
            color_code: None,
            initial_balance: None,
        }
    }

    pub fn with_initial_balance(mut self, balance: f64) -> Self {
        self.initial_balance = Some(balance);
        self
    }

    pub fn with_institution(mut self, institution: &str) -> Self {
        self.institution = Some(institution.to_string());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Source name is required".to_string());
        }
        Ok(())
    }

    /// Build the entity. The initial balance, if any, becomes the first update.
    pub fn into_source(self, now: DateTime<Utc>) -> FinancialSource {
        let mut source = FinancialSource::new(self.name.trim(), self.source_type);
        source.created_at = now;
        source.institution = self.institution.filter(|s| !s.trim().is_empty());
        source.description = self.description.filter(|s| !s.trim().is_empty());
        if let Some(color) = self.color_code.filter(|c| !c.trim().is_empty()) {
            source.color_code = color;
        }
        if let Some(balance) = self.initial_balance {
            let update = BalanceUpdate::new(
                &source.id,
                balance,
                Some("Initial balance".to_string()),
                now,
            );
            source.push_update(update);
        }
        source
    }
}

/// Partial edit of a source's descriptive fields.
/// Balance history is never edited through this.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceChanges {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub source_type: Option<SourceType>,
    pub institution: Option<String>,
    pub description: Option<String>,
    pub color_code: Option<String>,
    pub is_active: Option<bool>,
}

impl SourceChanges {
    pub fn apply(self, source: &mut FinancialSource) {
        if let Some(name) = self.name.filter(|n| !n.trim().is_empty()) {
            source.name = name.trim().to_string();
        }
        if let Some(source_type) = self.source_type {
            source.source_type = source_type;
        }
        if let Some(institution) = self.institution {
            source.institution = Some(institution).filter(|s| !s.is_empty());
        }
        if let Some(description) = self.description {
            source.description = Some(description).filter(|s| !s.is_empty());
        }
        if let Some(color) = self.color_code {
            source.color_code = color;
        }
        if let Some(active) = self.is_active {
            source.is_active = active;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
