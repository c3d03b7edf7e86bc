// Entity Models
// "Identity persists, values change"
//
// A financial source has a stable UUID identity and an append-only
// timeline of balance snapshots.

pub mod source;

pub use source::{BalanceUpdate, FinancialSource, NewSource, SourceChanges, SourceType};
