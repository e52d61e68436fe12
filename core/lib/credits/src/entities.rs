//! Row shapes for the credit ledger (spec §3.5, §3.6).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// `CreditPool(id, owner, current_balance, monthly_allocation,
/// consumed_this_month, next_allocation_at, is_active)` (spec §3.5). The
/// same row shape backs both a per-graph pool and a per-(user,
/// repository_type) pool; `owner` is an opaque string key the caller
/// resolves before calling into this crate (spec Non-goals: no
/// tenant/billing-plan model here).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CreditPoolRow {
    pub id: uuid::Uuid,
    pub owner: String,
    pub current_balance: Decimal,
    pub monthly_allocation: Decimal,
    pub consumed_this_month: Decimal,
    pub next_allocation_at: DateTime<Utc>,
    pub is_active: bool,
}

/// `CreditTransaction(type, amount, description, metadata, created_at)`
/// (spec §3.5/§3.6). A reservation is represented as a transaction with a
/// negative amount and a JSON `metadata` object carrying
/// `reservation_id`/`expires_at`/`status` (spec §3.6).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CreditTransactionRow {
    pub id: uuid::Uuid,
    pub pool_id: uuid::Uuid,
    pub transaction_type: String,
    pub amount: Decimal,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Maximum balance the persisted numeric column can hold (spec §3.5:
/// `current_balance ≤ 99_999_999.99`). Overflow is capped, not rejected.
pub fn max_balance() -> Decimal {
    Decimal::new(9_999_999_999, 2)
}
