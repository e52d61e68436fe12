//! Atomic credit reservation engine over a persisted ledger of credit
//! pools (spec §4.7, §3.5, §3.6).

pub mod connection;
pub mod entities;
pub mod metadata;
pub mod schema;

pub use connection::CreditsConnectionPool;
pub use entities::{max_balance, CreditPoolRow, CreditTransactionRow};
pub use schema::{CreditSchema, ReserveOutcome, ReserveRequest};
