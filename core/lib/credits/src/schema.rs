//! Atomic reserve/confirm/cancel/allocate operations over the credit
//! ledger (spec §4.7), grounded on the schema-over-connection pattern in
//! `core/lib/storage/src/chain/account/mod.rs`: one `*Schema` struct
//! wrapping a borrowed connection, one method per operation, raw SQL
//! bound with `sqlx::query`/`query_as` rather than an ORM.

use chrono::{DateTime, Utc};
use graphnode_basic_types::{Error, PoolId, ReservationId};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgConnection;
use vlog::{info, warn};

use crate::entities::{max_balance, CreditTransactionRow};
use crate::metadata::{expires_at_of, reservation_id_of, status_of, validate_metadata};

#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub pool_id: PoolId,
    pub amount: Decimal,
    pub operation: String,
    pub timeout_seconds: i64,
    pub reservation_id: ReservationId,
    pub request_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReserveOutcome {
    pub old_balance: Decimal,
    pub new_balance: Decimal,
    pub expires_at: DateTime<Utc>,
}

/// `CreditSchema` mirrors the teacher's `AccountSchema<'a, 'c>`: it borrows
/// a live connection for the duration of one call rather than owning a
/// pool, so callers control transaction boundaries.
pub struct CreditSchema<'a>(pub &'a mut PgConnection);

impl<'a> CreditSchema<'a> {
    /// spec §4.7 `reserve`. A single atomic `UPDATE ... WHERE current_balance
    /// >= :amount RETURNING` is the only way a balance is debited; on zero
    /// rows a read-only follow-up query decides whether the pool was
    /// inactive or simply underfunded.
    pub async fn reserve(&mut self, req: ReserveRequest) -> Result<ReserveOutcome, Error> {
        let expires_at = Utc::now() + chrono::Duration::seconds(req.timeout_seconds);

        let debited: Option<(Decimal, Decimal)> = sqlx::query_as(
            "UPDATE credit_pools
                SET current_balance = current_balance - $1,
                    updated_at = now()
              WHERE id = $2
                AND current_balance >= $1
                AND is_active = true
          RETURNING current_balance + $1 AS old_balance, current_balance AS new_balance",
        )
        .bind(req.amount)
        .bind(req.pool_id.0)
        .fetch_optional(&mut *self.0)
        .await
        .map_err(|e| Error::QueryFailure(e.to_string()))?;

        let (old_balance, new_balance) = match debited {
            Some(pair) => pair,
            None => return Err(self.diagnose_reserve_failure(&req).await?),
        };

        let metadata = json!({
            "reservation_id": req.reservation_id.0,
            "expires_at": expires_at.to_rfc3339(),
            "status": "reserved",
            "operation": req.operation,
            "request_id": req.request_id,
            "user_id": req.user_id,
        });
        validate_metadata(&metadata)?;

        sqlx::query(
            "INSERT INTO credit_transactions (pool_id, transaction_type, amount, description, metadata)
             VALUES ($1, 'reservation', $2, $3, $4)",
        )
        .bind(req.pool_id.0)
        .bind(-req.amount)
        .bind(format!("Reserved for {}", req.operation))
        .bind(&metadata)
        .execute(&mut *self.0)
        .await
        .map_err(|e| Error::QueryFailure(e.to_string()))?;

        info!(pool_id = %req.pool_id, reservation_id = %req.reservation_id, amount = %req.amount, "credits reserved");
        Ok(ReserveOutcome {
            old_balance,
            new_balance,
            expires_at,
        })
    }

    async fn diagnose_reserve_failure(&mut self, req: &ReserveRequest) -> Result<Error, Error> {
        let row: Option<(Decimal, bool)> = sqlx::query_as(
            "SELECT current_balance, is_active FROM credit_pools WHERE id = $1",
        )
        .bind(req.pool_id.0)
        .fetch_optional(&mut *self.0)
        .await
        .map_err(|e| Error::QueryFailure(e.to_string()))?;

        match row {
            None => Ok(Error::NotFound(format!("credit pool {} not found", req.pool_id))),
            Some((_, false)) => {
                warn!(pool_id = %req.pool_id, "reserve rejected: pool inactive");
                Ok(Error::InactivePool)
            }
            Some((balance, true)) => {
                warn!(pool_id = %req.pool_id, required = %req.amount, available = %balance, "reserve rejected: insufficient credits");
                Ok(Error::InsufficientCredits {
                    required: decimal_to_f64(req.amount),
                    available: decimal_to_f64(balance),
                })
            }
        }
    }

    /// spec §4.7 `confirm`. Idempotent: a transaction already marked
    /// `confirmed` is a no-op; one already `cancelled` returns not-found.
    pub async fn confirm(
        &mut self,
        reservation_id: &ReservationId,
        final_metadata: Option<serde_json::Value>,
    ) -> Result<(), Error> {
        let tx = self.find_reservation_transaction(reservation_id).await?;
        let status = status_of(&tx.metadata).unwrap_or("");

        match status {
            "confirmed" => return Ok(()),
            "cancelled" => {
                return Err(Error::NotFound(format!(
                    "reservation {reservation_id} was already cancelled"
                )))
            }
            _ => {}
        }

        if let Some(expires_at) = expires_at_of(&tx.metadata) {
            if expires_at < Utc::now() {
                self.cancel(reservation_id, "expired").await?;
                return Err(Error::ReservationExpired {
                    reservation_id: reservation_id.0.clone(),
                    expires_at,
                });
            }
        }

        let mut metadata = tx.metadata.clone();
        if let Some(extra) = final_metadata {
            if let (Some(dst), Some(src)) = (metadata.as_object_mut(), extra.as_object()) {
                for (k, v) in src {
                    dst.insert(k.clone(), v.clone());
                }
            }
        }
        if let Some(obj) = metadata.as_object_mut() {
            obj.insert("status".into(), json!("confirmed"));
            obj.insert("confirmed_at".into(), json!(Utc::now().to_rfc3339()));
        }
        validate_metadata(&metadata)?;

        sqlx::query(
            "UPDATE credit_transactions
                SET metadata = $1, description = $2, created_at = now()
              WHERE id = $3",
        )
        .bind(&metadata)
        .bind(format!("Confirmed reservation {reservation_id}"))
        .bind(tx.id)
        .execute(&mut *self.0)
        .await
        .map_err(|e| Error::QueryFailure(e.to_string()))?;

        info!(reservation_id = %reservation_id, "reservation confirmed");
        Ok(())
    }

    /// spec §4.7 `cancel`.
    pub async fn cancel(&mut self, reservation_id: &ReservationId, reason: &str) -> Result<(), Error> {
        let tx = self.find_reservation_transaction(reservation_id).await?;
        let refund_amount = -tx.amount;

        let refunded: Option<(Decimal, Decimal)> = sqlx::query_as(
            "UPDATE credit_pools
                SET current_balance = current_balance + $1,
                    updated_at = now()
              WHERE id = $2
          RETURNING current_balance - $1 AS old_balance, current_balance AS new_balance",
        )
        .bind(refund_amount)
        .bind(tx.pool_id)
        .fetch_optional(&mut *self.0)
        .await
        .map_err(|e| Error::QueryFailure(e.to_string()))?;

        if refunded.is_none() {
            return Err(Error::NotFound(format!("credit pool for reservation {reservation_id} not found")));
        }

        let refund_metadata = json!({
            "reservation_id": reservation_id.0,
            "reason": reason,
            "original_transaction_id": tx.id,
        });
        validate_metadata(&refund_metadata)?;

        sqlx::query(
            "INSERT INTO credit_transactions (pool_id, transaction_type, amount, description, metadata)
             VALUES ($1, 'refund', $2, $3, $4)",
        )
        .bind(tx.pool_id)
        .bind(refund_amount)
        .bind(format!("Refund for cancelled reservation {reservation_id} ({reason})"))
        .bind(&refund_metadata)
        .execute(&mut *self.0)
        .await
        .map_err(|e| Error::QueryFailure(e.to_string()))?;

        let mut metadata = tx.metadata.clone();
        if let Some(obj) = metadata.as_object_mut() {
            obj.insert("status".into(), json!("cancelled"));
        }
        sqlx::query("UPDATE credit_transactions SET metadata = $1 WHERE id = $2")
            .bind(&metadata)
            .bind(tx.id)
            .execute(&mut *self.0)
            .await
            .map_err(|e| Error::QueryFailure(e.to_string()))?;

        info!(reservation_id = %reservation_id, reason, "reservation cancelled and refunded");
        Ok(())
    }

    /// spec §4.7 allocation: replaces `current_balance` with
    /// `monthly_allocation`, no rollover, capped at the persisted numeric
    /// ceiling.
    pub async fn allocate_monthly(&mut self, pool_id: &PoolId) -> Result<(), Error> {
        let row: Option<(Decimal,)> = sqlx::query_as(
            "SELECT monthly_allocation FROM credit_pools WHERE id = $1",
        )
        .bind(pool_id.0)
        .fetch_optional(&mut *self.0)
        .await
        .map_err(|e| Error::QueryFailure(e.to_string()))?;

        let allocation = row
            .ok_or_else(|| Error::NotFound(format!("credit pool {pool_id} not found")))?
            .0
            .min(max_balance());

        sqlx::query(
            "UPDATE credit_pools
                SET current_balance = $1,
                    consumed_this_month = 0,
                    next_allocation_at = next_allocation_at + interval '30 days',
                    updated_at = now()
              WHERE id = $2",
        )
        .bind(allocation)
        .bind(pool_id.0)
        .execute(&mut *self.0)
        .await
        .map_err(|e| Error::QueryFailure(e.to_string()))?;

        let metadata = json!({ "allocated_amount": allocation.to_string() });
        sqlx::query(
            "INSERT INTO credit_transactions (pool_id, transaction_type, amount, description, metadata)
             VALUES ($1, 'allocation', $2, 'Monthly credit allocation', $3)",
        )
        .bind(pool_id.0)
        .bind(allocation)
        .bind(&metadata)
        .execute(&mut *self.0)
        .await
        .map_err(|e| Error::QueryFailure(e.to_string()))?;

        info!(pool_id = %pool_id, allocated_amount = %allocation, "monthly credit allocation applied");
        Ok(())
    }

    async fn find_reservation_transaction(
        &mut self,
        reservation_id: &ReservationId,
    ) -> Result<CreditTransactionRow, Error> {
        let rows: Vec<CreditTransactionRow> = sqlx::query_as(
            "SELECT id, pool_id, transaction_type, amount, description, metadata, created_at
               FROM credit_transactions
              WHERE metadata->>'reservation_id' = $1
              ORDER BY created_at DESC
              LIMIT 1",
        )
        .bind(&reservation_id.0)
        .fetch_all(&mut *self.0)
        .await
        .map_err(|e| Error::QueryFailure(e.to_string()))?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound(format!("reservation {reservation_id} not found")))?;
        debug_assert_eq!(reservation_id_of(&row.metadata), Some(reservation_id.0.as_str()));
        Ok(row)
    }
}

fn decimal_to_f64(d: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    d.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_to_f64_converts() {
        assert_eq!(decimal_to_f64(Decimal::new(1050, 2)), 10.5);
    }
}
