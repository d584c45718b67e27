use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::application::ports::{BalanceRepository, DeductOutcome, RepositoryError};
use crate::domain::{BalanceMonth, EndpointId, UserId};

pub struct PgBalanceRepository {
    pool: PgPool,
}

impl PgBalanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceRepository for PgBalanceRepository {
    #[instrument(skip(self), fields(user_id = %user_id, month = %month))]
    async fn ensure_month(
        &self,
        user_id: UserId,
        month: BalanceMonth,
        seed: Decimal,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO user_balances (user_id, balance_month, current_balance, last_updated)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, balance_month) DO NOTHING
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(month.as_date())
        .bind(seed)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, month = %month))]
    async fn current_balance(
        &self,
        user_id: UserId,
        month: BalanceMonth,
    ) -> Result<Option<Decimal>, RepositoryError> {
        let row = sqlx::query(
            "SELECT current_balance FROM user_balances WHERE user_id = $1 AND balance_month = $2",
        )
        .bind(user_id.as_uuid())
        .bind(month.as_date())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        row.map(|r| {
            r.try_get("current_balance")
                .map_err(|e| RepositoryError::QueryFailed(e.to_string()))
        })
        .transpose()
    }

    /// The row lock held across the read-compare-write is what makes two
    /// concurrent deductions of a one-unit balance resolve to exactly one
    /// success.
    #[instrument(skip(self), fields(user_id = %user_id, month = %month, amount = %amount))]
    async fn deduct(
        &self,
        user_id: UserId,
        month: BalanceMonth,
        endpoint_id: EndpointId,
        amount: Decimal,
    ) -> Result<DeductOutcome, RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        let row = sqlx::query(
            r#"
            SELECT current_balance FROM user_balances
            WHERE user_id = $1 AND balance_month = $2
            FOR UPDATE
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(month.as_date())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        let current: Decimal = match row {
            Some(row) => row
                .try_get("current_balance")
                .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?,
            None => {
                return Err(RepositoryError::NotFound(format!(
                    "balance record for user {} in {}",
                    user_id, month
                )));
            }
        };

        if current < amount {
            // Dropping the transaction releases the lock without mutating.
            return Ok(DeductOutcome::InsufficientBalance { current });
        }

        let new_balance = current - amount;
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE user_balances
            SET current_balance = $3, last_updated = $4
            WHERE user_id = $1 AND balance_month = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(month.as_date())
        .bind(new_balance)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO balance_transactions
                (id, user_id, endpoint_id, deducted_amount, balance_after, transaction_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .bind(endpoint_id.as_uuid())
        .bind(amount)
        .bind(new_balance)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        Ok(DeductOutcome::Deducted { new_balance })
    }

    #[instrument(skip(self), fields(user_id = %user_id, month = %month, amount = %amount))]
    async fn credit(
        &self,
        user_id: UserId,
        month: BalanceMonth,
        endpoint_id: EndpointId,
        amount: Decimal,
    ) -> Result<Decimal, RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        let row = sqlx::query(
            r#"
            SELECT current_balance FROM user_balances
            WHERE user_id = $1 AND balance_month = $2
            FOR UPDATE
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(month.as_date())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        let current: Decimal = match row {
            Some(row) => row
                .try_get("current_balance")
                .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?,
            None => {
                return Err(RepositoryError::NotFound(format!(
                    "balance record for user {} in {}",
                    user_id, month
                )));
            }
        };

        let new_balance = current + amount;
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE user_balances
            SET current_balance = $3, last_updated = $4
            WHERE user_id = $1 AND balance_month = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(month.as_date())
        .bind(new_balance)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO balance_transactions
                (id, user_id, endpoint_id, deducted_amount, balance_after, transaction_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .bind(endpoint_id.as_uuid())
        .bind(-amount)
        .bind(new_balance)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        Ok(new_balance)
    }

    #[instrument(skip(self), fields(user_id = %user_id, month = %month))]
    async fn set_balance(
        &self,
        user_id: UserId,
        month: BalanceMonth,
        amount: Decimal,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO user_balances (user_id, balance_month, current_balance, last_updated)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, balance_month)
            DO UPDATE SET current_balance = EXCLUDED.current_balance,
                          last_updated = EXCLUDED.last_updated
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(month.as_date())
        .bind(amount)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        Ok(())
    }
}
