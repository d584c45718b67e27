use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{BalanceMonth, EndpointId, UserId};

use super::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeductOutcome {
    Deducted { new_balance: Decimal },
    InsufficientBalance { current: Decimal },
}

#[async_trait]
pub trait BalanceRepository: Send + Sync {
    /// Creates the month's record seeded with `seed` if it does not exist
    /// yet. Idempotent; an existing record is never re-seeded.
    async fn ensure_month(
        &self,
        user_id: UserId,
        month: BalanceMonth,
        seed: Decimal,
    ) -> Result<(), RepositoryError>;

    async fn current_balance(
        &self,
        user_id: UserId,
        month: BalanceMonth,
    ) -> Result<Option<Decimal>, RepositoryError>;

    /// Atomically checks and deducts `amount`, recording the balance
    /// transaction in the same unit of work. Two concurrent calls must never
    /// both succeed when the balance covers only one; the row is locked for
    /// the read-compare-write.
    async fn deduct(
        &self,
        user_id: UserId,
        month: BalanceMonth,
        endpoint_id: EndpointId,
        amount: Decimal,
    ) -> Result<DeductOutcome, RepositoryError>;

    /// Adds `amount` back (a refund). Recorded as a transaction row with a
    /// negated deducted amount. Returns the new balance.
    async fn credit(
        &self,
        user_id: UserId,
        month: BalanceMonth,
        endpoint_id: EndpointId,
        amount: Decimal,
    ) -> Result<Decimal, RepositoryError>;

    /// Administrative override: upserts the month's record to `amount`
    /// directly, bypassing cost calculation.
    async fn set_balance(
        &self,
        user_id: UserId,
        month: BalanceMonth,
        amount: Decimal,
    ) -> Result<(), RepositoryError>;
}
