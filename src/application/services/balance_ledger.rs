use std::sync::Arc;

use rust_decimal::Decimal;

use crate::application::ports::{
    BalanceRepository, DeductOutcome, EndpointCatalog, RepositoryError,
};
use crate::domain::{AccountTier, BalanceMonth, BalanceSnapshot, EndpointId, UserId};

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub tier_allowances: TierAllowances,
    /// Applied when the account is unknown to the catalog.
    pub fallback_allowance: Decimal,
}

#[derive(Debug, Clone)]
pub struct TierAllowances {
    pub free: Decimal,
    pub standard: Decimal,
    pub premium: Decimal,
}

impl TierAllowances {
    pub fn for_tier(&self, tier: AccountTier) -> Decimal {
        match tier {
            AccountTier::Free => self.free,
            AccountTier::Standard => self.standard,
            AccountTier::Premium => self.premium,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient balance: {current} available, {required} required")]
    InsufficientBalance { current: Decimal, required: Decimal },
    #[error("no endpoint registered for path {0}")]
    UnknownEndpoint(String),
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
}

/// Per-user, per-calendar-month credit ledger. All mutation goes through the
/// repository's row-locked deduct/credit operations; this service only
/// resolves amounts and seeds.
pub struct BalanceLedger {
    balances: Arc<dyn BalanceRepository>,
    catalog: Arc<dyn EndpointCatalog>,
    config: LedgerConfig,
}

impl BalanceLedger {
    pub fn new(
        balances: Arc<dyn BalanceRepository>,
        catalog: Arc<dyn EndpointCatalog>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            balances,
            catalog,
            config,
        }
    }

    /// Seeds the current month's record on first touch: custom allowance if
    /// set, else the tier default, else the hard fallback. Safe to call
    /// redundantly.
    pub async fn ensure_month_initialized(
        &self,
        user_id: UserId,
    ) -> Result<BalanceMonth, LedgerError> {
        let month = BalanceMonth::current();
        let seed = self.monthly_allowance(user_id).await?;
        self.balances.ensure_month(user_id, month, seed).await?;
        Ok(month)
    }

    /// Resolves `amount` from the endpoint's configured cost when not given,
    /// then atomically checks and deducts. Returns the new balance.
    pub async fn check_and_deduct(
        &self,
        user_id: UserId,
        endpoint_id: EndpointId,
        amount: Option<Decimal>,
    ) -> Result<Decimal, LedgerError> {
        let amount = match amount {
            Some(amount) => amount,
            None => self.catalog.endpoint_cost(endpoint_id).await?,
        };
        let month = self.ensure_month_initialized(user_id).await?;

        match self
            .balances
            .deduct(user_id, month, endpoint_id, amount)
            .await?
        {
            DeductOutcome::Deducted { new_balance } => {
                tracing::info!(
                    user_id = %user_id,
                    endpoint_id = %endpoint_id,
                    amount = %amount,
                    new_balance = %new_balance,
                    "Balance deducted"
                );
                Ok(new_balance)
            }
            DeductOutcome::InsufficientBalance { current } => {
                Err(LedgerError::InsufficientBalance {
                    current,
                    required: amount,
                })
            }
        }
    }

    pub async fn current_balance(&self, user_id: UserId) -> Result<BalanceSnapshot, LedgerError> {
        let month = self.ensure_month_initialized(user_id).await?;
        let current_balance = self
            .balances
            .current_balance(user_id, month)
            .await?
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("balance record for user {}", user_id))
            })?;

        let tier = self.account_tier(user_id).await?;
        let monthly_allowance = self.monthly_allowance(user_id).await?;

        Ok(BalanceSnapshot {
            user_id,
            month,
            current_balance,
            tier,
            monthly_allowance,
        })
    }

    /// Administrative override; bypasses cost calculation.
    pub async fn admin_set_balance(
        &self,
        user_id: UserId,
        amount: Decimal,
    ) -> Result<(), LedgerError> {
        let month = BalanceMonth::current();
        self.balances.set_balance(user_id, month, amount).await?;
        tracing::info!(user_id = %user_id, amount = %amount, "Balance set by administrator");
        Ok(())
    }

    /// Credits the endpoint's configured cost back to the user, for the
    /// refund-on-failure policy.
    pub async fn refund_path_cost(
        &self,
        user_id: UserId,
        path: &str,
    ) -> Result<Decimal, LedgerError> {
        let endpoint_id = self
            .catalog
            .endpoint_by_path(path)
            .await?
            .ok_or_else(|| LedgerError::UnknownEndpoint(path.to_string()))?;
        let amount = self.catalog.endpoint_cost(endpoint_id).await?;
        let month = self.ensure_month_initialized(user_id).await?;

        let new_balance = self
            .balances
            .credit(user_id, month, endpoint_id, amount)
            .await?;
        tracing::info!(
            user_id = %user_id,
            path = %path,
            amount = %amount,
            new_balance = %new_balance,
            "Balance refunded after job failure"
        );
        Ok(new_balance)
    }

    async fn monthly_allowance(&self, user_id: UserId) -> Result<Decimal, RepositoryError> {
        if let Some(custom) = self.catalog.monthly_allowance(user_id).await? {
            return Ok(custom);
        }
        match self.catalog.account_tier(user_id).await {
            Ok(tier) => Ok(self.config.tier_allowances.for_tier(tier)),
            Err(RepositoryError::NotFound(_)) => Ok(self.config.fallback_allowance),
            Err(e) => Err(e),
        }
    }

    async fn account_tier(&self, user_id: UserId) -> Result<AccountTier, RepositoryError> {
        match self.catalog.account_tier(user_id).await {
            Ok(tier) => Ok(tier),
            Err(RepositoryError::NotFound(_)) => Ok(AccountTier::Standard),
            Err(e) => Err(e),
        }
    }
}
