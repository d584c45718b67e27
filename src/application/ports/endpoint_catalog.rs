use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{AccountTier, EndpointId, UserId};

use super::RepositoryError;

/// Lookup of metered endpoints and per-account allowance configuration.
#[async_trait]
pub trait EndpointCatalog: Send + Sync {
    async fn endpoint_by_path(&self, path: &str) -> Result<Option<EndpointId>, RepositoryError>;

    async fn endpoint_cost(&self, id: EndpointId) -> Result<Decimal, RepositoryError>;

    /// The account's custom monthly allowance, if one is set. `None` means
    /// the tier default applies.
    async fn monthly_allowance(&self, user_id: UserId)
    -> Result<Option<Decimal>, RepositoryError>;

    async fn account_tier(&self, user_id: UserId) -> Result<AccountTier, RepositoryError>;
}
