use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::application::ports::{EndpointCatalog, RepositoryError};
use crate::domain::{AccountTier, EndpointId, UserId};

pub struct PgEndpointCatalog {
    pool: PgPool,
}

impl PgEndpointCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EndpointCatalog for PgEndpointCatalog {
    #[instrument(skip(self))]
    async fn endpoint_by_path(&self, path: &str) -> Result<Option<EndpointId>, RepositoryError> {
        let row = sqlx::query("SELECT id FROM endpoints WHERE path = $1")
            .bind(path)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        row.map(|r| {
            r.try_get("id")
                .map(EndpointId::from_uuid)
                .map_err(|e| RepositoryError::QueryFailed(e.to_string()))
        })
        .transpose()
    }

    #[instrument(skip(self), fields(endpoint_id = %id))]
    async fn endpoint_cost(&self, id: EndpointId) -> Result<Decimal, RepositoryError> {
        let row = sqlx::query("SELECT cost FROM endpoints WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        match row {
            Some(row) => row
                .try_get("cost")
                .map_err(|e| RepositoryError::QueryFailed(e.to_string())),
            None => Err(RepositoryError::NotFound(format!("endpoint {}", id))),
        }
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn monthly_allowance(
        &self,
        user_id: UserId,
    ) -> Result<Option<Decimal>, RepositoryError> {
        let row = sqlx::query("SELECT custom_monthly_allowance FROM accounts WHERE id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        match row {
            Some(row) => row
                .try_get::<Option<Decimal>, _>("custom_monthly_allowance")
                .map_err(|e| RepositoryError::QueryFailed(e.to_string())),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn account_tier(&self, user_id: UserId) -> Result<AccountTier, RepositoryError> {
        let row = sqlx::query("SELECT tier FROM accounts WHERE id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        match row {
            Some(row) => {
                let tier: String = row
                    .try_get("tier")
                    .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;
                tier.parse::<AccountTier>()
                    .map_err(RepositoryError::QueryFailed)
            }
            None => Err(RepositoryError::NotFound(format!("account {}", user_id))),
        }
    }
}
