mod memory_repository;
mod pg_balance_repository;
mod pg_endpoint_catalog;
mod pg_job_repository;
mod pg_pool;
mod pg_usage_repository;

pub use memory_repository::{
    InMemoryBalanceRepository, InMemoryJobRepository, InMemoryUsageRepository,
    StaticEndpointCatalog,
};
pub use pg_balance_repository::PgBalanceRepository;
pub use pg_endpoint_catalog::PgEndpointCatalog;
pub use pg_job_repository::PgJobRepository;
pub use pg_pool::create_pool;
pub use pg_usage_repository::PgUsageRepository;
