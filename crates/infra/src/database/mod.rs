//! Database implementations

pub mod identity_repository;
pub mod manager;
pub mod pool;
pub mod request_repository;
pub mod sla_repository;
mod sql;
pub mod team_repository;

pub use identity_repository::{DirectoryUser, SqliteIdentityProvider};
pub use manager::DbManager;
pub use pool::{create_pool, PoolConfig, SqliteConnection, SqlitePool};
pub use request_repository::SqliteRequestStore;
pub use sla_repository::{require_policy, SqliteSlaPolicyRepository};
pub use team_repository::SqliteTeamRepository;
