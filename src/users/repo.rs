use async_trait::async_trait;
use uuid::Uuid;

use super::repo_types::{Credentials, NewUser, User, UserChanges};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate {0}")]
    Duplicate(&'static str),
    #[error("balance out of range")]
    BalanceOutOfRange,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Persistence for user records. Lookups that miss return `Ok(None)`.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    async fn find_all(&self) -> Result<Vec<User>, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_credentials_by_email(&self, email: &str)
        -> Result<Option<Credentials>, StoreError>;
    async fn find_credentials_by_id(&self, id: Uuid) -> Result<Option<Credentials>, StoreError>;
    async fn update_fields(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError>;
    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError>;
    /// Returns how many rows were removed.
    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<u64, StoreError>;
    async fn adjust_balance(&self, id: Uuid, delta: i64) -> Result<Option<User>, StoreError>;
}
