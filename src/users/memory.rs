use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    repo::{StoreError, UserStore},
    repo_types::{Credentials, NewUser, User, UserChanges},
};

struct Row {
    user: User,
    password_hash: String,
}

/// In-process [`UserStore`], used by tests and when no database is configured.
#[derive(Default)]
pub struct MemoryUserStore {
    rows: RwLock<HashMap<Uuid, Row>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(rows: &HashMap<Uuid, Row>, email: &str, except: Option<Uuid>) -> bool {
    rows.values()
        .any(|r| r.user.email == email && Some(r.user.id) != except)
}

fn sorted(mut users: Vec<User>) -> Vec<User> {
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    users
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut rows = self.rows.write().await;
        if email_taken(&rows, &user.email, None) {
            return Err(StoreError::Duplicate("email"));
        }
        let now = OffsetDateTime::now_utc();
        let stored = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            balance: 0,
            role: "user".into(),
            created_at: now,
            updated_at: now,
        };
        rows.insert(
            stored.id,
            Row {
                user: stored.clone(),
                password_hash: user.password_hash,
            },
        );
        Ok(stored)
    }

    async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        let rows = self.rows.read().await;
        Ok(sorted(rows.values().map(|r| r.user.clone()).collect()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.rows.read().await.get(&id).map(|r| r.user.clone()))
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let rows = self.rows.read().await;
        Ok(sorted(
            rows.values()
                .filter(|r| ids.contains(&r.user.id))
                .map(|r| r.user.clone())
                .collect(),
        ))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|r| r.user.email == email)
            .map(|r| r.user.clone()))
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Credentials>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|r| r.user.email == email)
            .map(|r| Credentials {
                user_id: r.user.id,
                password_hash: r.password_hash.clone(),
            }))
    }

    async fn find_credentials_by_id(&self, id: Uuid) -> Result<Option<Credentials>, StoreError> {
        Ok(self.rows.read().await.get(&id).map(|r| Credentials {
            user_id: r.user.id,
            password_hash: r.password_hash.clone(),
        }))
    }

    async fn update_fields(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError> {
        let mut rows = self.rows.write().await;
        if let Some(email) = &changes.email {
            if email_taken(&rows, email, Some(id)) {
                return Err(StoreError::Duplicate("email"));
            }
        }
        let Some(row) = rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            row.user.name = name;
        }
        if let Some(email) = changes.email {
            row.user.email = email;
        }
        row.user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(row.user.clone()))
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let mut rows = self.rows.write().await;
        Ok(rows.get_mut(&id).map(|row| {
            row.password_hash = password_hash.to_string();
            row.user.updated_at = OffsetDateTime::now_utc();
            row.user.clone()
        }))
    }

    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        let mut rows = self.rows.write().await;
        let mut removed = 0;
        for id in ids {
            if rows.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn adjust_balance(&self, id: Uuid, delta: i64) -> Result<Option<User>, StoreError> {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(&id) else {
            return Ok(None);
        };
        row.user.balance = row
            .user
            .balance
            .checked_add(delta)
            .ok_or(StoreError::BalanceOutOfRange)?;
        row.user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(row.user.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "test".into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let store = MemoryUserStore::new();
        store.create(new_user("a@x.com")).await.unwrap();
        let err = store.create(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("email")));
    }

    #[tokio::test]
    async fn update_fields_rejects_email_owned_by_someone_else() {
        let store = MemoryUserStore::new();
        store.create(new_user("a@x.com")).await.unwrap();
        let b = store.create(new_user("b@x.com")).await.unwrap();
        let changes = UserChanges {
            name: None,
            email: Some("a@x.com".into()),
        };
        let err = store.update_fields(b.id, changes).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        // keeping your own email is fine
        let same = UserChanges {
            name: Some("bee".into()),
            email: Some("b@x.com".into()),
        };
        let updated = store.update_fields(b.id, same).await.unwrap().unwrap();
        assert_eq!(updated.name, "bee");
    }

    #[tokio::test]
    async fn delete_counts_only_existing_rows() {
        let store = MemoryUserStore::new();
        let a = store.create(new_user("a@x.com")).await.unwrap();
        let n = store.delete_by_ids(&[a.id, Uuid::new_v4()]).await.unwrap();
        assert_eq!(n, 1);
        assert!(store.find_by_id(a.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn credentials_follow_password_updates() {
        let store = MemoryUserStore::new();
        let a = store.create(new_user("a@x.com")).await.unwrap();
        store.update_password_hash(a.id, "new-hash").await.unwrap();
        let creds = store.find_credentials_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(creds.user_id, a.id);
        assert_eq!(creds.password_hash, "new-hash");
    }

    #[tokio::test]
    async fn adjust_balance_on_missing_user_is_none() {
        let store = MemoryUserStore::new();
        assert!(store.adjust_balance(Uuid::new_v4(), 5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn adjust_balance_refuses_to_overflow() {
        let store = MemoryUserStore::new();
        let a = store.create(new_user("a@x.com")).await.unwrap();
        store.adjust_balance(a.id, i64::MAX).await.unwrap();

        let err = store.adjust_balance(a.id, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::BalanceOutOfRange));
        let kept = store.find_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(kept.balance, i64::MAX);

        let lowered = store.adjust_balance(a.id, -5).await.unwrap().unwrap();
        assert_eq!(lowered.balance, i64::MAX - 5);
    }
}
