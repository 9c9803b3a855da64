use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    repo::{StoreError, UserStore},
    repo_types::{Credentials, NewUser, User, UserChanges},
};

/// [`UserStore`] backed by the `users` table.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// SQLSTATE `numeric_value_out_of_range`.
const NUMERIC_OUT_OF_RANGE: &str = "22003";

fn map_write_err(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate("email"),
        sqlx::Error::Database(db) if db.code().as_deref() == Some(NUMERIC_OUT_OF_RANGE) => {
            StoreError::BalanceOutOfRange
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, balance, role, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_err)
    }

    async fn find_all(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, balance, role, created_at, updated_at
            FROM users
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, balance, role, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, balance, role, created_at, updated_at
            FROM users
            WHERE id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, balance, role, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Credentials>, StoreError> {
        let creds = sqlx::query_as::<_, Credentials>(
            r#"SELECT id AS user_id, password_hash FROM users WHERE email = $1"#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(creds)
    }

    async fn find_credentials_by_id(&self, id: Uuid) -> Result<Option<Credentials>, StoreError> {
        let creds = sqlx::query_as::<_, Credentials>(
            r#"SELECT id AS user_id, password_hash FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(creds)
    }

    async fn update_fields(
        &self,
        id: Uuid,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, name, email, balance, role, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .fetch_optional(&self.db)
        .await
        .map_err(map_write_err)
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET password_hash = $2,
                   updated_at = now()
             WHERE id = $1
            RETURNING id, name, email, balance, role, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn delete_by_ids(&self, ids: &[Uuid]) -> Result<u64, StoreError> {
        let result = sqlx::query(r#"DELETE FROM users WHERE id = ANY($1)"#)
            .bind(ids)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    async fn adjust_balance(&self, id: Uuid, delta: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET balance = balance + $2,
                   updated_at = now()
             WHERE id = $1
            RETURNING id, name, email, balance, role, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(&self.db)
        .await
        .map_err(map_write_err)?;
        Ok(user)
    }
}
