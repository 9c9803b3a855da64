use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::User;

/// Public part of the user returned by `GET /auth`.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub name: String,
    pub email: String,
}

impl From<User> for UserSummary {
    fn from(u: User) -> Self {
        Self {
            name: u.name,
            email: u.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserData<T> {
    pub user: T,
}

#[derive(Debug, Serialize)]
pub struct UsersData {
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub delete_count: u64,
}

/// Only `name` and `email` are read; anything else in the body is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BalanceRequest {
    pub amount: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct IdsQuery {
    pub ids: Option<String>,
}
