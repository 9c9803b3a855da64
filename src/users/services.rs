use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::UpdateUserRequest,
    repo_types::{User, UserChanges},
};
use crate::{error::ApiError, state::AppState};

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Identifiers that do not parse are treated as absent records.
fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::not_found("Could not find the requested resource."))
}

fn parse_id_list(raw: Option<&str>, empty_msg: &str) -> Result<Vec<Uuid>, ApiError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(ApiError::bad_request(empty_msg));
    }
    raw.split(',').map(parse_id).collect()
}

pub async fn list_users(st: &AppState) -> Result<Vec<User>, ApiError> {
    Ok(st.store.find_all().await?)
}

#[instrument(skip(st))]
pub async fn get_user(st: &AppState, id: &str) -> Result<User, ApiError> {
    let id = parse_id(id)?;
    st.store
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found!"))
}

#[instrument(skip(st))]
pub async fn get_users_by_ids(st: &AppState, ids: Option<&str>) -> Result<Vec<User>, ApiError> {
    let ids = parse_id_list(ids, "Ids cannot be empty!")?;
    Ok(st.store.find_by_ids(&ids).await?)
}

/// Applies the allow-listed profile fields. Blank values are skipped.
#[instrument(skip(st, body))]
pub async fn update_user(
    st: &AppState,
    id: &str,
    body: UpdateUserRequest,
) -> Result<User, ApiError> {
    let not_updated = || ApiError::not_found("Could not update the user!");
    let id = parse_id(id).map_err(|_| not_updated())?;

    let changes = UserChanges {
        name: body
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        email: body
            .email
            .map(|e| normalize_email(&e))
            .filter(|e| !e.is_empty()),
    };

    let updated = if changes.is_empty() {
        st.store.find_by_id(id).await?
    } else {
        st.store.update_fields(id, changes).await?
    };
    let user = updated.ok_or_else(not_updated)?;
    info!(user_id = %user.id, "user updated");
    Ok(user)
}

#[instrument(skip(st))]
pub async fn delete_user(st: &AppState, id: &str) -> Result<u64, ApiError> {
    let id = parse_id(id)?;
    delete_existing(st, &[id]).await
}

#[instrument(skip(st))]
pub async fn delete_users_by_ids(st: &AppState, ids: Option<&str>) -> Result<u64, ApiError> {
    let ids = parse_id_list(ids, "User ids are required!")?;
    delete_existing(st, &ids).await
}

async fn delete_existing(st: &AppState, ids: &[Uuid]) -> Result<u64, ApiError> {
    let deleted = st.store.delete_by_ids(ids).await?;
    if deleted == 0 {
        warn!(?ids, "nothing deleted");
        return Err(ApiError::not_found("No user was deleted."));
    }
    info!(deleted, "users deleted");
    Ok(deleted)
}

fn positive_amount(amount: Option<i64>) -> Result<i64, ApiError> {
    amount
        .filter(|a| *a > 0)
        .ok_or_else(|| ApiError::bad_request("Amount must be a positive integer!"))
}

async fn adjust_balance(st: &AppState, id: &str, delta: i64) -> Result<User, ApiError> {
    let id = parse_id(id)?;
    let user = st
        .store
        .adjust_balance(id, delta)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User with id {id} not found!")))?;
    info!(user_id = %user.id, delta, balance = user.balance, "balance adjusted");
    Ok(user)
}

#[instrument(skip(st))]
pub async fn credit_balance(st: &AppState, id: &str, amount: Option<i64>) -> Result<User, ApiError> {
    let amount = positive_amount(amount)?;
    adjust_balance(st, id, amount).await
}

#[instrument(skip(st))]
pub async fn debit_balance(st: &AppState, id: &str, amount: Option<i64>) -> Result<User, ApiError> {
    let amount = positive_amount(amount)?;
    adjust_balance(st, id, -amount).await
}
