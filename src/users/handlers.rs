use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::instrument;

use super::{
    dto::{
        BalanceRequest, DeleteResponse, IdsQuery, UpdateUserRequest, UserData, UserSummary,
        UsersData,
    },
    repo_types::User,
    services,
};
use crate::{
    app::not_found,
    extract::{JsonBody, PathParam, QueryParams},
    response::{reply, ApiResult},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).fallback(not_found))
        .route("/users/", get(list_users).fallback(not_found))
        .route(
            "/users/id",
            get(get_users_by_ids)
                .delete(delete_users_by_ids)
                .fallback(not_found),
        )
        .route(
            "/users/id/:id",
            get(get_user)
                .put(update_user)
                .delete(delete_user)
                .fallback(not_found),
        )
        .route("/users/id/:id/credit", post(credit).fallback(not_found))
        .route("/users/id/:id/debit", post(debit).fallback(not_found))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<UsersData> {
    let users = services::list_users(&state).await?;
    reply(StatusCode::OK, UsersData { users }, "The operation succeeded.")
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    PathParam(id): PathParam<String>,
) -> ApiResult<UserData<User>> {
    let user = services::get_user(&state, &id).await?;
    reply(StatusCode::OK, UserData { user }, "The operation succeeded.")
}

#[instrument(skip(state))]
pub async fn get_users_by_ids(
    State(state): State<AppState>,
    QueryParams(q): QueryParams<IdsQuery>,
) -> ApiResult<UsersData> {
    let users = services::get_users_by_ids(&state, q.ids.as_deref()).await?;
    reply(StatusCode::OK, UsersData { users }, "The operation succeeded.")
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    PathParam(id): PathParam<String>,
    JsonBody(body): JsonBody<UpdateUserRequest>,
) -> ApiResult<UserData<UserSummary>> {
    let user = services::update_user(&state, &id, body).await?;
    reply(
        StatusCode::OK,
        UserData {
            user: UserSummary::from(user),
        },
        "User updated",
    )
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    PathParam(id): PathParam<String>,
) -> ApiResult<DeleteResponse> {
    let delete_count = services::delete_user(&state, &id).await?;
    reply(
        StatusCode::OK,
        DeleteResponse { delete_count },
        "The operation succeeded.",
    )
}

#[instrument(skip(state))]
pub async fn delete_users_by_ids(
    State(state): State<AppState>,
    QueryParams(q): QueryParams<IdsQuery>,
) -> ApiResult<DeleteResponse> {
    let delete_count = services::delete_users_by_ids(&state, q.ids.as_deref()).await?;
    reply(
        StatusCode::OK,
        DeleteResponse { delete_count },
        "The operation succeeded.",
    )
}

#[instrument(skip(state, body))]
pub async fn credit(
    State(state): State<AppState>,
    PathParam(id): PathParam<String>,
    JsonBody(body): JsonBody<BalanceRequest>,
) -> ApiResult<UserData<User>> {
    let user = services::credit_balance(&state, &id, body.amount).await?;
    reply(StatusCode::OK, UserData { user }, "Balance updated")
}

#[instrument(skip(state, body))]
pub async fn debit(
    State(state): State<AppState>,
    PathParam(id): PathParam<String>,
    JsonBody(body): JsonBody<BalanceRequest>,
) -> ApiResult<UserData<User>> {
    let user = services::debit_balance(&state, &id, body.amount).await?;
    reply(StatusCode::OK, UserData { user }, "Balance updated")
}
