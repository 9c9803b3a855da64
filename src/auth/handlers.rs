use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::instrument;

use crate::{
    app::not_found,
    auth::{
        dto::{
            ChangePasswordRequest, LoginRequest, PasswordResetTokenRequest, RegisterRequest,
            ResetPasswordRequest, TokenResponse,
        },
        extractors::CurrentUser,
        services,
    },
    extract::{JsonBody, PathParam},
    response::{reply, ApiResult},
    state::AppState,
    users::dto::{PublicUser, UserData, UserSummary},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth", get(current_user).fallback(not_found))
        .route("/auth/", get(current_user).fallback(not_found))
        .route("/auth/register", post(register).fallback(not_found))
        .route("/auth/login", post(login).fallback(not_found))
        .route(
            "/auth/password-reset-token",
            post(password_reset_token).fallback(not_found),
        )
        .route(
            "/auth/reset-password/:token",
            post(reset_password).fallback(not_found),
        )
        .route(
            "/auth/change-password",
            post(change_password).fallback(not_found),
        )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> ApiResult<TokenResponse> {
    let token = services::register(&state, payload).await?;
    reply(
        StatusCode::CREATED,
        TokenResponse { token },
        "user registered successfully!",
    )
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> ApiResult<TokenResponse> {
    let token = services::login(
        &state,
        payload.email.as_deref().unwrap_or_default(),
        payload.password.as_deref().unwrap_or_default(),
    )
    .await?;
    reply(
        StatusCode::OK,
        TokenResponse { token },
        "user logged in successfully!",
    )
}

#[instrument(skip_all)]
pub async fn current_user(CurrentUser(user): CurrentUser) -> ApiResult<UserData<PublicUser>> {
    let message = format!("You're logged in as {}!", user.email);
    reply(
        StatusCode::OK,
        UserData {
            user: PublicUser::from(user),
        },
        &message,
    )
}

#[instrument(skip(state, payload))]
pub async fn password_reset_token(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<PasswordResetTokenRequest>,
) -> ApiResult<TokenResponse> {
    let token =
        services::request_password_reset(&state, payload.email.as_deref().unwrap_or_default())
            .await?;
    reply(
        StatusCode::OK,
        TokenResponse { token },
        "token generated successfully!",
    )
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    PathParam(token): PathParam<String>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> ApiResult<UserData<UserSummary>> {
    let user = services::reset_password(
        &state,
        &token,
        payload.password.as_deref().unwrap_or_default(),
    )
    .await?;
    reply(
        StatusCode::OK,
        UserData {
            user: UserSummary::from(user),
        },
        "password reset successfully!",
    )
}

#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(payload): JsonBody<ChangePasswordRequest>,
) -> ApiResult<UserData<UserSummary>> {
    let user = services::change_password(
        &state,
        user.id,
        payload.old_password.as_deref().unwrap_or_default(),
        payload.new_password.as_deref().unwrap_or_default(),
    )
    .await?;
    reply(
        StatusCode::OK,
        UserData {
            user: UserSummary::from(user),
        },
        "password changed successfully!",
    )
}
