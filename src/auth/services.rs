use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        claims::TokenKind,
        dto::RegisterRequest,
        password::{hash_password, is_acceptable_password, verify_password},
    },
    error::ApiError,
    state::AppState,
    users::{
        repo_types::{NewUser, User},
        services::normalize_email,
    },
};

const INVALID_CREDENTIALS: &str = "Invalid Credentials";
const AUTH_FAILED: &str = "Authorization failed.";

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Token part of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Validates the candidate, stores the user and returns an access token.
#[instrument(skip(st, candidate))]
pub async fn register(st: &AppState, candidate: RegisterRequest) -> Result<String, ApiError> {
    let (Some(name), Some(email), Some(password)) = (
        non_blank(candidate.name),
        non_blank(candidate.email),
        candidate.password.filter(|p| !p.is_empty()),
    ) else {
        warn!("registration with missing fields");
        return Err(ApiError::bad_request(
            "Please enter name, email, and password!",
        ));
    };

    if !is_acceptable_password(&password) {
        warn!("password too short");
        return Err(ApiError::bad_request(
            "Password should be at least 6 characters",
        ));
    }

    let user = st
        .store
        .create(NewUser {
            name: name.trim().to_string(),
            email: normalize_email(&email),
            password_hash: hash_password(&password)?,
        })
        .await?;

    let token = st.keys.sign_access(user.id)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(token)
}

/// Unknown email and wrong password produce the same error.
#[instrument(skip(st, password))]
pub async fn login(st: &AppState, email: &str, password: &str) -> Result<String, ApiError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }
    let email = normalize_email(email);

    let Some(creds) = st.store.find_credentials_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    let ok = verify_password(password, &creds.password_hash)?;
    if !ok {
        warn!(email = %email, user_id = %creds.user_id, "login invalid password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let token = st.keys.sign_access(creds.user_id)?;
    info!(user_id = %creds.user_id, "user logged in");
    Ok(token)
}

/// Resolves the user behind an `Authorization` header value.
#[instrument(skip_all)]
pub async fn resolve_current_user(
    st: &AppState,
    authorization: Option<&str>,
) -> Result<User, ApiError> {
    let token = authorization
        .and_then(bearer_token)
        .ok_or_else(|| ApiError::unauthorized(AUTH_FAILED))?;

    let claims = st.keys.verify(token, TokenKind::Access)?;

    match st.store.find_by_id(claims.sub).await? {
        Some(user) => Ok(user),
        None => {
            warn!(user_id = %claims.sub, "token for missing user");
            Err(ApiError::unauthorized(AUTH_FAILED))
        }
    }
}

/// Issues a password-reset token. Unknown emails are reported to the caller.
#[instrument(skip(st))]
pub async fn request_password_reset(st: &AppState, email: &str) -> Result<String, ApiError> {
    if email.trim().is_empty() {
        return Err(ApiError::bad_request("Email cannot be empty!"));
    }
    let email = normalize_email(email);

    let Some(user) = st.store.find_by_email(&email).await? else {
        warn!(email = %email, "reset requested for unknown email");
        return Err(ApiError::bad_request("Invalid Email"));
    };

    let token = st.keys.sign_password_reset(user.id)?;
    info!(user_id = %user.id, "password reset token issued");
    Ok(token)
}

/// Replaces the password of the user a reset token was issued for.
#[instrument(skip_all)]
pub async fn reset_password(st: &AppState, token: &str, password: &str) -> Result<User, ApiError> {
    if token.trim().is_empty() {
        return Err(ApiError::bad_request("Password reset token is required!"));
    }
    if !is_acceptable_password(password) {
        return Err(ApiError::bad_request(
            "Password must be at least 6 characters",
        ));
    }

    let claims = st.keys.verify(token.trim(), TokenKind::PasswordReset)?;
    let password_hash = hash_password(password)?;

    match st
        .store
        .update_password_hash(claims.sub, &password_hash)
        .await?
    {
        Some(user) => {
            info!(user_id = %user.id, "password reset");
            Ok(user)
        }
        None => {
            warn!(user_id = %claims.sub, "reset token for missing user");
            Err(ApiError::unauthorized(AUTH_FAILED))
        }
    }
}

/// Changes the password of an authenticated user after checking the old one.
#[instrument(skip(st, old_password, new_password))]
pub async fn change_password(
    st: &AppState,
    user_id: Uuid,
    old_password: &str,
    new_password: &str,
) -> Result<User, ApiError> {
    if !is_acceptable_password(new_password) {
        return Err(ApiError::bad_request(
            "Password must be at least 6 characters",
        ));
    }

    let creds = st
        .store
        .find_credentials_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User with id {user_id} not found!")))?;

    let ok = !old_password.is_empty()
        && verify_password(old_password, &creds.password_hash)?;
    if !ok {
        warn!(user_id = %user_id, "password change with wrong old password");
        return Err(ApiError::unauthorized("Password did not match!"));
    }

    let password_hash = hash_password(new_password)?;
    let user = st
        .store
        .update_password_hash(user_id, &password_hash)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User with id {user_id} not found!")))?;
    info!(user_id = %user_id, "password changed");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    fn candidate(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: Some(name.into()),
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    async fn registered(st: &AppState) -> (String, User) {
        let token = register(st, candidate("test", "t@x.com", "123456"))
            .await
            .expect("register");
        let user = st.store.find_by_email("t@x.com").await.unwrap().unwrap();
        (token, user)
    }

    #[test]
    fn bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[tokio::test]
    async fn register_token_resolves_to_new_user() {
        let st = AppState::fake();
        let (token, user) = registered(&st).await;
        let header = format!("Bearer {token}");
        let current = resolve_current_user(&st, Some(&header)).await.unwrap();
        assert_eq!(current.id, user.id);
        assert_eq!(current.email, "t@x.com");
        assert_eq!(current.balance, 0);
    }

    #[tokio::test]
    async fn register_rejects_short_password_without_persisting() {
        let st = AppState::fake();
        let err = register(&st, candidate("test", "t@x.com", "12345"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(st.store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn register_rejects_missing_fields_and_duplicates() {
        let st = AppState::fake();
        let err = register(&st, RegisterRequest::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = register(&st, candidate("  ", "t@x.com", "123456"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        registered(&st).await;
        let err = register(&st, candidate("other", "T@X.com ", "123456"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(st.store.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let st = AppState::fake();
        registered(&st).await;

        let wrong_password = login(&st, "t@x.com", "654321").await.unwrap_err();
        let unknown_email = login(&st, "nobody@x.com", "123456").await.unwrap_err();
        assert!(matches!(wrong_password, ApiError::Unauthorized(_)));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(wrong_password.name(), unknown_email.name());

        let empty = login(&st, "", "").await.unwrap_err();
        assert!(matches!(empty, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn login_returns_usable_token() {
        let st = AppState::fake();
        let (_, user) = registered(&st).await;
        let token = login(&st, "t@x.com", "123456").await.unwrap();
        let claims = st.keys.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, user.id);
    }

    #[tokio::test]
    async fn resolve_rejects_bad_headers_and_deleted_users() {
        let st = AppState::fake();
        let (token, user) = registered(&st).await;

        for header in [None, Some(""), Some("Bearer .a.a.a.a"), Some(token.as_str())] {
            let err = resolve_current_user(&st, header).await.unwrap_err();
            assert!(matches!(err, ApiError::Unauthorized(_)), "{header:?}");
        }

        st.store.delete_by_ids(&[user.id]).await.unwrap();
        let header = format!("Bearer {token}");
        let err = resolve_current_user(&st, Some(&header)).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn reset_token_is_not_a_session_token() {
        let st = AppState::fake();
        registered(&st).await;
        let reset = request_password_reset(&st, "t@x.com").await.unwrap();
        let header = format!("Bearer {reset}");
        let err = resolve_current_user(&st, Some(&header)).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn access_token_cannot_reset_password() {
        let st = AppState::fake();
        let (access, _) = registered(&st).await;
        let err = reset_password(&st, &access, "abcdef").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
        assert!(login(&st, "t@x.com", "123456").await.is_ok());
    }

    #[tokio::test]
    async fn request_reset_leaks_unknown_email_as_bad_request() {
        let st = AppState::fake();
        let err = request_password_reset(&st, "nobody@x.com").await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        let err = request_password_reset(&st, " ").await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn reset_then_login_with_new_password() {
        let st = AppState::fake();
        let (_, user) = registered(&st).await;
        let reset = request_password_reset(&st, "t@x.com").await.unwrap();

        let updated = reset_password(&st, &reset, "brand-new").await.unwrap();
        assert_eq!(updated.id, user.id);

        assert!(login(&st, "t@x.com", "brand-new").await.is_ok());
        let err = login(&st, "t@x.com", "123456").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn reset_validates_input_before_token() {
        let st = AppState::fake();
        let err = reset_password(&st, "", "brand-new").await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        let err = reset_password(&st, "garbage", "123").await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        let err = reset_password(&st, "garbage", "123456").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn reset_for_deleted_user_is_unauthorized() {
        let st = AppState::fake();
        let (_, user) = registered(&st).await;
        let reset = request_password_reset(&st, "t@x.com").await.unwrap();
        st.store.delete_by_ids(&[user.id]).await.unwrap();
        let err = reset_password(&st, &reset, "brand-new").await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn change_password_checks_old_password() {
        let st = AppState::fake();
        let (_, user) = registered(&st).await;

        let err = change_password(&st, user.id, "wrong-one", "abcdef")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let err = change_password(&st, user.id, "123456", "abc")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));

        change_password(&st, user.id, "123456", "abcdef").await.unwrap();
        assert!(login(&st, "t@x.com", "abcdef").await.is_ok());
        assert!(login(&st, "t@x.com", "123456").await.is_err());
    }
}
