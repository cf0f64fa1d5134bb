use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{AuthResponse, ChangePasswordRequest, LoginRequest, PublicAccount, RefreshRequest, RegisterRequest},
    jwt::AuthUser,
    repo_types::Account,
    services,
};
use crate::{error::AppError, state::AppState};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/password", post(change_password))
}

fn token_pair(state: &AppState, account: &Account) -> Result<AuthResponse, AppError> {
    Ok(AuthResponse {
        access_token: state.keys.sign_access(account)?,
        refresh_token: state.keys.sign_refresh(account)?,
        user: PublicAccount::from(account),
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let account = services::create_account(
        &state,
        &payload.name,
        &payload.email,
        &payload.password,
        &payload.account_type,
    )
    .await
    .map_err(|e| {
        warn!(error = %e, "registration rejected");
        e
    })?;

    info!(account_id = %account.id, kind = %account.kind, "account registered");
    Ok((StatusCode::CREATED, Json(token_pair(&state, &account)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let account = services::authenticate(&state, &payload.email, &payload.password)
        .await
        .map_err(|e| {
            warn!(error = %e, "login rejected");
            e
        })?;

    info!(account_id = %account.id, "account logged in");
    Ok(Json(token_pair(&state, &account)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let claims = state.keys.verify_refresh(&payload.refresh_token)?;

    let account = services::find_by_id(&state, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account not found".into()))?;
    if !account.is_active {
        return Err(AppError::Forbidden("account is disabled".into()));
    }

    Ok(Json(token_pair(&state, &account)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Account>, AppError> {
    let account = services::find_by_id(&state, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account not found".into()))?;
    Ok(Json(account))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    let account = services::find_by_id(&state, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account not found".into()))?;
    if !services::verify_credential(&state, &account, &payload.current_password).await? {
        warn!(account_id = %account.id, "password change with wrong current password");
        return Err(AppError::Unauthorized("invalid credentials".into()));
    }
    services::change_credential(&state, &account, &payload.new_password).await?;
    info!(account_id = %account.id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::repo_types::AccountKind;

    #[tokio::test]
    async fn register_then_login_issues_verifiable_tokens() {
        let state = AppState::fake();
        let (status, Json(reg)) = register(
            State(state.clone()),
            Json(RegisterRequest {
                name: "Margaret".into(),
                email: "Margaret@Example.com".into(),
                password: "apollo-11".into(),
                account_type: "freelancer".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(reg.user.email, "margaret@example.com");

        let claims = state.keys.verify(&reg.access_token).unwrap();
        assert_eq!(claims.sub, reg.user.id);
        assert_eq!(claims.kind, AccountKind::Freelancer);

        let Json(logged_in) = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "margaret@example.com".into(),
                password: "apollo-11".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(logged_in.user.id, reg.user.id);

        let Json(refreshed) = refresh(
            State(state.clone()),
            Json(RefreshRequest {
                refresh_token: logged_in.refresh_token,
            }),
        )
        .await
        .unwrap();
        assert_eq!(refreshed.user.id, reg.user.id);
    }

    #[tokio::test]
    async fn refresh_rejects_access_token() {
        let state = AppState::fake();
        let (_, Json(reg)) = register(
            State(state.clone()),
            Json(RegisterRequest {
                name: "Katherine".into(),
                email: "k@example.com".into(),
                password: "orbit-calc".into(),
                account_type: "client".into(),
            }),
        )
        .await
        .unwrap();
        let err = refresh(
            State(state),
            Json(RefreshRequest {
                refresh_token: reg.access_token,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn public_account_serialization() {
        let response = PublicAccount {
            id: uuid::Uuid::new_v4(),
            name: "Test".into(),
            email: "test@example.com".to_string(),
            account_type: AccountKind::Admin,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(json.contains("\"account_type\":\"admin\""));
    }
}
