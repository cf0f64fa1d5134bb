use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    aggregate::{FreelancerProfile, ProfilePatch},
    dto::{AddReviewRequest, AttachRequest, CompletionResponse, ProjectTransitionRequest},
    services,
};
use crate::{
    accounts::{claims::Claims, jwt::AuthUser, repo_types::AccountKind},
    error::AppError,
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/freelancers/:account_id", get(get_profile))
        .route("/freelancers/:account_id/completion", get(get_completion))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/freelancers", post(attach_profile))
        .route("/freelancers/me", patch(update_my_profile))
        .route("/freelancers/:account_id/reviews", post(add_review))
        .route("/freelancers/:account_id/projects", post(record_project))
}

fn require_self_or_admin(claims: &Claims, account_id: Uuid) -> Result<(), AppError> {
    if claims.sub == account_id || claims.kind == AccountKind::Admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("not allowed to modify this profile".into()))
    }
}

#[instrument(skip(state, body))]
pub async fn attach_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(body): Json<AttachRequest>,
) -> Result<(StatusCode, Json<FreelancerProfile>), AppError> {
    let profile = services::attach(&state, claims.sub, body.0).await.map_err(|e| {
        warn!(error = %e, account_id = %claims.sub, "attach rejected");
        e
    })?;
    info!(account_id = %claims.sub, "freelancer onboarded");
    Ok((StatusCode::CREATED, Json(profile)))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<FreelancerProfile>, AppError> {
    Ok(Json(services::get(&state, account_id).await?))
}

#[instrument(skip(state))]
pub async fn get_completion(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<CompletionResponse>, AppError> {
    let profile_completion = services::completion_score(&state, account_id).await?;
    Ok(Json(CompletionResponse {
        account_id,
        profile_completion,
    }))
}

#[instrument(skip(state, body))]
pub async fn update_my_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(body): Json<ProfilePatch>,
) -> Result<Json<FreelancerProfile>, AppError> {
    Ok(Json(services::update_profile(&state, claims.sub, body).await?))
}

/// Clients review freelancers; the reviewer is always the caller.
#[instrument(skip(state, body))]
pub async fn add_review(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(account_id): Path<Uuid>,
    Json(body): Json<AddReviewRequest>,
) -> Result<Json<FreelancerProfile>, AppError> {
    if claims.kind != AccountKind::Client {
        return Err(AppError::Forbidden("only clients can leave reviews".into()));
    }
    let profile = services::add_review(
        &state,
        account_id,
        claims.sub,
        body.project_id,
        body.rating,
        body.comment,
    )
    .await?;
    info!(%account_id, client_id = %claims.sub, "review recorded");
    Ok(Json(profile))
}

#[instrument(skip(state, body))]
pub async fn record_project(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(account_id): Path<Uuid>,
    Json(body): Json<ProjectTransitionRequest>,
) -> Result<Json<FreelancerProfile>, AppError> {
    require_self_or_admin(&claims, account_id)?;
    let profile =
        services::record_project_transition(&state, account_id, body.project_value, body.is_completed)
            .await?;
    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::repo_types::{Account, NewAccount};

    fn claims_for(kind: AccountKind) -> Claims {
        let account = Account::from_new(NewAccount {
            name: "T".into(),
            email: "t@example.com".into(),
            credential_hash: "h".into(),
            kind,
        });
        let state = AppState::fake();
        let token = state.keys.sign_access(&account).unwrap();
        state.keys.verify(&token).unwrap()
    }

    #[test]
    fn only_owner_or_admin_may_record_projects() {
        let owner = claims_for(AccountKind::Freelancer);
        assert!(require_self_or_admin(&owner, owner.sub).is_ok());
        assert!(require_self_or_admin(&owner, Uuid::new_v4()).is_err());

        let admin = claims_for(AccountKind::Admin);
        assert!(require_self_or_admin(&admin, Uuid::new_v4()).is_ok());
    }

    #[tokio::test]
    async fn freelancers_cannot_review() {
        let state = AppState::fake();
        let err = add_review(
            State(state),
            AuthUser(claims_for(AccountKind::Freelancer)),
            Path(Uuid::new_v4()),
            Json(AddReviewRequest {
                project_id: Uuid::new_v4(),
                rating: 5,
                comment: "self-review".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn completion_response_serialization() {
        let json = serde_json::to_string(&CompletionResponse {
            account_id: Uuid::nil(),
            profile_completion: 33,
        })
        .unwrap();
        assert!(json.contains("\"profile_completion\":33"));
    }
}
