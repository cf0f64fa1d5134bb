use tracing::debug;
use uuid::Uuid;

use super::{
    aggregate::{FreelancerProfile, ProfileFields, ProfilePatch},
    repo::ProfileMutation,
};
use crate::{
    accounts::{self, repo_types::AccountKind},
    db::bounded,
    error::{AppError, AppResult},
    state::AppState,
};

/// Creates the one profile a freelancer account may have.
pub async fn attach(
    state: &AppState,
    account_id: Uuid,
    initial: ProfileFields,
) -> AppResult<FreelancerProfile> {
    let profile = FreelancerProfile::new(account_id, initial)?;

    let account = accounts::services::find_by_id(state, account_id)
        .await?
        .ok_or_else(|| AppError::Validation(format!("account {} does not exist", account_id)))?;
    if account.kind != AccountKind::Freelancer {
        return Err(AppError::Validation(format!(
            "account {} is a {} account, not a freelancer",
            account_id, account.kind
        )));
    }

    let profile = bounded(
        state.config.store_timeout(),
        "profile insert",
        state.profiles.insert(profile),
    )
    .await?;
    debug!(%account_id, "freelancer profile attached");
    Ok(profile)
}

pub async fn get(state: &AppState, account_id: Uuid) -> AppResult<FreelancerProfile> {
    bounded(
        state.config.store_timeout(),
        "profile lookup",
        state.profiles.get(account_id),
    )
    .await?
    .ok_or_else(|| AppError::NotFound(format!("freelancer profile {}", account_id)))
}

async fn mutate(
    state: &AppState,
    account_id: Uuid,
    f: ProfileMutation,
) -> AppResult<FreelancerProfile> {
    state
        .profiles
        .mutate(account_id, state.config.store_timeout(), f)
        .await
}

/// Appends a review and recomputes the rating in one atomic step.
pub async fn add_review(
    state: &AppState,
    account_id: Uuid,
    client_id: Uuid,
    project_id: Uuid,
    rating: u8,
    comment: String,
) -> AppResult<FreelancerProfile> {
    let profile = mutate(
        state,
        account_id,
        Box::new(move |p: &mut FreelancerProfile| {
            p.add_review(client_id, project_id, rating, comment)
        }),
    )
    .await?;
    debug!(
        %account_id,
        average = profile.rating.average,
        count = profile.rating.count,
        "review added"
    );
    Ok(profile)
}

pub async fn record_project_transition(
    state: &AppState,
    account_id: Uuid,
    project_value: f64,
    is_completed: bool,
) -> AppResult<FreelancerProfile> {
    let profile = mutate(
        state,
        account_id,
        Box::new(move |p: &mut FreelancerProfile| {
            p.record_project_transition(project_value, is_completed)
        }),
    )
    .await?;
    debug!(
        %account_id,
        is_completed,
        completed = profile.completed_projects,
        ongoing = profile.ongoing_projects,
        "project transition recorded"
    );
    Ok(profile)
}

pub async fn update_profile(
    state: &AppState,
    account_id: Uuid,
    patch: ProfilePatch,
) -> AppResult<FreelancerProfile> {
    mutate(
        state,
        account_id,
        Box::new(move |p: &mut FreelancerProfile| p.apply_patch(patch)),
    )
    .await
}

pub async fn completion_score(state: &AppState, account_id: Uuid) -> AppResult<u8> {
    Ok(get(state, account_id).await?.completion_score())
}
