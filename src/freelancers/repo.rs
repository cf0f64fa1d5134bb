use std::time::Duration;

use async_trait::async_trait;
use sqlx::{types::Json, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{aggregate::FreelancerProfile, repo_types::FreelancerRow};
use crate::{
    db::bounded,
    error::{AppError, AppResult},
};

/// A change applied to one aggregate while its writer lock is held.
pub type ProfileMutation = Box<dyn FnOnce(&mut FreelancerProfile) -> AppResult<()> + Send>;

/// Freelancer profile persistence.
///
/// `mutate` serializes writers per `account_id` and commits only when the
/// mutation returns `Ok`, so readers never see a half-applied change.
///
/// `deadline` bounds the wait for the writer lock and the steps before commit.
/// Expiry there is a retryable `Persistence` error and nothing was written. The
/// commit itself runs to completion.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn insert(&self, profile: FreelancerProfile) -> AppResult<FreelancerProfile>;
    async fn get(&self, account_id: Uuid) -> AppResult<Option<FreelancerProfile>>;
    async fn mutate(
        &self,
        account_id: Uuid,
        deadline: Duration,
        f: ProfileMutation,
    ) -> AppResult<FreelancerProfile>;
}

const PROFILE_COLUMNS: &str = "account_id, fields, completed_projects, ongoing_projects, \
     total_earnings, rating_average, rating_count, reviews, created_at, updated_at";

#[derive(Clone)]
pub struct PgProfileStore {
    db: PgPool,
}

impl PgProfileStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn to_i32(v: u32, column: &str) -> AppResult<i32> {
    i32::try_from(v).map_err(|_| AppError::Validation(format!("{} overflow", column)))
}

async fn write_back(
    tx: &mut Transaction<'_, Postgres>,
    p: &FreelancerProfile,
) -> AppResult<FreelancerRow> {
    let row = sqlx::query_as::<_, FreelancerRow>(&format!(
        r#"
        UPDATE freelancer_profiles
           SET fields = $2,
               completed_projects = $3,
               ongoing_projects = $4,
               total_earnings = $5,
               rating_average = $6,
               rating_count = $7,
               reviews = $8,
               updated_at = $9
         WHERE account_id = $1
        RETURNING {PROFILE_COLUMNS}
        "#
    ))
    .bind(p.account_id)
    .bind(Json(&p.fields))
    .bind(to_i32(p.completed_projects, "completed_projects")?)
    .bind(to_i32(p.ongoing_projects, "ongoing_projects")?)
    .bind(p.total_earnings)
    .bind(p.rating.average)
    .bind(to_i32(p.rating.count, "rating_count")?)
    .bind(Json(&p.reviews))
    .bind(p.updated_at)
    .fetch_one(&mut **tx)
    .await?;
    Ok(row)
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn insert(&self, p: FreelancerProfile) -> AppResult<FreelancerProfile> {
        let row = sqlx::query_as::<_, FreelancerRow>(&format!(
            r#"
            INSERT INTO freelancer_profiles
                (account_id, fields, completed_projects, ongoing_projects, total_earnings,
                 rating_average, rating_count, reviews, created_at, updated_at)
            VALUES ($1, $2, 0, 0, 0, 0, 0, '[]'::jsonb, $3, $3)
            RETURNING {PROFILE_COLUMNS}
            "#
        ))
        .bind(p.account_id)
        .bind(Json(&p.fields))
        .bind(p.created_at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => {
                AppError::Conflict(format!("account {} already has a profile", p.account_id))
            }
            other => other,
        })?;
        row.try_into()
    }

    async fn get(&self, account_id: Uuid) -> AppResult<Option<FreelancerProfile>> {
        let row = sqlx::query_as::<_, FreelancerRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM freelancer_profiles WHERE account_id = $1"
        ))
        .bind(account_id)
        .fetch_optional(&self.db)
        .await?;
        row.map(FreelancerProfile::try_from).transpose()
    }

    async fn mutate(
        &self,
        account_id: Uuid,
        deadline: Duration,
        f: ProfileMutation,
    ) -> AppResult<FreelancerProfile> {
        let (mut tx, row) = bounded(deadline, "profile lock", async {
            let mut tx = self.db.begin().await?;
            let row = sqlx::query_as::<_, FreelancerRow>(&format!(
                "SELECT {PROFILE_COLUMNS} FROM freelancer_profiles WHERE account_id = $1 FOR UPDATE"
            ))
            .bind(account_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("freelancer profile {}", account_id)))?;
            Ok::<_, AppError>((tx, row))
        })
        .await?;

        let mut profile = FreelancerProfile::try_from(row)?;
        // An error here drops `tx`, which rolls back and releases the row lock.
        f(&mut profile)?;

        let row = bounded(deadline, "profile write", write_back(&mut tx, &profile)).await?;
        // No deadline on COMMIT: an abandoned commit can still land on the server.
        tx.commit().await?;
        row.try_into()
    }
}
