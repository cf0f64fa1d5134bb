use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    accounts::repo_types::{Account, AccountRow, NewAccount},
    error::{AppError, AppResult},
};

/// Account persistence. Implementations enforce email uniqueness themselves.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn insert(&self, new: NewAccount) -> AppResult<Account>;
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>>;
    /// Moves `last_login_at` to now, never backwards.
    async fn touch_last_login(&self, id: Uuid) -> AppResult<Account>;
    async fn set_credential_hash(&self, id: Uuid, hash: &str) -> AppResult<Account>;
}

const ACCOUNT_COLUMNS: &str = "id, name, email, password_hash, account_type, is_active, \
     last_login_at, reset_token, reset_token_expires_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn insert(&self, new: NewAccount) -> AppResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            INSERT INTO accounts (id, name, email, password_hash, account_type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.credential_hash)
        .bind(new.kind.as_str())
        .fetch_one(&self.db)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict("email already registered".into()),
            other => other,
        })?;
        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(Account::try_from).transpose()
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        row.map(Account::try_from).transpose()
    }

    async fn touch_last_login(&self, id: Uuid) -> AppResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE accounts
               SET last_login_at = GREATEST(COALESCE(last_login_at, now()), now()),
                   updated_at = now()
             WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {}", id)))?;
        row.try_into()
    }

    async fn set_credential_hash(&self, id: Uuid, hash: &str) -> AppResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            UPDATE accounts
               SET password_hash = $2,
                   updated_at = now()
             WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(hash)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {}", id)))?;
        row.try_into()
    }
}
