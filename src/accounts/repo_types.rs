use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;

/// Account kind, fixed at creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Client,
    Freelancer,
    Admin,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Client => "client",
            AccountKind::Freelancer => "freelancer",
            AccountKind::Admin => "admin",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(AccountKind::Client),
            "freelancer" => Ok(AccountKind::Freelancer),
            "admin" => Ok(AccountKind::Admin),
            other => Err(AppError::Validation(format!(
                "{} is not a valid account type",
                other
            ))),
        }
    }
}

/// Identity record. The credential hash and reset token never serialize.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub credential_hash: String,
    pub kind: AccountKind,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expires_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Validated input for a new account; the hash is already derived.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub credential_hash: String,
    pub kind: AccountKind,
}

impl Account {
    pub fn from_new(new: NewAccount) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            credential_hash: new.credential_hash,
            kind: new.kind,
            is_active: true,
            last_login_at: None,
            reset_token: None,
            reset_token_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Row shape of the `accounts` table.
#[derive(Debug, FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub account_type: String,
    pub is_active: bool,
    pub last_login_at: Option<OffsetDateTime>,
    pub reset_token: Option<String>,
    pub reset_token_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<AccountRow> for Account {
    type Error = AppError;

    fn try_from(r: AccountRow) -> Result<Self, Self::Error> {
        let kind = r
            .account_type
            .parse::<AccountKind>()
            .map_err(|_| AppError::Persistence(format!("stored account_type {:?}", r.account_type)))?;
        Ok(Self {
            id: r.id,
            name: r.name,
            email: r.email,
            credential_hash: r.password_hash,
            kind,
            is_active: r.is_active,
            last_login_at: r.last_login_at,
            reset_token: r.reset_token,
            reset_token_expires_at: r.reset_token_expires_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}
