use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use super::repo_types::{Account, AccountKind, NewAccount};
use crate::{
    db::bounded,
    error::{AppError, AppResult},
    state::AppState,
};

pub const NAME_MAX_CHARS: usize = 50;
pub const SECRET_MIN_CHARS: usize = 6;
pub const SECRET_MAX_CHARS: usize = 128;

pub(crate) fn is_valid_email(email: &str) -> bool {
    // ASCII word characters only.
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"(?-u)^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }
    if name.chars().count() > NAME_MAX_CHARS {
        return Err(AppError::Validation(format!(
            "name cannot be more than {} characters",
            NAME_MAX_CHARS
        )));
    }
    Ok(name.to_string())
}

fn validate_secret(secret: &str) -> AppResult<()> {
    let len = secret.chars().count();
    if len < SECRET_MIN_CHARS {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            SECRET_MIN_CHARS
        )));
    }
    if len > SECRET_MAX_CHARS {
        return Err(AppError::Validation(format!(
            "password must be at most {} characters",
            SECRET_MAX_CHARS
        )));
    }
    Ok(())
}

/// Hashes on the blocking pool under the configured deadline.
async fn hash_secret(state: &AppState, secret: &str) -> AppResult<String> {
    let hasher = state.hasher.clone();
    let secret = secret.to_string();
    bounded(state.config.hash_timeout(), "credential hashing", async move {
        tokio::task::spawn_blocking(move || hasher.hash(&secret))
            .await
            .map_err(|e| AppError::Configuration(format!("hashing task failed: {}", e)))?
    })
    .await
}

/// Validates and stores a new account. The plaintext is dropped once hashed.
pub async fn create_account(
    state: &AppState,
    name: &str,
    email: &str,
    secret: &str,
    kind: &str,
) -> AppResult<Account> {
    let name = validate_name(name)?;
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return Err(AppError::Validation("please provide a valid email".into()));
    }
    validate_secret(secret)?;
    let kind: AccountKind = kind.parse()?;

    let limit = state.config.store_timeout();
    if bounded(limit, "account lookup", state.accounts.find_by_email(&email))
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("email already registered".into()));
    }

    let credential_hash = hash_secret(state, secret).await?;
    let account = bounded(
        limit,
        "account insert",
        state.accounts.insert(NewAccount {
            name,
            email,
            credential_hash,
            kind,
        }),
    )
    .await?;
    debug!(account_id = %account.id, kind = %account.kind, "account created");
    Ok(account)
}

/// Constant-time check of `secret` against the stored hash. Wrong secrets yield `false`.
pub async fn verify_credential(state: &AppState, account: &Account, secret: &str) -> AppResult<bool> {
    let hasher = state.hasher.clone();
    let hash = account.credential_hash.clone();
    let secret = secret.to_string();
    bounded(state.config.hash_timeout(), "credential verification", async move {
        tokio::task::spawn_blocking(move || hasher.verify(&secret, &hash))
            .await
            .map_err(|e| AppError::Configuration(format!("verification task failed: {}", e)))?
    })
    .await
}

/// Sets `last_login_at` to now. Repeated calls only move it forward.
pub async fn record_login(state: &AppState, account: &Account) -> AppResult<Account> {
    bounded(
        state.config.store_timeout(),
        "record login",
        state.accounts.touch_last_login(account.id),
    )
    .await
}

/// Email/password login. Unknown email and wrong password are indistinguishable.
pub async fn authenticate(state: &AppState, email: &str, secret: &str) -> AppResult<Account> {
    let email = normalize_email(email);
    let invalid = || AppError::Unauthorized("invalid credentials".into());
    if !is_valid_email(&email) {
        return Err(invalid());
    }
    let account = find_by_email(state, &email).await?.ok_or_else(invalid)?;
    if !verify_credential(state, &account, secret).await? {
        return Err(invalid());
    }
    if !account.is_active {
        return Err(AppError::Forbidden("account is disabled".into()));
    }
    record_login(state, &account).await
}

/// Replaces the credential; the hash is only recomputed when the plaintext differs.
pub async fn change_credential(
    state: &AppState,
    account: &Account,
    new_secret: &str,
) -> AppResult<Account> {
    validate_secret(new_secret)?;
    if verify_credential(state, account, new_secret).await? {
        return Ok(account.clone());
    }
    let hash = hash_secret(state, new_secret).await?;
    let updated = bounded(
        state.config.store_timeout(),
        "credential update",
        state.accounts.set_credential_hash(account.id, &hash),
    )
    .await?;
    debug!(account_id = %account.id, "credential changed");
    Ok(updated)
}

pub async fn find_by_id(state: &AppState, id: Uuid) -> AppResult<Option<Account>> {
    bounded(
        state.config.store_timeout(),
        "account lookup",
        state.accounts.find_by_id(id),
    )
    .await
}

pub async fn find_by_email(state: &AppState, email: &str) -> AppResult<Option<Account>> {
    let email = normalize_email(email);
    bounded(
        state.config.store_timeout(),
        "account lookup",
        state.accounts.find_by_email(&email),
    )
    .await
}
