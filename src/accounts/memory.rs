use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    accounts::{
        repo::AccountStore,
        repo_types::{Account, NewAccount},
    },
    error::{AppError, AppResult},
};

#[derive(Default)]
struct Inner {
    by_id: HashMap<Uuid, Account>,
    id_by_email: HashMap<String, Uuid>,
}

/// Process-local account store used without `DATABASE_URL` and in tests.
#[derive(Default)]
pub struct InMemoryAccountStore {
    inner: RwLock<Inner>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<F>(&self, id: Uuid, f: F) -> AppResult<Account>
    where
        F: FnOnce(&mut Account) + Send,
    {
        let mut inner = self.inner.write().await;
        let account = inner
            .by_id
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("account {}", id)))?;
        f(account);
        account.updated_at = OffsetDateTime::now_utc();
        Ok(account.clone())
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, new: NewAccount) -> AppResult<Account> {
        let mut inner = self.inner.write().await;
        if inner.id_by_email.contains_key(&new.email) {
            return Err(AppError::Conflict("email already registered".into()));
        }
        let account = Account::from_new(new);
        inner.id_by_email.insert(account.email.clone(), account.id);
        inner.by_id.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Account>> {
        Ok(self.inner.read().await.by_id.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let inner = self.inner.read().await;
        Ok(inner
            .id_by_email
            .get(email)
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn touch_last_login(&self, id: Uuid) -> AppResult<Account> {
        self.update(id, |a| {
            let now = OffsetDateTime::now_utc();
            a.last_login_at = Some(a.last_login_at.map_or(now, |prev| prev.max(now)));
        })
        .await
    }

    async fn set_credential_hash(&self, id: Uuid, hash: &str) -> AppResult<Account> {
        let hash = hash.to_string();
        self.update(id, move |a| a.credential_hash = hash).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::repo_types::AccountKind;

    fn new_account(email: &str) -> NewAccount {
        NewAccount {
            name: "Grace".into(),
            email: email.into(),
            credential_hash: "hash".into(),
            kind: AccountKind::Freelancer,
        }
    }

    #[tokio::test]
    async fn insert_enforces_unique_email() {
        let store = InMemoryAccountStore::new();
        store.insert(new_account("grace@example.com")).await.unwrap();
        let err = store.insert(new_account("grace@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn lookups_find_inserted_account() {
        let store = InMemoryAccountStore::new();
        let a = store.insert(new_account("grace@example.com")).await.unwrap();
        assert_eq!(store.find_by_id(a.id).await.unwrap().unwrap().email, a.email);
        assert_eq!(
            store.find_by_email("grace@example.com").await.unwrap().unwrap().id,
            a.id
        );
        assert!(store.find_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn touch_unknown_account_is_not_found() {
        let store = InMemoryAccountStore::new();
        let err = store.touch_last_login(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
