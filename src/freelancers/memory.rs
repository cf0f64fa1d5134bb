use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{
    aggregate::FreelancerProfile,
    repo::{ProfileMutation, ProfileStore},
};
use crate::{
    db::bounded,
    error::{AppError, AppResult},
};

/// Process-local profile store with one writer lock per aggregate.
#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<Uuid, Arc<Mutex<FreelancerProfile>>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, account_id: Uuid) -> Option<Arc<Mutex<FreelancerProfile>>> {
        self.profiles.read().await.get(&account_id).cloned()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn insert(&self, profile: FreelancerProfile) -> AppResult<FreelancerProfile> {
        let mut profiles = self.profiles.write().await;
        if profiles.contains_key(&profile.account_id) {
            return Err(AppError::Conflict(format!(
                "account {} already has a profile",
                profile.account_id
            )));
        }
        profiles.insert(profile.account_id, Arc::new(Mutex::new(profile.clone())));
        Ok(profile)
    }

    async fn get(&self, account_id: Uuid) -> AppResult<Option<FreelancerProfile>> {
        match self.slot(account_id).await {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn mutate(
        &self,
        account_id: Uuid,
        deadline: Duration,
        f: ProfileMutation,
    ) -> AppResult<FreelancerProfile> {
        let slot = self
            .slot(account_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("freelancer profile {}", account_id)))?;
        let mut current = bounded(deadline, "profile lock", async {
            Ok::<_, AppError>(slot.lock().await)
        })
        .await?;
        let mut draft = current.clone();
        f(&mut draft)?;
        *current = draft.clone();
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::freelancers::aggregate::ProfileFields;

    const DEADLINE: Duration = Duration::from_secs(2);

    async fn seeded() -> (InMemoryProfileStore, Uuid) {
        let store = InMemoryProfileStore::new();
        let id = Uuid::new_v4();
        store
            .insert(FreelancerProfile::new(id, ProfileFields::default()).unwrap())
            .await
            .unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn insert_is_unique_per_account() {
        let store = InMemoryProfileStore::new();
        let id = Uuid::new_v4();
        store
            .insert(FreelancerProfile::new(id, ProfileFields::default()).unwrap())
            .await
            .unwrap();
        let err = store
            .insert(FreelancerProfile::new(id, ProfileFields::default()).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn failed_mutation_is_not_committed() {
        let (store, id) = seeded().await;

        let err = store
            .mutate(
                id,
                DEADLINE,
                Box::new(|p: &mut FreelancerProfile| {
                    p.ongoing_projects = 42;
                    Err(AppError::Validation("boom".into()))
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(store.get(id).await.unwrap().unwrap().ongoing_projects, 0);
    }

    #[tokio::test]
    async fn mutate_missing_profile_is_not_found() {
        let store = InMemoryProfileStore::new();
        let err = store
            .mutate(
                Uuid::new_v4(),
                DEADLINE,
                Box::new(|_: &mut FreelancerProfile| Ok(())),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn lock_wait_times_out_without_writing() {
        let (store, id) = seeded().await;
        let slot = store.slot(id).await.unwrap();
        let held = slot.lock().await;

        let err = store
            .mutate(
                id,
                Duration::from_millis(20),
                Box::new(|p: &mut FreelancerProfile| {
                    p.ongoing_projects = 9;
                    Ok(())
                }),
            )
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        drop(held);
        assert_eq!(store.get(id).await.unwrap().unwrap().ongoing_projects, 0);
    }

    #[tokio::test]
    async fn deadline_does_not_cut_off_an_apply_in_progress() {
        let (store, id) = seeded().await;
        let p = store
            .mutate(
                id,
                Duration::from_millis(10),
                Box::new(|p: &mut FreelancerProfile| {
                    std::thread::sleep(Duration::from_millis(50));
                    p.record_project_transition(0.0, false)
                }),
            )
            .await
            .unwrap();
        assert_eq!(p.ongoing_projects, 1);
        assert_eq!(store.get(id).await.unwrap().unwrap().ongoing_projects, 1);
    }
}
