use std::sync::Arc;

use tracing::warn;

use crate::{
    accounts::{
        jwt::SessionKeys,
        memory::InMemoryAccountStore,
        password::CredentialHasher,
        repo::{AccountStore, PgAccountStore},
    },
    config::AppConfig,
    db,
    freelancers::{
        memory::InMemoryProfileStore,
        repo::{PgProfileStore, ProfileStore},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: Arc<SessionKeys>,
    pub hasher: Arc<CredentialHasher>,
    pub accounts: Arc<dyn AccountStore>,
    pub profiles: Arc<dyn ProfileStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let (accounts, profiles) = match config.database_url.as_deref() {
            Some(url) => {
                let pool = db::connect_with_retry(&config, url).await?;
                db::migrate(&pool).await?;
                (
                    Arc::new(PgAccountStore::new(pool.clone())) as Arc<dyn AccountStore>,
                    Arc::new(PgProfileStore::new(pool)) as Arc<dyn ProfileStore>,
                )
            }
            None => {
                warn!("DATABASE_URL not set; using in-memory stores");
                (
                    Arc::new(InMemoryAccountStore::new()) as Arc<dyn AccountStore>,
                    Arc::new(InMemoryProfileStore::new()) as Arc<dyn ProfileStore>,
                )
            }
        };

        Self::from_parts(config, accounts, profiles).map_err(Into::into)
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        accounts: Arc<dyn AccountStore>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Result<Self, crate::error::AppError> {
        let keys = Arc::new(SessionKeys::from_config(&config.jwt)?);
        let hasher = Arc::new(CredentialHasher::from_config(&config.hash)?);
        Ok(Self {
            config,
            keys,
            hasher,
            accounts,
            profiles,
        })
    }

    /// In-memory state with cheap hashing for tests.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{HashConfig, JwtConfig};

        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                refresh_ttl_minutes: 60,
            },
            hash: HashConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            store_timeout_ms: 2_000,
            hash_timeout_ms: 10_000,
            db_connect_retries: 0,
            db_connect_retry_delay_secs: 0,
        });

        Self::from_parts(
            config,
            Arc::new(InMemoryAccountStore::new()),
            Arc::new(InMemoryProfileStore::new()),
        )
        .expect("fake state")
    }
}
