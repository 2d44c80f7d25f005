use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::TokenVerifier;
use crate::config::AppConfig;
use crate::database::{DataStore, MemoryStore, PgStore, StoreError};
use crate::roster::{RosterService, RosterSource, StoreRosterSource};

/// Process-wide collaborators handed to every handler.
///
/// Built once by the entry point through [`AppState::init`] and torn down
/// with [`AppState::shutdown`].
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub verifier: Arc<TokenVerifier>,
    pub store: Arc<dyn DataStore>,
    pub roster: Arc<RosterService>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.config.environment)
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Connect the configured store; without a database URL the in-process
    /// store is used.
    pub async fn init(config: AppConfig) -> Result<Self, StoreError> {
        let store: Arc<dyn DataStore> = match &config.database.url {
            Some(url) => {
                let store = PgStore::connect(url, &config.database).await?;
                store.health_check().await?;
                Arc::new(store)
            }
            None => {
                warn!("No database configured, using the in-process store");
                Arc::new(MemoryStore::new())
            }
        };
        info!(
            "Roster cache: capacity={} ttl={}s",
            config.cache.roster_capacity, config.cache.roster_ttl_secs
        );
        Ok(Self::new(config, store))
    }

    /// Wire the roster to the `MemberLookup` table of `store`.
    pub fn new(config: AppConfig, store: Arc<dyn DataStore>) -> Self {
        let source = Arc::new(StoreRosterSource::new(Arc::clone(&store)));
        Self::with_roster_source(config, store, source)
    }

    pub fn with_roster_source(config: AppConfig, store: Arc<dyn DataStore>, source: Arc<dyn RosterSource>) -> Self {
        let verifier = TokenVerifier::new(&config.security.jwt_secret, config.security.token_ttl());
        let roster = RosterService::new(source, config.cache.roster_capacity, config.cache.roster_ttl());
        Self {
            config: Arc::new(config),
            verifier: Arc::new(verifier),
            store,
            roster: Arc::new(roster),
        }
    }

    pub async fn shutdown(&self) {
        self.roster.invalidate_all().await;
        self.store.close().await;
        info!("Application state shut down");
    }
}
