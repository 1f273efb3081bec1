//! Application state - Dependency injection container.

use std::sync::Arc;

use crate::config::Config;
use crate::domain::Argon2Hasher;
use crate::errors::AppResult;
use crate::infra::{Database, UserStore};
use crate::services::{UserManager, UserService};

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// User service
    pub user_service: Arc<dyn UserService>,
    /// Database connection, checked by `/health`; absent when the service
    /// is backed by something else (tests)
    pub database: Option<Arc<Database>>,
}

impl AppState {
    /// Wire the SeaORM store and the Argon2 hasher into a `UserManager`.
    pub fn from_config(database: Arc<Database>, config: &Config) -> AppResult<Self> {
        let users = Arc::new(UserStore::new(database.get_connection()));
        let hasher = Arc::new(Argon2Hasher::new(config.hashing)?);
        let user_service = Arc::new(UserManager::new(users, hasher));

        Ok(Self::new(user_service, Some(database)))
    }

    /// Create new application state with manually injected services.
    pub fn new(user_service: Arc<dyn UserService>, database: Option<Arc<Database>>) -> Self {
        Self {
            user_service,
            database,
        }
    }

    /// State without a database handle.
    pub fn with_service(user_service: Arc<dyn UserService>) -> Self {
        Self::new(user_service, None)
    }
}
