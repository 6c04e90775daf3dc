//! Storage ports.
//!
//! The HTTP layer and the services only talk to these traits; the concrete
//! backend (MongoDB, in-memory) is chosen once at startup and injected as a
//! [`Storage`] bundle.

use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{ProfileField, PublicProfile, UserData, UserRecord};
use crate::utils::AppError;

/// Account creation and lookup
#[async_trait]
pub trait AuthPort: Send + Sync {
    /// Insert a new account. Fails with [`AppError::DuplicateEmail`] if the
    /// email is taken, leaving the existing account untouched.
    async fn create_account(&self, user: UserRecord) -> Result<UserRecord, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError>;
}

/// Per-user private document
#[async_trait]
pub trait ProfileStorePort: Send + Sync {
    /// `Ok(None)` when the user has no document
    async fn get_user_data(&self, user_id: &str) -> Result<Option<UserData>, AppError>;

    /// Full replacement of the user's data. An absent profile keeps the stored one.
    async fn put_user_data(&self, user_id: &str, data: &UserData) -> Result<(), AppError>;

    async fn set_profile_field(
        &self,
        user_id: &str,
        field: ProfileField,
        value: &str,
        updated_at: &str,
    ) -> Result<(), AppError>;
}

/// Public projections served by the directory
#[async_trait]
pub trait DirectoryPort: Send + Sync {
    /// Insert or replace the projection keyed by `profile.user_id`
    async fn upsert_public_profile(&self, profile: &PublicProfile) -> Result<(), AppError>;

    /// Set one public field, creating the projection if absent
    async fn set_public_field(
        &self,
        user_id: &str,
        field: ProfileField,
        value: &str,
        updated_at: &str,
    ) -> Result<(), AppError>;

    /// Every projection, in the store's natural order
    async fn list_public_profiles(&self) -> Result<Vec<PublicProfile>, AppError>;
}

/// The three ports, as injected into the HTTP server and the local client backend
#[derive(Clone)]
pub struct Storage {
    pub auth: Arc<dyn AuthPort>,
    pub profiles: Arc<dyn ProfileStorePort>,
    pub directory: Arc<dyn DirectoryPort>,
}

impl Storage {
    /// Bundle a single adapter that implements every port
    pub fn from_adapter<A>(adapter: A) -> Self
    where
        A: AuthPort + ProfileStorePort + DirectoryPort + 'static,
    {
        let adapter = Arc::new(adapter);
        Self {
            auth: adapter.clone(),
            profiles: adapter.clone(),
            directory: adapter,
        }
    }
}
