use async_trait::async_trait;

use super::session::{Session, SessionStore};
use crate::config::AuthSettings;
use crate::models::{ProfileField, PublicProfile, SessionUser, UserData};
use crate::ports::Storage;
use crate::services::auth_service::{self, SignInRequest, SignUpRequest};
use crate::services::{directory_service, user_service};
use crate::utils::AppError;

/// Session-scoped client interface. Every adapter keeps its own session and
/// persists it through a [`SessionStore`].
#[async_trait]
pub trait Backend: Send + Sync {
    /// Create an account and sign in as it
    async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<SessionUser, AppError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionUser, AppError>;

    /// Clears in-memory and persisted session state, even when already signed out
    async fn sign_out(&self) -> Result<(), AppError>;

    fn current_user(&self) -> Option<SessionUser>;

    /// `Ok(None)` when the user has no document yet
    async fn get_user_data(&self) -> Result<Option<UserData>, AppError>;

    async fn save_user_data(&self, data: &UserData) -> Result<(), AppError>;

    async fn update_profile_field(&self, field: ProfileField, value: &str) -> Result<(), AppError>;

    /// Never fails: any error yields an empty directory
    async fn get_shared_profiles(&self) -> Vec<PublicProfile>;
}

/// In-process backend running the services directly over [`Storage`]
pub struct LocalBackend {
    storage: Storage,
    settings: AuthSettings,
    session: SessionStore,
}

impl LocalBackend {
    /// A restored session whose token no longer verifies is cleared
    pub fn new(storage: Storage, settings: AuthSettings, session: SessionStore) -> Self {
        if let Some(stored) = session.current() {
            if auth_service::verify_token(&settings, &stored.token).is_err() {
                log::info!("🔑 Stored session for {} expired, clearing", stored.user.email);
                if let Err(e) = session.clear() {
                    log::warn!("⚠️ Failed to clear stale session: {}", e);
                }
            }
        }

        Self {
            storage,
            settings,
            session,
        }
    }

    fn owner(&self) -> Result<SessionUser, AppError> {
        let session = self.session.current().ok_or(AppError::NotAuthenticated)?;

        match auth_service::verify_token(&self.settings, &session.token) {
            Ok(claims) => Ok(claims.session_user()),
            Err(e) => {
                self.session.clear()?;
                Err(e)
            }
        }
    }

    fn remember(&self, token: String, user: SessionUser) -> Result<SessionUser, AppError> {
        self.session.save(&Session {
            token,
            user: user.clone(),
        })?;
        Ok(user)
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<SessionUser, AppError> {
        let request = SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            display_name: display_name.to_string(),
        };
        let response = auth_service::sign_up(self.storage.auth.as_ref(), &self.settings, &request).await?;
        self.remember(response.token, response.user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionUser, AppError> {
        let request = SignInRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = auth_service::sign_in(self.storage.auth.as_ref(), &self.settings, &request).await?;
        self.remember(response.token, response.user)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.session.clear()
    }

    fn current_user(&self) -> Option<SessionUser> {
        self.session.current().map(|session| session.user)
    }

    async fn get_user_data(&self) -> Result<Option<UserData>, AppError> {
        let owner = self.owner()?;
        user_service::get_user_data(&self.storage, &owner.user_id).await
    }

    async fn save_user_data(&self, data: &UserData) -> Result<(), AppError> {
        let owner = self.owner()?;
        user_service::save_user_data(&self.storage, &owner, data.clone()).await?;
        Ok(())
    }

    async fn update_profile_field(&self, field: ProfileField, value: &str) -> Result<(), AppError> {
        let owner = self.owner()?;
        user_service::update_profile_field(&self.storage, &owner, field, value).await?;
        Ok(())
    }

    async fn get_shared_profiles(&self) -> Vec<PublicProfile> {
        directory_service::shared_profiles(self.storage.directory.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;

    fn settings() -> AuthSettings {
        AuthSettings {
            jwt_secret: "local-secret".to_string(),
            jwt_expiration_secs: 3600,
            bcrypt_cost: 4,
        }
    }

    fn backend() -> LocalBackend {
        LocalBackend::new(
            Storage::from_adapter(MemoryStore::new()),
            settings(),
            SessionStore::in_memory(),
        )
    }

    #[tokio::test]
    async fn test_data_calls_need_a_session() {
        let backend = backend();

        assert_eq!(backend.get_user_data().await.unwrap_err(), AppError::NotAuthenticated);
        assert_eq!(
            backend.save_user_data(&UserData::default()).await.unwrap_err(),
            AppError::NotAuthenticated
        );
        assert_eq!(
            backend.update_profile_field(ProfileField::Discipline, "x").await.unwrap_err(),
            AppError::NotAuthenticated
        );
        assert!(backend.get_shared_profiles().await.is_empty());
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_out() {
        let backend = backend();

        let user = backend.sign_up("alice@example.com", "pw123456", "Alice").await.unwrap();
        assert_eq!(backend.current_user(), Some(user));
        assert!(backend.get_user_data().await.unwrap().is_some());

        backend.sign_out().await.unwrap();
        backend.sign_out().await.unwrap();
        assert!(backend.current_user().is_none());
    }

    #[test]
    fn test_expired_stored_session_is_cleared() {
        let settings = settings();
        let user = SessionUser {
            user_id: "u1".to_string(),
            email: "alice@example.com".to_string(),
            display_name: "Alice".to_string(),
        };
        let stale = auth_service::generate_token_at(&settings, &user, 0).unwrap();

        let session = SessionStore::in_memory();
        session.save(&Session { token: stale, user }).unwrap();

        let backend = LocalBackend::new(Storage::from_adapter(MemoryStore::new()), settings, session);
        assert!(backend.current_user().is_none());
    }
}
