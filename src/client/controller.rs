use std::time::Duration;
use tokio::sync::watch;

use super::backend::Backend;
use crate::models::{ContactCard, IanProfile, ProfileField, PublicProfile, SessionUser, UserData};
use crate::sync::{Replication, SyncStatus};
use crate::utils::AppError;

/// Outcome of the last save, rendered as the status line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saved,
    Error(String),
}

/// Everything the views render from
#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// `None` means the login screen is shown
    pub user: Option<SessionUser>,
    pub data: UserData,
    pub directory: Vec<PublicProfile>,
    pub save_status: SaveStatus,
}

/// Fired once by the view layer when it is mounted
pub struct ReadySignal(watch::Sender<bool>);

pub struct ReadyWaiter(watch::Receiver<bool>);

pub fn ready_signal() -> (ReadySignal, ReadyWaiter) {
    let (tx, rx) = watch::channel(false);
    (ReadySignal(tx), ReadyWaiter(rx))
}

impl ReadySignal {
    pub fn mark_ready(&self) {
        self.0.send_replace(true);
    }
}

impl ReadyWaiter {
    /// Waits once, failing after `timeout` or if the signal is dropped unfired
    pub async fn wait(mut self, timeout: Duration) -> Result<(), AppError> {
        match tokio::time::timeout(timeout, self.0.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(AppError::BackendUnavailable(
                "View was dropped before becoming ready".to_string(),
            )),
            Err(_) => Err(AppError::BackendUnavailable(format!(
                "View not ready after {:?}",
                timeout
            ))),
        }
    }
}

/// Owns the application state and issues every command against a [`Backend`]
pub struct AppController<B: Backend> {
    backend: B,
    state: AppState,
    replications: Vec<Replication>,
}

impl<B: Backend> AppController<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: AppState::default(),
            replications: Vec::new(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_signed_in(&self) -> bool {
        self.state.user.is_some()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.state.user.as_ref().map(SessionUser::label)
    }

    /// Wait for the view, then restore the session if one survived.
    /// Returns whether a user is signed in.
    pub async fn start(&mut self, ready: ReadyWaiter, timeout: Duration) -> Result<bool, AppError> {
        ready.wait(timeout).await?;

        let Some(user) = self.backend.current_user() else {
            log::info!("🔑 No stored session, showing login");
            return Ok(false);
        };

        log::info!("🚀 Resuming session for {}", user.email);
        self.state.user = Some(user);

        match self.load().await {
            Ok(()) => Ok(true),
            Err(AppError::NotAuthenticated | AppError::InvalidToken) => {
                self.state = AppState::default();
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn sign_up(&mut self, email: &str, password: &str, display_name: &str) -> Result<SessionUser, AppError> {
        let user = self.backend.sign_up(email, password, display_name).await?;
        self.state.user = Some(user.clone());
        self.load().await?;
        Ok(user)
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<SessionUser, AppError> {
        let user = self.backend.sign_in(email, password).await?;
        self.state.user = Some(user.clone());
        self.load().await?;
        Ok(user)
    }

    /// Stops every replication, forgets the session and resets the state
    pub async fn sign_out(&mut self) -> Result<(), AppError> {
        for replication in self.replications.drain(..) {
            replication.cancel();
        }
        self.state = AppState::default();
        self.backend.sign_out().await
    }

    /// Fetch the user document; a missing document or profile starts from the default
    pub async fn load(&mut self) -> Result<(), AppError> {
        let mut data = self.backend.get_user_data().await?.unwrap_or_default();
        if data.ian_profile.is_none() {
            data.ian_profile = Some(IanProfile::default());
        }

        self.state.data = data;
        self.refresh_directory().await;
        Ok(())
    }

    pub async fn refresh_directory(&mut self) {
        self.state.directory = self.backend.get_shared_profiles().await;
    }

    /// Save the whole document. No automatic retry: a failure stays in
    /// `save_status` until the next save.
    pub async fn save(&mut self) -> Result<(), AppError> {
        match self.backend.save_user_data(&self.state.data).await {
            Ok(()) => {
                self.state.save_status = SaveStatus::Saved;
                self.refresh_directory().await;
                Ok(())
            }
            Err(e) => {
                log::error!("❌ Save failed: {}", e);
                self.state.save_status = SaveStatus::Error(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn update_profile_field(&mut self, field: ProfileField, value: &str) -> Result<(), AppError> {
        self.backend.update_profile_field(field, value).await?;

        self.state
            .data
            .ian_profile
            .get_or_insert_with(IanProfile::default)
            .set(field, value.to_string());

        if !field.is_private() {
            self.refresh_directory().await;
        }
        Ok(())
    }

    /// Returns the new card's id
    pub async fn add_contact(&mut self, name: &str) -> Result<String, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::InvalidRequest("Contact name is required".to_string()));
        }

        let card = ContactCard::new(name);
        let id = card.id.clone();
        self.state.data.contacts.push(card);
        self.save().await?;
        Ok(id)
    }

    pub async fn update_contact<F>(&mut self, id: &str, edit: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut ContactCard),
    {
        let card = self
            .state
            .data
            .contacts
            .iter_mut()
            .find(|card| card.id == id)
            .ok_or_else(|| AppError::NotFound("Contact not found".to_string()))?;

        edit(card);
        card.set_importance(card.importance);
        self.save().await
    }

    pub async fn delete_contact(&mut self, id: &str) -> Result<(), AppError> {
        let before = self.state.data.contacts.len();
        self.state.data.contacts.retain(|card| card.id != id);

        if self.state.data.contacts.len() == before {
            return Err(AppError::NotFound("Contact not found".to_string()));
        }
        self.save().await
    }

    /// Tie a replication to this session; it is cancelled on sign out
    pub fn attach_replication(&mut self, replication: Replication) {
        self.replications.push(replication);
    }

    pub fn sync_status(&self) -> Vec<(String, SyncStatus)> {
        self.replications
            .iter()
            .map(|replication| (replication.name().to_string(), replication.status()))
            .collect()
    }
}
