use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::{ProfileField, PublicProfile, UserData, UserRecord};
use crate::ports::{AuthPort, DirectoryPort, ProfileStorePort};
use crate::utils::AppError;

/// In-process adapter. Collections keep insertion order.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<UserRecord>>,
    public_profiles: RwLock<Vec<PublicProfile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, AppError> {
    lock.read()
        .map_err(|_| AppError::BackendUnavailable("memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, AppError> {
    lock.write()
        .map_err(|_| AppError::BackendUnavailable("memory store lock poisoned".to_string()))
}

fn user_not_found(user_id: &str) -> AppError {
    AppError::NotFound(format!("user {}", user_id))
}

#[async_trait]
impl AuthPort for MemoryStore {
    async fn create_account(&self, user: UserRecord) -> Result<UserRecord, AppError> {
        let mut users = write(&self.users)?;

        if users.iter().any(|u| u.email == user.email) {
            return Err(AppError::DuplicateEmail);
        }

        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let users = read(&self.users)?;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }
}

#[async_trait]
impl ProfileStorePort for MemoryStore {
    async fn get_user_data(&self, user_id: &str) -> Result<Option<UserData>, AppError> {
        let users = read(&self.users)?;
        Ok(users.iter().find(|u| u.user_id == user_id).map(UserRecord::data))
    }

    async fn put_user_data(&self, user_id: &str, data: &UserData) -> Result<(), AppError> {
        let mut users = write(&self.users)?;
        let user = users
            .iter_mut()
            .find(|u| u.user_id == user_id)
            .ok_or_else(|| user_not_found(user_id))?;

        if let Some(profile) = &data.ian_profile {
            user.ian_profile = profile.clone();
        }
        user.contacts = data.contacts.clone();
        user.newsletters = data.newsletters.clone();
        user.actualites = data.actualites.clone();
        user.usages = data.usages.clone();
        user.last_updated = data.last_updated.clone();

        Ok(())
    }

    async fn set_profile_field(
        &self,
        user_id: &str,
        field: ProfileField,
        value: &str,
        updated_at: &str,
    ) -> Result<(), AppError> {
        let mut users = write(&self.users)?;
        let user = users
            .iter_mut()
            .find(|u| u.user_id == user_id)
            .ok_or_else(|| user_not_found(user_id))?;

        user.ian_profile.set(field, value.to_string());
        user.last_updated = Some(updated_at.to_string());

        Ok(())
    }
}

#[async_trait]
impl DirectoryPort for MemoryStore {
    async fn upsert_public_profile(&self, profile: &PublicProfile) -> Result<(), AppError> {
        let mut profiles = write(&self.public_profiles)?;

        match profiles.iter_mut().find(|p| p.user_id == profile.user_id) {
            Some(existing) => *existing = profile.clone(),
            None => profiles.push(profile.clone()),
        }

        Ok(())
    }

    async fn set_public_field(
        &self,
        user_id: &str,
        field: ProfileField,
        value: &str,
        updated_at: &str,
    ) -> Result<(), AppError> {
        let mut profiles = write(&self.public_profiles)?;

        let index = match profiles.iter().position(|p| p.user_id == user_id) {
            Some(index) => index,
            None => {
                profiles.push(PublicProfile {
                    user_id: user_id.to_string(),
                    ..Default::default()
                });
                profiles.len() - 1
            }
        };

        let profile = &mut profiles[index];
        profile.set(field, value.to_string());
        profile.last_updated = Some(updated_at.to_string());

        Ok(())
    }

    async fn list_public_profiles(&self) -> Result<Vec<PublicProfile>, AppError> {
        Ok(read(&self.public_profiles)?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> UserRecord {
        UserRecord::new(email, "hash".to_string(), "Someone")
    }

    #[tokio::test]
    async fn test_duplicate_email_keeps_first_account() {
        let store = MemoryStore::new();
        let first = store.create_account(user("a@example.com")).await.unwrap();

        let mut second = user("a@example.com");
        second.display_name = "Impostor".to_string();
        assert_eq!(store.create_account(second).await.unwrap_err(), AppError::DuplicateEmail);

        let stored = store.find_by_email("a@example.com").await.unwrap().unwrap();
        assert_eq!(stored.user_id, first.user_id);
        assert_eq!(stored.display_name, "Someone");
    }

    #[tokio::test]
    async fn test_put_without_profile_keeps_stored_profile() {
        let store = MemoryStore::new();
        let account = store.create_account(user("b@example.com")).await.unwrap();
        store
            .set_profile_field(&account.user_id, ProfileField::Discipline, "SVT", "t1")
            .await
            .unwrap();

        let data = UserData {
            ian_profile: None,
            last_updated: Some("t2".to_string()),
            ..Default::default()
        };
        store.put_user_data(&account.user_id, &data).await.unwrap();

        let stored = store.get_user_data(&account.user_id).await.unwrap().unwrap();
        assert_eq!(stored.ian_profile.unwrap().discipline, "SVT");
        assert_eq!(stored.last_updated.as_deref(), Some("t2"));
    }

    #[tokio::test]
    async fn test_unknown_user_is_none_or_not_found() {
        let store = MemoryStore::new();
        assert!(store.get_user_data("nobody").await.unwrap().is_none());

        let err = store.put_user_data("nobody", &UserData::default()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_public_field_creates_projection_in_insertion_order() {
        let store = MemoryStore::new();
        store.set_public_field("u1", ProfileField::Discipline, "Maths", "t").await.unwrap();
        store.set_public_field("u2", ProfileField::FirstName, "Zoé", "t").await.unwrap();
        store.set_public_field("u1", ProfileField::Department, "69", "t2").await.unwrap();

        let profiles = store.list_public_profiles().await.unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].user_id, "u1");
        assert_eq!(profiles[0].discipline, "Maths");
        assert_eq!(profiles[0].department, "69");
        assert_eq!(profiles[0].last_updated.as_deref(), Some("t2"));
        assert_eq!(profiles[1].first_name, "Zoé");
    }
}
