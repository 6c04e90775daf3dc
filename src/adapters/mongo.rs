use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::Collection;

use crate::database::{MongoDB, PUBLIC_PROFILES_COLLECTION, USERS_COLLECTION};
use crate::models::{ProfileField, PublicProfile, UserData, UserRecord};
use crate::ports::{AuthPort, DirectoryPort, ProfileStorePort};
use crate::utils::AppError;

/// MongoDB adapter over the "users" and "public_profiles" collections
#[derive(Clone)]
pub struct MongoStore {
    db: MongoDB,
}

impl MongoStore {
    pub fn new(db: MongoDB) -> Self {
        Self { db }
    }

    fn users(&self) -> Collection<UserRecord> {
        self.db.collection::<UserRecord>(USERS_COLLECTION)
    }

    fn public_profiles(&self) -> Collection<PublicProfile> {
        self.db.collection::<PublicProfile>(PUBLIC_PROFILES_COLLECTION)
    }
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}

fn to_bson<T: serde::Serialize>(value: &T) -> Result<mongodb::bson::Bson, AppError> {
    mongodb::bson::to_bson(value)
        .map_err(|e| AppError::BackendUnavailable(format!("Failed to encode document: {}", e)))
}

#[async_trait]
impl AuthPort for MongoStore {
    async fn create_account(&self, user: UserRecord) -> Result<UserRecord, AppError> {
        let collection = self.users();

        if collection.find_one(doc! { "email": &user.email }).await?.is_some() {
            return Err(AppError::DuplicateEmail);
        }

        // The unique index settles concurrent sign ups for the same email
        match collection.insert_one(&user).await {
            Ok(_) => Ok(user),
            Err(e) if is_duplicate_key(&e) => Err(AppError::DuplicateEmail),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self.users().find_one(doc! { "email": email }).await?)
    }
}

#[async_trait]
impl ProfileStorePort for MongoStore {
    async fn get_user_data(&self, user_id: &str) -> Result<Option<UserData>, AppError> {
        let user = self.users().find_one(doc! { "userId": user_id }).await?;
        Ok(user.as_ref().map(UserRecord::data))
    }

    async fn put_user_data(&self, user_id: &str, data: &UserData) -> Result<(), AppError> {
        let mut set = Document::new();
        if let Some(profile) = &data.ian_profile {
            set.insert("ianProfile", to_bson(profile)?);
        }
        set.insert("contacts", to_bson(&data.contacts)?);
        set.insert("newsletters", to_bson(&data.newsletters)?);
        set.insert("actualites", to_bson(&data.actualites)?);
        set.insert("usages", to_bson(&data.usages)?);
        set.insert("lastUpdated", to_bson(&data.last_updated)?);

        let result = self
            .users()
            .update_one(doc! { "userId": user_id }, doc! { "$set": set })
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("user {}", user_id)));
        }

        Ok(())
    }

    async fn set_profile_field(
        &self,
        user_id: &str,
        field: ProfileField,
        value: &str,
        updated_at: &str,
    ) -> Result<(), AppError> {
        let mut set = Document::new();
        set.insert(format!("ianProfile.{}", field), value);
        set.insert("lastUpdated", updated_at);

        let result = self
            .users()
            .update_one(doc! { "userId": user_id }, doc! { "$set": set })
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("user {}", user_id)));
        }

        Ok(())
    }
}

#[async_trait]
impl DirectoryPort for MongoStore {
    async fn upsert_public_profile(&self, profile: &PublicProfile) -> Result<(), AppError> {
        self.public_profiles()
            .replace_one(doc! { "userId": &profile.user_id }, profile)
            .upsert(true)
            .await?;

        Ok(())
    }

    async fn set_public_field(
        &self,
        user_id: &str,
        field: ProfileField,
        value: &str,
        updated_at: &str,
    ) -> Result<(), AppError> {
        if field.is_private() {
            return Ok(());
        }

        let mut set = Document::new();
        set.insert(field.as_str(), value);
        set.insert("lastUpdated", updated_at);

        // Upsert copies userId from the filter into a new projection
        self.public_profiles()
            .update_one(doc! { "userId": user_id }, doc! { "$set": set })
            .upsert(true)
            .await?;

        Ok(())
    }

    async fn list_public_profiles(&self) -> Result<Vec<PublicProfile>, AppError> {
        let cursor = self.public_profiles().find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }
}
