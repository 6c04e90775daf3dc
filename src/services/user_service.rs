use crate::models::{ProfileField, SessionUser, UserData};
use crate::ports::Storage;
use crate::services::projection;
use crate::utils::{now_timestamp, AppError};

/// `Ok(None)` is the normal state of an account without a document
pub async fn get_user_data(storage: &Storage, user_id: &str) -> Result<Option<UserData>, AppError> {
    storage.profiles.get_user_data(user_id).await
}

/// Full upsert of the owner's document, stamped with `lastUpdated`.
/// Re-derives the public projection when the document carries a profile.
///
/// The user document is written first; if the projection write then fails the
/// error is returned and the two stores may disagree until the next save.
pub async fn save_user_data(
    storage: &Storage,
    owner: &SessionUser,
    mut data: UserData,
) -> Result<UserData, AppError> {
    let updated_at = now_timestamp();
    data.last_updated = Some(updated_at.clone());
    for card in &mut data.contacts {
        card.set_importance(card.importance);
    }

    storage.profiles.put_user_data(&owner.user_id, &data).await?;

    if let Some(profile) = &data.ian_profile {
        let public = projection::project(owner, profile, Some(updated_at));
        storage.directory.upsert_public_profile(&public).await?;
    }

    log::debug!("💾 Saved data for user {}", owner.user_id);

    Ok(data)
}

/// Update one profile field; returns the `lastUpdated` stamp written
pub async fn update_profile_field(
    storage: &Storage,
    owner: &SessionUser,
    field: ProfileField,
    value: &str,
) -> Result<String, AppError> {
    let updated_at = now_timestamp();

    storage
        .profiles
        .set_profile_field(&owner.user_id, field, value, &updated_at)
        .await?;

    if !field.is_private() {
        storage
            .directory
            .set_public_field(&owner.user_id, field, value, &updated_at)
            .await?;
    }

    Ok(updated_at)
}
