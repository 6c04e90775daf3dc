use crate::models::PublicProfile;
use crate::ports::DirectoryPort;
use crate::utils::AppError;

/// Every public projection; order is whatever the store yields
pub async fn list_profiles(directory: &dyn DirectoryPort) -> Result<Vec<PublicProfile>, AppError> {
    let profiles = directory.list_public_profiles().await?;
    log::debug!("📇 Directory listing: {} profiles", profiles.len());
    Ok(profiles)
}

/// Failure-tolerant listing: any error yields an empty directory
pub async fn shared_profiles(directory: &dyn DirectoryPort) -> Vec<PublicProfile> {
    match list_profiles(directory).await {
        Ok(profiles) => profiles,
        Err(e) => {
            log::error!("❌ Failed to list public profiles: {}", e);
            Vec::new()
        }
    }
}
