use actix_web::{web, HttpResponse};

use crate::{models::PublicProfile, ports::Storage, services::directory_service};

#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct DirectoryResponse {
    pub success: bool,
    pub profiles: Vec<PublicProfile>,
}

#[utoipa::path(
    get,
    path = "/api/directory/profiles",
    tag = "Directory",
    responses(
        (status = 200, description = "Every public profile, unordered", body = DirectoryResponse),
        (status = 500, description = "Storage failure; profiles is empty")
    )
)]
pub async fn get_profiles(storage: web::Data<Storage>) -> HttpResponse {
    log::info!("📇 GET /api/directory/profiles");

    match directory_service::list_profiles(storage.directory.as_ref()).await {
        Ok(profiles) => HttpResponse::Ok().json(DirectoryResponse {
            success: true,
            profiles,
        }),
        Err(e) => {
            log::error!("❌ Failed to list profiles: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "error": "Failed to list profiles",
                "profiles": []
            }))
        }
    }
}
