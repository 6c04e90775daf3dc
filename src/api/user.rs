use actix_web::{web, HttpResponse, ResponseError};
use serde::Deserialize;

use crate::{
    middleware::auth::Claims,
    models::{ProfileField, UserData},
    ports::Storage,
    services::user_service,
};

/// Error message of a 404 for an account without a document
pub const USER_NOT_FOUND: &str = "User not found";

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateFieldRequest {
    pub value: String,
}

#[utoipa::path(
    get,
    path = "/api/user/data",
    tag = "User",
    responses(
        (status = 200, description = "The user's document", body = UserData),
        (status = 404, description = "No document for this user")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_data(
    claims: web::ReqData<Claims>,
    storage: web::Data<Storage>,
) -> HttpResponse {
    log::info!("📖 GET /api/user/data - user: {}", claims.user_id);

    match user_service::get_user_data(&storage, &claims.user_id).await {
        Ok(Some(data)) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "data": data
        })),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "success": false,
            "error": USER_NOT_FOUND
        })),
        Err(e) => {
            log::error!("❌ Failed to read data for {}: {}", claims.user_id, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    put,
    path = "/api/user/data",
    tag = "User",
    request_body = UserData,
    responses(
        (status = 200, description = "Saved; public profile re-derived")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn save_data(
    claims: web::ReqData<Claims>,
    storage: web::Data<Storage>,
    data: web::Json<UserData>,
) -> HttpResponse {
    log::info!("💾 PUT /api/user/data - user: {}", claims.user_id);

    match user_service::save_user_data(&storage, &claims.session_user(), data.into_inner()).await {
        Ok(saved) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "message": "Data saved",
            "lastUpdated": saved.last_updated
        })),
        Err(e) => {
            log::error!("❌ Failed to save data for {}: {}", claims.user_id, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    patch,
    path = "/api/user/profile/{field}",
    tag = "User",
    params(
        ("field" = String, Path, description = "Profile field, e.g. discipline or notes")
    ),
    request_body = UpdateFieldRequest,
    responses(
        (status = 200, description = "Field updated"),
        (status = 400, description = "Unknown field")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_field(
    claims: web::ReqData<Claims>,
    storage: web::Data<Storage>,
    field: web::Path<String>,
    request: web::Json<UpdateFieldRequest>,
) -> HttpResponse {
    log::info!("🔧 PATCH /api/user/profile/{} - user: {}", field, claims.user_id);

    let field = match field.parse::<ProfileField>() {
        Ok(field) => field,
        Err(e) => {
            log::warn!("⚠️ {}", e);
            return e.error_response();
        }
    };

    match user_service::update_profile_field(&storage, &claims.session_user(), field, &request.value).await {
        Ok(updated_at) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "message": "Field updated",
            "lastUpdated": updated_at
        })),
        Err(e) => {
            log::error!("❌ Failed to update {} for {}: {}", field, claims.user_id, e);
            e.error_response()
        }
    }
}
