use actix_web::{HttpResponse, Responder};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        success: true,
        status: "healthy".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: crate::utils::now_timestamp(),
    })
}

/// Service index listing the public endpoints
pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "IAN API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "auth": {
                "signup": "POST /api/auth/signup",
                "signin": "POST /api/auth/signin",
                "verify": "GET /api/auth/verify"
            },
            "user": {
                "getData": "GET /api/user/data",
                "saveData": "PUT /api/user/data",
                "updateField": "PATCH /api/user/profile/:field"
            },
            "directory": {
                "getProfiles": "GET /api/directory/profiles"
            }
        }
    }))
}

pub async fn not_found() -> impl Responder {
    HttpResponse::NotFound().json(serde_json::json!({
        "success": false,
        "error": "Route not found"
    }))
}
