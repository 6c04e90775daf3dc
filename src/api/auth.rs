use actix_web::{web, HttpResponse, ResponseError};
use crate::{
    config::AuthSettings,
    middleware::auth::Claims,
    ports::Storage,
    services::auth_service::{self, AuthResponse, SignInRequest, SignUpRequest},
};

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    tag = "Auth",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input or email already in use")
    )
)]
pub async fn sign_up(
    storage: web::Data<Storage>,
    settings: web::Data<AuthSettings>,
    request: web::Json<SignUpRequest>,
) -> HttpResponse {
    log::info!("📝 POST /api/auth/signup - email: {}", request.email);

    match auth_service::sign_up(storage.auth.as_ref(), &settings, &request).await {
        Ok(response) => HttpResponse::Created().json(response),
        Err(e) => {
            log::warn!("❌ Sign up failed: {} - {}", request.email, e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/signin",
    tag = "Auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Incorrect email or password")
    )
)]
pub async fn sign_in(
    storage: web::Data<Storage>,
    settings: web::Data<AuthSettings>,
    request: web::Json<SignInRequest>,
) -> HttpResponse {
    log::info!("🔐 POST /api/auth/signin - email: {}", request.email);

    match auth_service::sign_in(storage.auth.as_ref(), &settings, &request).await {
        Ok(response) => {
            log::info!("✅ Sign in successful: {}", response.user.email);
            HttpResponse::Ok().json(response)
        }
        Err(e) => {
            log::warn!("❌ Sign in failed: {} - {}", request.email, e);
            e.error_response()
        }
    }
}

/// Reached only through `AuthMiddleware`, so the token is already verified
#[utoipa::path(
    get,
    path = "/api/auth/verify",
    tag = "Auth",
    responses(
        (status = 200, description = "Token is valid"),
        (status = 401, description = "Missing token"),
        (status = 403, description = "Invalid or expired token")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn verify_token(claims: web::ReqData<Claims>) -> HttpResponse {
    log::info!("✓ GET /api/auth/verify - user: {}", claims.user_id);

    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "valid": true,
        "user": claims.session_user(),
        "exp": claims.exp
    }))
}
