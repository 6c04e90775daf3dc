pub mod auth;
pub mod directory;
pub mod health;
pub mod swagger;
pub mod user;


use actix_web::{error::InternalError, web, HttpResponse};

use crate::middleware::auth::AuthMiddleware;

/// Malformed JSON bodies answer 400 with the usual error envelope
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let message = err.to_string();
        log::warn!("⚠️ Rejected JSON body: {}", message);
        InternalError::from_response(
            err,
            HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "error": message
            })),
        )
        .into()
    })
}

/// Route table. Expects `web::Data<Storage>` and `web::Data<AuthSettings>` in app data.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/", web::get().to(health::index))
        .route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api/auth")
                .route("/signup", web::post().to(auth::sign_up))
                .route("/signin", web::post().to(auth::sign_in))
                .service(
                    web::resource("/verify")
                        .wrap(AuthMiddleware)
                        .route(web::get().to(auth::verify_token)),
                ),
        )
        .service(
            web::scope("/api/user")
                .wrap(AuthMiddleware)
                .route("/data", web::get().to(user::get_data))
                .route("/data", web::put().to(user::save_data))
                .route("/profile/{field}", web::patch().to(user::update_field)),
        )
        .service(
            web::scope("/api/directory")
                .route("/profiles", web::get().to(directory::get_profiles)),
        )
        .default_service(web::route().to(health::not_found));
}
