use utoipa::OpenApi;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "IAN Ecosystem API",
        version = "1.0.0",
        description = "Profiles and contact directory for IAN (Interlocuteurs Académiques pour le Numérique).\n\n**Authentication:** `/api/user/*` and `/api/auth/verify` require a JWT Bearer token obtained from sign up or sign in."
    ),
    paths(
        crate::api::auth::sign_up,
        crate::api::auth::sign_in,
        crate::api::auth::verify_token,

        crate::api::user::get_data,
        crate::api::user::save_data,
        crate::api::user::update_field,

        crate::api::directory::get_profiles,

        crate::api::health::health_check,
    ),
    components(
        schemas(
            crate::services::auth_service::SignUpRequest,
            crate::services::auth_service::SignInRequest,
            crate::services::auth_service::AuthResponse,
            crate::models::SessionUser,
            crate::models::UserData,
            crate::models::IanProfile,
            crate::models::ContactCard,
            crate::models::Urgency,
            crate::models::PublicProfile,
            crate::api::user::UpdateFieldRequest,
            crate::api::directory::DirectoryResponse,
            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Account creation, sign in and token verification."),
        (name = "User", description = "The signed-in user's private document and profile fields."),
        (name = "Directory", description = "Public profiles, readable without authentication."),
        (name = "Health", description = "Liveness probe."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token returned by /api/auth/signin"))
                        .build()
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_wire_contract() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        for expected in [
            "/api/auth/signup",
            "/api/auth/signin",
            "/api/user/data",
            "/api/user/profile/{field}",
            "/api/directory/profiles",
            "/health",
        ] {
            assert!(paths.iter().any(|p| p.as_str() == expected), "missing {}", expected);
        }
    }
}
