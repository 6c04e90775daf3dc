use async_trait::async_trait;
use base64::Engine;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::backend::Backend;
use super::session::{Session, SessionStore};
use crate::api::user::USER_NOT_FOUND;
use crate::middleware::auth::Claims;
use crate::models::{ProfileField, PublicProfile, SessionUser, UserData};
use crate::services::auth_service::{AuthResponse, SignInRequest, SignUpRequest};
use crate::utils::AppError;

#[derive(Deserialize)]
struct DataEnvelope {
    data: UserData,
}

#[derive(Deserialize)]
struct ProfilesEnvelope {
    #[serde(default)]
    profiles: Vec<PublicProfile>,
}

#[derive(Deserialize)]
struct VerifyEnvelope {
    user: SessionUser,
}

/// Read the JWT payload without checking the signature; the server does that
pub fn decode_claims(token: &str) -> Result<Claims, AppError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AppError::InvalidToken);
    }

    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|_| AppError::InvalidToken)?;

    serde_json::from_slice(&payload).map_err(|_| AppError::InvalidToken)
}

/// HTTP client for the REST API
pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
}

impl RestBackend {
    /// Restores the persisted session; an undecodable or expired token is dropped
    pub fn new(base_url: impl Into<String>, session: SessionStore) -> Self {
        if let Some(stored) = session.current() {
            let now = chrono::Utc::now().timestamp();
            match decode_claims(&stored.token) {
                Ok(claims) if claims.exp as i64 > now => {
                    log::info!("🔑 Session restored for {}", claims.email);
                }
                _ => {
                    log::info!("🔑 Stored token unusable, clearing session");
                    if let Err(e) = session.clear() {
                        log::warn!("⚠️ Failed to clear session: {}", e);
                    }
                }
            }
        }

        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn token(&self) -> Result<String, AppError> {
        self.session
            .current()
            .map(|session| session.token)
            .ok_or(AppError::NotAuthenticated)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, AppError> {
        Ok(request.bearer_auth(self.token()?))
    }

    fn failure(&self, status: StatusCode, message: String, authenticated: bool) -> AppError {
        match status {
            StatusCode::UNAUTHORIZED if !authenticated => AppError::InvalidCredentials,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                // Never keep a credential the server refused
                if let Err(e) = self.session.clear() {
                    log::warn!("⚠️ Failed to clear session: {}", e);
                }
                if status == StatusCode::FORBIDDEN {
                    AppError::InvalidToken
                } else {
                    AppError::NotAuthenticated
                }
            }
            StatusCode::NOT_FOUND => AppError::NotFound(message),
            StatusCode::BAD_REQUEST if message == AppError::DuplicateEmail.to_string() => {
                AppError::DuplicateEmail
            }
            StatusCode::BAD_REQUEST => AppError::InvalidRequest(message),
            other => AppError::BackendUnavailable(format!("{}: {}", other, message)),
        }
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder, authenticated: bool) -> Result<T, AppError> {
        let response = request.send().await?;
        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);

        if status.is_success() {
            return serde_json::from_value(body)
                .map_err(|e| AppError::BackendUnavailable(format!("Unexpected response: {}", e)));
        }

        let message = body["error"].as_str().unwrap_or("Request failed").to_string();
        Err(self.failure(status, message, authenticated))
    }

    fn remember(&self, response: AuthResponse) -> Result<SessionUser, AppError> {
        self.session.save(&Session {
            token: response.token,
            user: response.user.clone(),
        })?;
        Ok(response.user)
    }

    /// Ask the server whether the stored token is still valid
    pub async fn verify_token(&self) -> Result<SessionUser, AppError> {
        let request = self.authorized(self.http.get(self.url("/auth/verify")))?;
        let envelope: VerifyEnvelope = self.call(request, true).await?;
        Ok(envelope.user)
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<SessionUser, AppError> {
        let request = self.http.post(self.url("/auth/signup")).json(&SignUpRequest {
            email: email.to_string(),
            password: password.to_string(),
            display_name: display_name.to_string(),
        });
        let response: AuthResponse = self.call(request, false).await?;
        self.remember(response)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionUser, AppError> {
        let request = self.http.post(self.url("/auth/signin")).json(&SignInRequest {
            email: email.to_string(),
            password: password.to_string(),
        });
        let response: AuthResponse = self.call(request, false).await?;
        self.remember(response)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.session.clear()
    }

    fn current_user(&self) -> Option<SessionUser> {
        self.session.current().map(|session| session.user)
    }

    async fn get_user_data(&self) -> Result<Option<UserData>, AppError> {
        let request = self.authorized(self.http.get(self.url("/user/data")))?;

        match self.call::<DataEnvelope>(request, true).await {
            Ok(envelope) => Ok(Some(envelope.data)),
            // Only the API's own "no document" answer; any other 404 (wrong
            // base URL, missing route) is a failure
            Err(AppError::NotFound(message)) if message == USER_NOT_FOUND => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn save_user_data(&self, data: &UserData) -> Result<(), AppError> {
        let request = self.authorized(self.http.put(self.url("/user/data")).json(data))?;
        self.call::<serde_json::Value>(request, true).await?;
        Ok(())
    }

    async fn update_profile_field(&self, field: ProfileField, value: &str) -> Result<(), AppError> {
        let request = self.authorized(
            self.http
                .patch(self.url(&format!("/user/profile/{}", field)))
                .json(&serde_json::json!({ "value": value })),
        )?;
        self.call::<serde_json::Value>(request, true).await?;
        Ok(())
    }

    async fn get_shared_profiles(&self) -> Vec<PublicProfile> {
        let request = self.http.get(self.url("/directory/profiles"));

        match self.call::<ProfilesEnvelope>(request, false).await {
            Ok(envelope) => envelope.profiles,
            Err(e) => {
                log::error!("❌ Failed to fetch shared profiles: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::config::AuthSettings;
    use crate::ports::Storage;
    use crate::services::auth_service;
    use actix_web::{web, App, HttpServer};

    fn settings() -> AuthSettings {
        AuthSettings {
            jwt_secret: "rest-secret".to_string(),
            jwt_expiration_secs: 3600,
            bcrypt_cost: 4,
        }
    }

    /// Serve the API on an ephemeral port; returns its base URL
    fn spawn_server() -> (String, actix_web::dev::ServerHandle) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let storage = Storage::from_adapter(MemoryStore::new());

        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(storage.clone()))
                .app_data(web::Data::new(settings()))
                .configure(crate::api::configure)
        })
        .workers(1)
        .listen(listener)
        .unwrap()
        .run();

        let handle = server.handle();
        actix_rt::spawn(server);
        (format!("http://{}", addr), handle)
    }

    #[test]
    fn test_decode_claims() {
        let user = SessionUser {
            user_id: "u1".to_string(),
            email: "alice@example.com".to_string(),
            display_name: "Alice".to_string(),
        };
        let token = auth_service::generate_token(&settings(), &user).unwrap();

        assert_eq!(decode_claims(&token).unwrap().session_user(), user);
        assert_eq!(decode_claims("abc").unwrap_err(), AppError::InvalidToken);
        assert_eq!(decode_claims("a.%%%.c").unwrap_err(), AppError::InvalidToken);
    }

    #[actix_web::test]
    async fn test_rest_round_trip() {
        let (base_url, handle) = spawn_server();
        let dir = tempfile::tempdir().unwrap();
        let session_path = dir.path().join("session.json");

        let client = RestBackend::new(&base_url, SessionStore::open(&session_path));
        assert_eq!(client.get_user_data().await.unwrap_err(), AppError::NotAuthenticated);
        assert!(client.get_shared_profiles().await.is_empty());

        let alice = client.sign_up("alice@example.com", "pw123456", "Alice").await.unwrap();
        assert_eq!(alice.display_name, "Alice");
        assert_eq!(
            client.sign_up("alice@example.com", "pw123456", "Again").await.unwrap_err(),
            AppError::DuplicateEmail
        );

        let data = client.get_user_data().await.unwrap().unwrap();
        assert_eq!(data.ian_profile.unwrap().avatar, "👤");

        client.update_profile_field(ProfileField::Discipline, "SNT").await.unwrap();
        client.update_profile_field(ProfileField::Notes, "private").await.unwrap();
        let profiles = client.get_shared_profiles().await;
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].discipline, "SNT");

        // A second client restores the persisted session
        let restored = RestBackend::new(&base_url, SessionStore::open(&session_path));
        assert_eq!(restored.current_user(), Some(alice.clone()));
        assert_eq!(restored.verify_token().await.unwrap(), alice);

        client.sign_out().await.unwrap();
        assert_eq!(
            client.sign_in("alice@example.com", "wrong-pw").await.unwrap_err(),
            AppError::InvalidCredentials
        );
        assert!(client.sign_in("alice@example.com", "pw123456").await.is_ok());

        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_missing_document_vs_missing_route() {
        let (base_url, handle) = spawn_server();

        // Validly signed token for an account the server has never seen
        let ghost = SessionUser {
            user_id: "ghost".to_string(),
            email: "ghost@example.com".to_string(),
            display_name: "Ghost".to_string(),
        };
        let token = auth_service::generate_token(&settings(), &ghost).unwrap();
        let session = Session { token, user: ghost };

        let store = SessionStore::in_memory();
        store.save(&session).unwrap();
        let client = RestBackend::new(&base_url, store);
        assert_eq!(client.get_user_data().await.unwrap(), None);

        // Mistyped base URL: the route 404 must not read as "no document"
        let store = SessionStore::in_memory();
        store.save(&session).unwrap();
        let misrouted = RestBackend::new(format!("{}/nope", base_url), store);
        assert_eq!(
            misrouted.get_user_data().await.unwrap_err(),
            AppError::NotFound("Route not found".to_string())
        );
        assert!(misrouted.current_user().is_some());

        handle.stop(true).await;
    }

    #[actix_web::test]
    async fn test_rejected_token_clears_session() {
        let (base_url, handle) = spawn_server();

        let user = SessionUser {
            user_id: "u1".to_string(),
            email: "mallory@example.com".to_string(),
            display_name: "Mallory".to_string(),
        };
        let forged_settings = AuthSettings {
            jwt_secret: "not-the-server-secret".to_string(),
            ..settings()
        };
        let forged = auth_service::generate_token(&forged_settings, &user).unwrap();

        let session = SessionStore::in_memory();
        session.save(&Session { token: forged, user }).unwrap();

        let client = RestBackend::new(&base_url, session);
        assert!(client.current_user().is_some());
        assert_eq!(client.get_user_data().await.unwrap_err(), AppError::InvalidToken);
        assert!(client.current_user().is_none());

        handle.stop(true).await;
    }
}
