use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthSettings;
use crate::middleware::auth::Claims;
use crate::models::{SessionUser, UserRecord};
use crate::ports::AuthPort;
use crate::utils::AppError;

const MIN_PASSWORD_LEN: usize = 6;

/// Hash checked against when the email is unknown, so both sign-in failures
/// cost one bcrypt verification. Holds the cost it was made with.
static DUMMY_HASH: tokio::sync::OnceCell<(u32, String)> = tokio::sync::OnceCell::const_new();

// Request/Response structures
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(default)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: SessionUser,
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// First failing rule wins, as a 400 message
fn validate_sign_up(request: &SignUpRequest) -> Result<(), AppError> {
    if !is_valid_email(request.email.trim()) {
        return Err(AppError::InvalidRequest("Invalid email".to_string()));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    if request.display_name.trim().is_empty() {
        return Err(AppError::InvalidRequest("Display name is required".to_string()));
    }
    Ok(())
}

fn validate_sign_in(request: &SignInRequest) -> Result<(), AppError> {
    if !is_valid_email(request.email.trim()) {
        return Err(AppError::InvalidRequest("Invalid email".to_string()));
    }
    if request.password.is_empty() {
        return Err(AppError::InvalidRequest("Password is required".to_string()));
    }
    Ok(())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// Generate JWT token
pub fn generate_token(settings: &AuthSettings, user: &SessionUser) -> Result<String, AppError> {
    generate_token_at(settings, user, Utc::now().timestamp())
}

/// Token issued at `issued_at` (unix seconds), expiring after the configured TTL
pub fn generate_token_at(
    settings: &AuthSettings,
    user: &SessionUser,
    issued_at: i64,
) -> Result<String, AppError> {
    let exp = issued_at + settings.jwt_expiration_secs;

    let claims = Claims {
        user_id: user.user_id.clone(),
        email: user.email.clone(),
        display_name: user.display_name.clone(),
        iat: issued_at.max(0) as usize,
        exp: exp.max(0) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::BackendUnavailable(format!("Failed to generate token: {}", e)))
}

// Verify JWT token
pub fn verify_token(settings: &AuthSettings, token: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
        &validation,
    )?;

    Ok(data.claims)
}

async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash(password, cost))
        .await
        .map_err(|e| AppError::BackendUnavailable(format!("Hashing task failed: {}", e)))?
        .map_err(AppError::from)
}

async fn verify_password(password: String, stored_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify(password, &stored_hash))
        .await
        .map_err(|e| AppError::BackendUnavailable(format!("Hashing task failed: {}", e)))?
        .map_err(AppError::from)
}

async fn dummy_hash(cost: u32) -> Result<String, AppError> {
    let (made_with, dummy) = DUMMY_HASH
        .get_or_try_init(|| async {
            let dummy = hash_password(uuid::Uuid::new_v4().to_string(), cost).await?;
            Ok::<_, AppError>((cost, dummy))
        })
        .await?;

    if *made_with == cost {
        Ok(dummy.clone())
    } else {
        hash_password(uuid::Uuid::new_v4().to_string(), cost).await
    }
}

// User registration
pub async fn sign_up(
    auth: &dyn AuthPort,
    settings: &AuthSettings,
    request: &SignUpRequest,
) -> Result<AuthResponse, AppError> {
    validate_sign_up(request)?;

    let email = normalize_email(&request.email);
    let display_name = request.display_name.trim();

    // create_account re-checks atomically
    if auth.find_by_email(&email).await?.is_some() {
        return Err(AppError::DuplicateEmail);
    }

    let password_hash = hash_password(request.password.clone(), settings.bcrypt_cost).await?;
    let user = auth
        .create_account(UserRecord::new(&email, password_hash, display_name))
        .await?;

    let session = user.session_user();
    let token = generate_token(settings, &session)?;

    log::info!("✅ User registered: {} ({})", session.email, session.user_id);

    Ok(AuthResponse {
        success: true,
        token,
        user: session,
    })
}

// User login
pub async fn sign_in(
    auth: &dyn AuthPort,
    settings: &AuthSettings,
    request: &SignInRequest,
) -> Result<AuthResponse, AppError> {
    validate_sign_in(request)?;

    let email = normalize_email(&request.email);

    // Unknown email and wrong password are indistinguishable to the caller,
    // in the answer and in the time it takes
    let user = match auth.find_by_email(&email).await? {
        Some(user) => user,
        None => {
            let dummy = dummy_hash(settings.bcrypt_cost).await?;
            verify_password(request.password.clone(), dummy).await?;
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_password(request.password.clone(), user.password.clone()).await? {
        return Err(AppError::InvalidCredentials);
    }

    let session = user.session_user();
    let token = generate_token(settings, &session)?;

    Ok(AuthResponse {
        success: true,
        token,
        user: session,
    })
}
