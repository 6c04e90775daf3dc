use std::env;
use std::str::FromStr;

const DEV_JWT_SECRET: &str = "ian-dev-secret-change-me";

/// Which adapter backs the storage ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    MongoDB,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(StorageBackend::MongoDB),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("Unknown STORAGE_BACKEND: {}. Supported: mongodb, memory", other)),
        }
    }
}

/// Token signing and password hashing settings shared by the auth service and middleware
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub jwt_expiration_secs: i64,
    pub bcrypt_cost: u32,
}

impl AuthSettings {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            jwt_expiration_secs: 86_400,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub backend: StorageBackend,
    pub mongodb_uri: Option<String>,
    pub auth: AuthSettings,
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Read configuration from the process environment (after `.env` is loaded)
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match lookup("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| format!("Invalid PORT: {}", raw))?,
            None => 3000,
        };

        let backend = match lookup("STORAGE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => StorageBackend::MongoDB,
        };

        let mongodb_uri = lookup("MONGODB_URI");
        if backend == StorageBackend::MongoDB && mongodb_uri.is_none() {
            return Err("MONGODB_URI must be set when STORAGE_BACKEND=mongodb".to_string());
        }

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            log::warn!("⚠️  JWT_SECRET not set, using development secret");
            DEV_JWT_SECRET.to_string()
        });

        // Unparsable expiration falls back to one day
        let jwt_expiration_secs = lookup("JWT_EXPIRATION")
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(86_400);

        let bcrypt_cost = match lookup("BCRYPT_COST") {
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|cost| (4..=31).contains(cost))
                .ok_or_else(|| format!("Invalid BCRYPT_COST: {}", raw))?,
            None => 10,
        };

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            backend,
            mongodb_uri,
            auth: AuthSettings {
                jwt_secret,
                jwt_expiration_secs,
                bcrypt_cost,
            },
            cors_origins,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_with_memory_backend() {
        let config = config(&[("STORAGE_BACKEND", "memory")]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.backend, StorageBackend::Memory);
        assert_eq!(config.auth.jwt_expiration_secs, 86_400);
        assert_eq!(config.auth.bcrypt_cost, 10);
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn test_mongodb_requires_uri() {
        assert!(config(&[]).is_err());
        let config = config(&[("MONGODB_URI", "mongodb://localhost/ian")]).unwrap();
        assert_eq!(config.backend, StorageBackend::MongoDB);
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("STORAGE_BACKEND", "firebase")]).is_err());
        assert!(config(&[("STORAGE_BACKEND", "memory"), ("PORT", "http")]).is_err());

        let config = config(&[
            ("STORAGE_BACKEND", "memory"),
            ("JWT_EXPIRATION", "soon"),
            ("CORS_ORIGINS", "http://localhost:8080, ,http://127.0.0.1:8080"),
        ])
        .unwrap();
        assert_eq!(config.auth.jwt_expiration_secs, 86_400);
        assert_eq!(config.cors_origins.len(), 2);
    }
}
