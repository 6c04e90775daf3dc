use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::models::SessionUser;
use crate::utils::AppError;

/// Signed-in credential plus the denormalized current user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
}

/// On-disk layout, one key per persisted item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredSession {
    #[serde(skip_serializing_if = "Option::is_none")]
    auth_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<SessionUser>,
    /// Backend-specific identifiers, e.g. a stored main gist id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    extras: BTreeMap<String, String>,
}

/// Client-side credential store. File-backed when opened with a path,
/// memory-only otherwise.
pub struct SessionStore {
    path: Option<PathBuf>,
    state: Mutex<StoredSession>,
}

impl SessionStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(StoredSession::default()),
        }
    }

    /// Load persisted state from `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();

        let state = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("⚠️ Discarding unreadable session file {}: {}", path.display(), e);
                StoredSession::default()
            }),
            Err(_) => StoredSession::default(),
        };

        Self {
            path: Some(path),
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoredSession>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::BackendUnavailable("session store lock poisoned".to_string()))
    }

    fn persist(&self, state: &StoredSession) -> Result<(), AppError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let raw = serde_json::to_string_pretty(state)
            .map_err(|e| AppError::BackendUnavailable(format!("Failed to encode session: {}", e)))?;

        // Write-then-rename so a crash never leaves half a file
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, raw)
            .and_then(|_| fs::rename(&tmp, path))
            .map_err(|e| AppError::BackendUnavailable(format!("Failed to persist session: {}", e)))
    }

    /// The stored session, if both token and user are present
    pub fn current(&self) -> Option<Session> {
        let state = self.lock().ok()?;
        match (&state.auth_token, &state.user) {
            (Some(token), Some(user)) => Some(Session {
                token: token.clone(),
                user: user.clone(),
            }),
            _ => None,
        }
    }

    pub fn save(&self, session: &Session) -> Result<(), AppError> {
        let mut state = self.lock()?;
        state.auth_token = Some(session.token.clone());
        state.username = Some(session.user.label().to_string());
        state.user = Some(session.user.clone());
        self.persist(&state)
    }

    /// Forget everything, extras included. Safe to call repeatedly.
    pub fn clear(&self) -> Result<(), AppError> {
        let mut state = self.lock()?;
        *state = StoredSession::default();

        if let Some(path) = &self.path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(AppError::BackendUnavailable(format!(
                        "Failed to remove session file: {}",
                        e
                    )))
                }
            }
        }

        Ok(())
    }

    pub fn username(&self) -> Option<String> {
        self.lock().ok()?.username.clone()
    }

    pub fn extra(&self, key: &str) -> Option<String> {
        self.lock().ok()?.extras.get(key).cloned()
    }

    pub fn set_extra(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut state = self.lock()?;
        state.extras.insert(key.to_string(), value.to_string());
        self.persist(&state)
    }
}
