use serde::{Deserialize, Serialize};
use mongodb::bson::oid::ObjectId;

use super::{ContactCard, IanProfile, UserData};

/// Stored account document - collection "users"
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none", default)]
    pub id: Option<ObjectId>,
    pub user_id: String,  // PRIMARY IDENTIFIER - carried in the JWT
    pub email: String,
    pub password: String,  // bcrypt hash
    pub display_name: String,
    pub created_at: String,
    #[serde(default)]
    pub ian_profile: IanProfile,
    #[serde(default)]
    pub contacts: Vec<ContactCard>,
    #[serde(default)]
    pub newsletters: Vec<serde_json::Value>,
    #[serde(default)]
    pub actualites: Vec<serde_json::Value>,
    #[serde(default)]
    pub usages: Vec<serde_json::Value>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl UserRecord {
    /// Fresh account with the default empty profile
    pub fn new(email: &str, password_hash: String, display_name: &str) -> Self {
        Self {
            id: None,
            user_id: ObjectId::new().to_hex(),
            email: email.to_string(),
            password: password_hash,
            display_name: display_name.to_string(),
            created_at: crate::utils::now_timestamp(),
            ian_profile: IanProfile::default(),
            contacts: Vec::new(),
            newsletters: Vec::new(),
            actualites: Vec::new(),
            usages: Vec::new(),
            last_updated: None,
        }
    }

    pub fn session_user(&self) -> SessionUser {
        SessionUser {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }

    /// The client-facing document, without credentials
    pub fn data(&self) -> UserData {
        UserData {
            ian_profile: Some(self.ian_profile.clone()),
            contacts: self.contacts.clone(),
            newsletters: self.newsletters.clone(),
            actualites: self.actualites.clone(),
            usages: self.usages.clone(),
            last_updated: self.last_updated.clone(),
        }
    }
}

/// Public identity fields of an account, as returned by sign up / sign in
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
}

impl SessionUser {
    /// Display name, falling back to the local part of the email
    pub fn label(&self) -> &str {
        if !self.display_name.is_empty() {
            return &self.display_name;
        }
        self.email.split('@').next().unwrap_or(&self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_has_default_profile() {
        let user = UserRecord::new("alice@example.com", "hash".into(), "Alice");
        let data = user.data();

        assert_eq!(data.ian_profile, Some(IanProfile::default()));
        assert!(data.contacts.is_empty());
        assert!(data.last_updated.is_none());
        assert_eq!(user.user_id.len(), 24);
    }

    #[test]
    fn test_label_falls_back_to_email() {
        let user = SessionUser {
            user_id: "1".into(),
            email: "bob@example.com".into(),
            display_name: String::new(),
        };
        assert_eq!(user.label(), "bob");
    }
}
