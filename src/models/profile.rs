use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ContactCard;
use crate::utils::AppError;

/// Private IAN profile owned by a user
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct IanProfile {
    pub avatar: String,
    pub first_name: String,
    pub last_name: String,
    pub discipline: String,
    pub department: String,
    pub academic_email: String,
    pub objectives: String,
    pub notes: String,  // private, never projected
}

impl Default for IanProfile {
    fn default() -> Self {
        Self {
            avatar: "👤".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            discipline: String::new(),
            department: String::new(),
            academic_email: String::new(),
            objectives: String::new(),
            notes: String::new(),
        }
    }
}

impl IanProfile {
    pub fn get(&self, field: ProfileField) -> &str {
        match field {
            ProfileField::Avatar => &self.avatar,
            ProfileField::FirstName => &self.first_name,
            ProfileField::LastName => &self.last_name,
            ProfileField::Discipline => &self.discipline,
            ProfileField::Department => &self.department,
            ProfileField::AcademicEmail => &self.academic_email,
            ProfileField::Objectives => &self.objectives,
            ProfileField::Notes => &self.notes,
        }
    }

    pub fn set(&mut self, field: ProfileField, value: String) {
        let slot = match field {
            ProfileField::Avatar => &mut self.avatar,
            ProfileField::FirstName => &mut self.first_name,
            ProfileField::LastName => &mut self.last_name,
            ProfileField::Discipline => &mut self.discipline,
            ProfileField::Department => &mut self.department,
            ProfileField::AcademicEmail => &mut self.academic_email,
            ProfileField::Objectives => &mut self.objectives,
            ProfileField::Notes => &mut self.notes,
        };
        *slot = value;
    }
}

/// Addressable field of [`IanProfile`], named as on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileField {
    Avatar,
    FirstName,
    LastName,
    Discipline,
    Department,
    AcademicEmail,
    Objectives,
    Notes,
}

impl ProfileField {
    pub const ALL: [ProfileField; 8] = [
        ProfileField::Avatar,
        ProfileField::FirstName,
        ProfileField::LastName,
        ProfileField::Discipline,
        ProfileField::Department,
        ProfileField::AcademicEmail,
        ProfileField::Objectives,
        ProfileField::Notes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileField::Avatar => "avatar",
            ProfileField::FirstName => "firstName",
            ProfileField::LastName => "lastName",
            ProfileField::Discipline => "discipline",
            ProfileField::Department => "department",
            ProfileField::AcademicEmail => "academicEmail",
            ProfileField::Objectives => "objectives",
            ProfileField::Notes => "notes",
        }
    }

    /// Private fields never reach the public projection
    pub fn is_private(&self) -> bool {
        matches!(self, ProfileField::Notes)
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProfileField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| AppError::InvalidRequest(format!("Unknown profile field: {}", s)))
    }
}

/// The user document exchanged with clients (GET / PUT /api/user/data)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    #[serde(default)]
    pub ian_profile: Option<IanProfile>,
    #[serde(default)]
    pub contacts: Vec<ContactCard>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub newsletters: Vec<serde_json::Value>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub actualites: Vec<serde_json::Value>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub usages: Vec<serde_json::Value>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// Directory entry derived from [`IanProfile`]; has no slot for private notes
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default, utoipa::ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct PublicProfile {
    pub user_id: String,
    pub display_name: String,
    pub email: String,
    pub avatar: String,
    pub first_name: String,
    pub last_name: String,
    pub discipline: String,
    pub department: String,
    pub academic_email: String,
    pub objectives: String,
    pub last_updated: Option<String>,
}

impl PublicProfile {
    /// Applies a single profile field; private fields are ignored
    pub fn set(&mut self, field: ProfileField, value: String) {
        let slot = match field {
            ProfileField::Avatar => &mut self.avatar,
            ProfileField::FirstName => &mut self.first_name,
            ProfileField::LastName => &mut self.last_name,
            ProfileField::Discipline => &mut self.discipline,
            ProfileField::Department => &mut self.department,
            ProfileField::AcademicEmail => &mut self.academic_email,
            ProfileField::Objectives => &mut self.objectives,
            ProfileField::Notes => return,
        };
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_round_trip() {
        for field in ProfileField::ALL {
            assert_eq!(field.as_str().parse::<ProfileField>().unwrap(), field);
        }
        assert!("password".parse::<ProfileField>().is_err());
        assert!("ianProfile.notes".parse::<ProfileField>().is_err());
    }

    #[test]
    fn test_only_notes_is_private() {
        let private: Vec<_> = ProfileField::ALL.iter().filter(|f| f.is_private()).collect();
        assert_eq!(private, vec![&ProfileField::Notes]);
    }

    #[test]
    fn test_user_data_accepts_partial_documents() {
        let data: UserData = serde_json::from_str(r#"{"contacts": []}"#).unwrap();
        assert!(data.ian_profile.is_none());
        assert!(data.usages.is_empty());

        let data: UserData =
            serde_json::from_str(r#"{"ianProfile": {"discipline": "Maths"}}"#).unwrap();
        let profile = data.ian_profile.unwrap();
        assert_eq!(profile.discipline, "Maths");
        assert_eq!(profile.avatar, "👤");
    }

    #[test]
    fn test_public_profile_serializes_without_notes() {
        let mut public = PublicProfile::default();
        public.set(ProfileField::Notes, "secret".into());
        let json = serde_json::to_value(&public).unwrap();

        assert!(json.get("notes").is_none());
        assert!(!json.to_string().contains("secret"));
    }
}
