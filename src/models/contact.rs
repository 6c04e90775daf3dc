use serde::{Deserialize, Deserializer, Serialize};

/// Free-form card on the ecosystem page
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactCard {
    pub id: String,
    pub name: String,
    pub emoji: String,
    pub color: String,
    /// Star rating, 1 to 3; out-of-range input is clamped
    #[serde(deserialize_with = "importance_stars")]
    pub importance: u8,
    pub urgency: Urgency,
    #[schema(value_type = u8)]
    pub level: Level,
    pub role: String,
    pub link: String,
    pub coordinates: String,
    pub personal_notes: String,
    pub open: bool,
}

impl Default for ContactCard {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            emoji: "👤".to_string(),
            color: String::new(),
            importance: 1,
            urgency: Urgency::None,
            level: Level::Peer,
            role: String::new(),
            link: String::new(),
            coordinates: String::new(),
            personal_notes: String::new(),
            open: false,
        }
    }
}

impl ContactCard {
    pub const MIN_IMPORTANCE: u8 = 1;
    pub const MAX_IMPORTANCE: u8 = 3;

    pub fn new(name: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            ..Default::default()
        }
    }

    pub fn set_importance(&mut self, stars: u8) {
        self.importance = stars.clamp(Self::MIN_IMPORTANCE, Self::MAX_IMPORTANCE);
    }
}

fn importance_stars<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let stars = i64::deserialize(deserializer)?;
    let clamped = stars.clamp(ContactCard::MIN_IMPORTANCE as i64, ContactCard::MAX_IMPORTANCE as i64);
    Ok(clamped as u8)
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Medium,
    Low,
    #[default]
    None,
}

/// Hierarchical distance of a contact; serialized as 1, 2 or 3
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum Level {
    National = 1,
    #[default]
    Peer = 2,
    Field = 3,
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Level::National),
            2 => Ok(Level::Peer),
            3 => Ok(Level::Field),
            other => Err(format!("invalid contact level {}, expected 1, 2 or 3", other)),
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_wire_format() {
        let mut card = ContactCard::new("  DANE Lyon ");
        card.urgency = Urgency::High;
        card.level = Level::National;

        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["name"], "DANE Lyon");
        assert_eq!(json["urgency"], "high");
        assert_eq!(json["level"], 1);
        assert_eq!(json["importance"], 1);
        assert!(json.get("personalNotes").is_some());
    }

    #[test]
    fn test_importance_is_clamped() {
        let mut card = ContactCard::new("x");
        card.set_importance(0);
        assert_eq!(card.importance, 1);
        card.set_importance(9);
        assert_eq!(card.importance, 3);

        for (raw, stars) in [(200, 3), (1000, 3), (-5, 1), (0, 1), (2, 2)] {
            let parsed: ContactCard = serde_json::from_value(serde_json::json!({ "importance": raw })).unwrap();
            assert_eq!(parsed.importance, stars, "importance {}", raw);
        }

        let missing: ContactCard = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.importance, 1);
    }

    #[test]
    fn test_rejects_unknown_level() {
        let parsed: Result<ContactCard, _> = serde_json::from_str(r#"{"level": 4}"#);
        assert!(parsed.is_err());

        let loose: ContactCard = serde_json::from_str(r#"{"name": "Canopé"}"#).unwrap();
        assert_eq!(loose.level, Level::Peer);
        assert_eq!(loose.urgency, Urgency::None);
    }
}
