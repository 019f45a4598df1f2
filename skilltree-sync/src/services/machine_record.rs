//! Catalog list record → [`Machine`] row

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use skilltree_common::db::{Machine, MachineStatus};

/// Host serving avatar paths that the API returns without a scheme
pub const AVATAR_HOST: &str = "https://htb-mp-prod-public-storage.s3.eu-central-1.amazonaws.com";

/// Machine entry from a list page
///
/// Numeric fields occasionally arrive as strings; both forms are accepted
/// and anything else becomes `None`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMachine {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub points: Option<i64>,
    #[serde(default, rename = "difficultyText", alias = "difficulty_text")]
    pub difficulty_text: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub user_owns_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub root_owns_count: Option<i64>,
    #[serde(default)]
    pub free: Option<bool>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub stars: Option<f64>,
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

impl RawMachine {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Absolute avatar URL; relative paths are served from [`AVATAR_HOST`]
    pub fn avatar_url(&self) -> Option<String> {
        self.avatar.as_deref().map(|avatar| {
            if avatar.starts_with("http") {
                avatar.to_string()
            } else {
                format!("{}{}", AVATAR_HOST, avatar)
            }
        })
    }

    pub fn into_machine(self, status: MachineStatus, now: DateTime<Utc>) -> Machine {
        let avatar = self.avatar_url();
        Machine {
            id: self.id,
            name: self.name,
            os: self.os,
            ip: self.ip,
            avatar,
            points: self.points,
            difficulty_text: self.difficulty_text,
            status,
            release_date: self.release,
            user_owns_count: self.user_owns_count,
            root_owns_count: self.root_owns_count,
            free: self.free,
            stars: self.stars,
            last_updated: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_relative_avatar_gets_storage_host() {
        let raw = RawMachine::from_value(json!({
            "id": 1,
            "name": "Lame",
            "avatar": "/storage/avatars/lame.png"
        }))
        .unwrap();

        assert_eq!(
            raw.avatar_url().as_deref(),
            Some("https://htb-mp-prod-public-storage.s3.eu-central-1.amazonaws.com/storage/avatars/lame.png")
        );
    }

    #[test]
    fn test_absolute_avatar_kept() {
        let raw = RawMachine::from_value(json!({
            "id": 1,
            "name": "Lame",
            "avatar": "https://cdn.example.com/lame.png"
        }))
        .unwrap();

        assert_eq!(raw.avatar_url().as_deref(), Some("https://cdn.example.com/lame.png"));
    }

    #[test]
    fn test_full_record_maps_every_column() {
        let now = Utc::now();
        let machine = RawMachine::from_value(json!({
            "id": 2,
            "name": "Legacy",
            "os": "Windows",
            "ip": "10.10.10.4",
            "points": 20,
            "difficultyText": "Easy",
            "release": "2017-03-15T20:00:00.000000Z",
            "user_owns_count": "12000",
            "root_owns_count": 11000,
            "free": false,
            "stars": "4.5",
            "playInfo": {"isActive": false}
        }))
        .unwrap()
        .into_machine(MachineStatus::Retired, now);

        assert_eq!(machine.id, 2);
        assert_eq!(machine.os.as_deref(), Some("Windows"));
        assert_eq!(machine.points, Some(20));
        assert_eq!(machine.difficulty_text.as_deref(), Some("Easy"));
        assert_eq!(machine.status, MachineStatus::Retired);
        assert_eq!(machine.user_owns_count, Some(12000));
        assert_eq!(machine.root_owns_count, Some(11000));
        assert_eq!(machine.free, Some(false));
        assert_eq!(machine.stars, Some(4.5));
        assert_eq!(machine.last_updated, now);
        assert!(machine.avatar.is_none());
    }

    #[test]
    fn test_snake_case_difficulty_accepted() {
        let raw = RawMachine::from_value(json!({
            "id": 3,
            "name": "Blue",
            "difficulty_text": "Easy",
            "points": null,
            "stars": "n/a"
        }))
        .unwrap();

        assert_eq!(raw.difficulty_text.as_deref(), Some("Easy"));
        assert_eq!(raw.points, None);
        assert_eq!(raw.stars, None);
    }

    #[test]
    fn test_missing_id_rejected() {
        assert!(RawMachine::from_value(json!({"name": "NoId"})).is_err());
    }
}
