use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataPrivacy {
    #[default]
    Private,
    Friends,
    Public,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
    Fr,
    De,
    Pt,
    Ja,
}

/// Profile preferences. Every key is required and unknown keys are refused,
/// so a stored record always has exactly this shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct UserSettings {
    pub notifications: bool,
    pub sounds: bool,
    pub dark_mode: bool,
    pub daily_reminders: bool,
    pub meditation_sounds: bool,
    pub data_privacy: DataPrivacy,
    pub language: Language,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            notifications: true,
            sounds: true,
            dark_mode: false,
            daily_reminders: true,
            meditation_sounds: true,
            data_privacy: DataPrivacy::Private,
            language: Language::En,
        }
    }
}

const BOOLEAN_KEYS: [&str; 5] = [
    "notifications",
    "sounds",
    "dark_mode",
    "daily_reminders",
    "meditation_sounds",
];

impl UserSettings {
    /// Validates an untyped JSON body, naming the first offending key.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let Value::Object(map) = &value else {
            return Err(ValidationError::new("settings", "expected a JSON object"));
        };

        for key in map.keys() {
            let known = BOOLEAN_KEYS.contains(&key.as_str())
                || key == "data_privacy"
                || key == "language";
            if !known {
                return Err(ValidationError::new(key.as_str(), "unknown setting"));
            }
        }

        for key in BOOLEAN_KEYS {
            match map.get(key) {
                None => return Err(ValidationError::new(key, "setting is required")),
                Some(Value::Bool(_)) => {}
                Some(_) => return Err(ValidationError::new(key, "expected true or false")),
            }
        }

        check_choice::<DataPrivacy>(map, "data_privacy", "private, friends or public")?;
        check_choice::<Language>(map, "language", "en, es, fr, de, pt or ja")?;

        serde_json::from_value(value).map_err(|e| ValidationError::new("settings", e.to_string()))
    }
}

fn check_choice<T: DeserializeOwned>(
    map: &serde_json::Map<String, Value>,
    key: &str,
    allowed: &str,
) -> Result<(), ValidationError> {
    let value = map
        .get(key)
        .ok_or_else(|| ValidationError::new(key, "setting is required"))?;
    T::deserialize(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new(key, format!("expected one of {}", allowed)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "notifications": false,
            "sounds": true,
            "dark_mode": true,
            "daily_reminders": false,
            "meditation_sounds": true,
            "data_privacy": "friends",
            "language": "ja"
        })
    }

    #[test]
    fn accepts_a_complete_record() {
        let settings = UserSettings::from_value(valid()).unwrap();
        assert!(settings.dark_mode);
        assert_eq!(settings.data_privacy, DataPrivacy::Friends);
        assert_eq!(settings.language, Language::Ja);
    }

    #[test]
    fn rejects_unknown_keys() {
        let mut body = valid();
        body["theme"] = json!("solarized");
        let err = UserSettings::from_value(body).unwrap_err();
        assert_eq!(err.field, "theme");
    }

    #[test]
    fn rejects_missing_keys() {
        let mut body = valid();
        body.as_object_mut().unwrap().remove("sounds");
        assert_eq!(UserSettings::from_value(body).unwrap_err().field, "sounds");
    }

    #[test]
    fn rejects_wrong_types_and_values() {
        let mut body = valid();
        body["notifications"] = json!("yes");
        assert_eq!(
            UserSettings::from_value(body).unwrap_err().field,
            "notifications"
        );

        let mut body = valid();
        body["language"] = json!("it");
        assert_eq!(UserSettings::from_value(body).unwrap_err().field, "language");

        let mut body = valid();
        body["data_privacy"] = json!("everyone");
        assert_eq!(
            UserSettings::from_value(body).unwrap_err().field,
            "data_privacy"
        );

        assert!(UserSettings::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn typed_deserialization_also_refuses_unknown_keys() {
        let mut body = valid();
        body["extra"] = json!(true);
        assert!(serde_json::from_value::<UserSettings>(body).is_err());
    }

    #[test]
    fn defaults_serialize_with_lowercase_choices() {
        let value = serde_json::to_value(UserSettings::default()).unwrap();
        assert_eq!(value["data_privacy"], "private");
        assert_eq!(value["language"], "en");
        assert_eq!(UserSettings::from_value(value).unwrap(), UserSettings::default());
    }
}
