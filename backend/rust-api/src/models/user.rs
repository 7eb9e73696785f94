use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// External identity linked to an account (provider name plus the
/// provider's stable subject id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    pub provider: String,
    pub subject: String,
}

/// User model stored in the "users" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<ProviderIdentity>,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(
        rename = "lastLoginAt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "bson_datetime_as_chrono_option"
    )]
    pub last_login_at: Option<DateTime<Utc>>,
}

// Serde converters for chrono::DateTime <-> mongodb::bson::DateTime
pub(crate) mod bson_datetime_as_chrono {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bson_dt = bson::DateTime::from_millis(date.timestamp_millis());
        bson_dt.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bson_dt = bson::DateTime::deserialize(deserializer)?;
        DateTime::from_timestamp_millis(bson_dt.timestamp_millis())
            .ok_or_else(|| D::Error::custom("timestamp out of range"))
    }
}

pub(crate) mod bson_datetime_as_chrono_option {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => {
                let bson_dt = bson::DateTime::from_millis(d.timestamp_millis());
                serializer.serialize_some(&bson_dt)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt_bson_dt: Option<bson::DateTime> = Option::deserialize(deserializer)?;
        opt_bson_dt
            .map(|bson_dt| {
                DateTime::from_timestamp_millis(bson_dt.timestamp_millis())
                    .ok_or_else(|| D::Error::custom("timestamp out of range"))
            })
            .transpose()
    }
}

/// User profile returned to client (without sensitive data)
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub provider: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<&UserRecord> for UserProfile {
    fn from(user: &UserRecord) -> Self {
        UserProfile {
            id: user.id.clone(),
            email: user.email.clone(),
            provider: user.identity.as_ref().map(|i| i.provider.clone()),
            created_at: user.created_at,
            last_login_at: user.last_login_at,
        }
    }
}

/// Request to register a new user
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Request to login
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Sign-in through an external identity provider whose token the client
/// already verified.
#[derive(Debug, Deserialize, Validate)]
pub struct ProviderLoginRequest {
    #[validate(length(min = 1, max = 64, message = "Provider is required"))]
    pub provider: String,

    #[validate(length(min = 1, max = 256, message = "Subject is required"))]
    pub subject: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

/// Response after successful login or registration
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserProfile,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mongodb::bson;

    #[test]
    fn record_round_trips_through_bson() {
        let user = UserRecord {
            id: "u1".to_string(),
            email: Some("a@example.com".to_string()),
            password_hash: Some("hash".to_string()),
            identity: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
            last_login_at: None,
        };
        let document = bson::to_document(&user).unwrap();
        assert_eq!(document.get_str("_id").unwrap(), "u1");
        assert!(document.get_datetime("createdAt").is_ok());
        assert!(!document.contains_key("identity"));

        let restored: UserRecord = bson::from_document(document).unwrap();
        assert_eq!(restored.created_at, user.created_at);
        assert_eq!(restored.email, user.email);
    }

    #[test]
    fn profile_hides_password_hash() {
        let user = UserRecord {
            id: "u2".to_string(),
            email: None,
            password_hash: Some("secret".to_string()),
            identity: Some(ProviderIdentity {
                provider: "google".to_string(),
                subject: "123".to_string(),
            }),
            created_at: Utc::now(),
            last_login_at: None,
        };
        let json = serde_json::to_value(UserProfile::from(&user)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["provider"], "google");
    }

    #[test]
    fn register_request_validation() {
        let bad = RegisterRequest {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
        };
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
        assert!(errors.field_errors().contains_key("password"));
    }
}
