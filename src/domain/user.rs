//! User domain entity and related types.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::errors::{AppError, AppResult};

/// Vietnamese numbering plan: mobile `3/5/7/8/9` + 8 digits, landline `2` + 9 digits,
/// with a national `0` or international `+84`/`84` prefix.
static VN_PHONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\+?84|0)(?:[35789]\d{8}|2\d{9})$").expect("valid phone regex")
});

/// User domain entity, including the password hash.
///
/// Only returned by lookups used for credential checks; everything
/// client-facing goes through [`UserProfile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub image: Option<String>,
    pub code_id: Option<Uuid>,
    pub code_expired: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Drop the password hash.
    pub fn into_profile(self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            image: self.image,
            code_id: self.code_id,
            code_expired: self.code_expired,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// User record without the password field (safe to return to clients)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Unique user identifier
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    #[schema(example = "Nguyen Van A")]
    pub name: String,
    #[schema(example = "a@example.com")]
    pub email: String,
    #[schema(example = "0901234567")]
    pub phone: Option<String>,
    pub address: Option<String>,
    pub image: Option<String>,
    /// Verification code issued at registration
    pub code_id: Option<Uuid>,
    /// Expiry of the verification code
    pub code_expired: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Verification code stamped on registration-created users.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationCode {
    pub code_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl VerificationCode {
    /// Fresh code valid for `ttl` from `now`.
    pub fn issue(now: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            code_id: Uuid::new_v4(),
            expires_at: now + ttl,
        }
    }
}

/// Record handed to the store on insert; the password is already hashed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub image: Option<String>,
    pub verification: Option<VerificationCode>,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub image: Option<String>,
}

/// Identifier of a newly created user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreatedUser {
    pub id: Uuid,
}

/// Result of an update by identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    /// Number of records matched by the identifier (0 or 1)
    pub matched_count: u64,
}

/// Result of a delete by identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    /// Number of records removed (0 when nothing matched)
    pub deleted_count: u64,
}

/// User creation request (also used for registration)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateUser {
    #[validate(length(min = 1, message = "Name is required"))]
    #[schema(example = "Nguyen Van A")]
    pub name: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Email is not valid")
    )]
    #[schema(example = "a@example.com")]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "SecurePass123!")]
    pub password: String,

    #[validate(custom(function = "validate_phone"))]
    #[schema(example = "0901234567")]
    pub phone: Option<String>,

    pub address: Option<String>,

    pub image: Option<String>,
}

/// User update request; `_id` selects the record, other fields are optional.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateUser {
    #[serde(rename = "_id")]
    #[validate(custom(function = "validate_record_id"))]
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: String,

    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,

    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,

    pub address: Option<String>,

    pub image: Option<String>,
}

impl UpdateUser {
    /// Split into the parsed identifier and the partial field set.
    pub fn into_parts(self) -> AppResult<(Uuid, UserChanges)> {
        let id = parse_record_id(&self.id)?;
        let changes = UserChanges {
            name: self.name,
            phone: self.phone,
            address: self.address,
            image: self.image,
        };
        Ok((id, changes))
    }
}

/// Parse a record identifier, rejecting anything that is not a UUID.
pub fn parse_record_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::invalid_id(raw))
}

/// Check a phone number against the regional format.
///
/// Spaces, dots and dashes are accepted as separators.
pub fn is_valid_phone(raw: &str) -> bool {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '.' | '-'))
        .collect();
    VN_PHONE.is_match(&compact)
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if is_valid_phone(phone) {
        Ok(())
    } else {
        Err(ValidationError::new("phone").with_message("Phone number is not valid".into()))
    }
}

fn validate_record_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::new("required").with_message("ID is required".into()));
    }
    parse_record_id(id)
        .map(|_| ())
        .map_err(|_| ValidationError::new("record_id").with_message("ID is not valid".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_input() -> CreateUser {
        CreateUser {
            name: "A".to_string(),
            email: "a@x.com".to_string(),
            password: "p1".to_string(),
            phone: None,
            address: None,
            image: None,
        }
    }

    #[test]
    fn test_minimal_create_is_valid() {
        assert!(create_input().validate().is_ok());
    }

    #[test]
    fn test_required_fields() {
        let mut input = create_input();
        input.name = String::new();
        input.password = String::new();

        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("password"));
        assert!(!fields.contains_key("email"));
    }

    #[test]
    fn test_email_format() {
        let mut input = create_input();
        input.email = "not-an-email".to_string();

        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }

    #[test]
    fn test_phone_is_optional_but_checked() {
        let mut input = create_input();
        input.phone = Some("0901234567".to_string());
        assert!(input.validate().is_ok());

        input.phone = Some("12345".to_string());
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("phone"));
    }

    #[test]
    fn test_phone_formats() {
        assert!(is_valid_phone("0901234567"));
        assert!(is_valid_phone("+84901234567"));
        assert!(is_valid_phone("84 90 123 4567"));
        assert!(is_valid_phone("0912.345.678"));
        assert!(is_valid_phone("02438123456"));
        assert!(!is_valid_phone("0101234567"));
        assert!(!is_valid_phone("090123456"));
        assert!(!is_valid_phone("+1 415 555 0100"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let body = r#"{"name":"A","email":"a@x.com","password":"p1","role":"admin"}"#;
        assert!(serde_json::from_str::<CreateUser>(body).is_err());
    }

    #[test]
    fn test_update_requires_valid_id() {
        let body = r#"{"_id":"not-a-uuid","name":"B"}"#;
        let input: UpdateUser = serde_json::from_str(body).unwrap();
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("id"));

        let body = r#"{"name":"B"}"#;
        assert!(serde_json::from_str::<UpdateUser>(body).is_err());
    }

    #[test]
    fn test_update_into_parts() {
        let id = Uuid::new_v4();
        let body = format!(r#"{{"_id":"{}","name":"B"}}"#, id);
        let input: UpdateUser = serde_json::from_str(&body).unwrap();
        assert!(input.validate().is_ok());

        let (parsed, changes) = input.into_parts().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(changes.name.as_deref(), Some("B"));
        assert!(changes.phone.is_none());
    }

    #[test]
    fn test_parse_record_id() {
        assert!(parse_record_id(&Uuid::new_v4().to_string()).is_ok());
        assert!(matches!(parse_record_id("123"), Err(AppError::InvalidId(_))));
    }

    #[test]
    fn test_verification_code_expiry() {
        let now = Utc::now();
        let code = VerificationCode::issue(now, chrono::Duration::minutes(5));
        assert_eq!(code.expires_at - now, chrono::Duration::minutes(5));
    }

    #[test]
    fn test_profile_drops_password_hash() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "A".to_string(),
            email: "a@x.com".to_string(),
            password_hash: "$argon2id$hash".to_string(),
            phone: None,
            address: None,
            image: None,
            code_id: None,
            code_expired: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&user.clone().into_profile()).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!serde_json::to_string(&user).unwrap().contains("argon2"));
    }
}
