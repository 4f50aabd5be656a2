use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    pub is_active: bool,
    /// False for accounts created on someone's behalf until they bootstrap a password.
    pub password_set: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public projection returned alongside a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub profile_picture: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            profile_picture: user.profile_picture.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    /// Omitted for resident/family accounts; they set one on first login.
    pub password: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    pub is_active: Option<bool>,
}

impl UserPatch {
    pub fn apply(self, user: &mut User) {
        let patch = self;
        apply_patch!(patch => user; set: [name, email, role, is_active]; wrap: [phone, profile_picture]);
    }
}

/// Fields a user may change on their own account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
}

impl ProfilePatch {
    pub fn apply(self, user: &mut User) {
        let patch = self;
        apply_patch!(patch => user; set: [name]; wrap: [phone, profile_picture]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: Some("secret".into()),
            role: Role::Nurse,
            phone: Some("555-0100".into()),
            profile_picture: None,
            is_active: true,
            password_set: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn patch_keeps_omitted_fields() {
        let mut user = sample();
        UserPatch {
            name: Some("Ada L.".into()),
            ..Default::default()
        }
        .apply(&mut user);
        assert_eq!(user.name, "Ada L.");
        assert_eq!(user.phone.as_deref(), Some("555-0100"));
        assert_eq!(user.role, Role::Nurse);
        assert!(user.is_active);
    }

    #[test]
    fn password_hash_never_serialized() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "nurse");
    }
}
