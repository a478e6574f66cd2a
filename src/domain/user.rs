//! Identity records mirrored from the identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::token::token_enum;

token_enum! {
    /// Coarse role assigned when the profile is completed.
    pub enum UserRole("user role") {
        Donor => "donor",
        Hospital => "hospital",
        Admin => "admin",
    }
}

/// A signed-in person. Created on first sign-in and never deleted here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a user with a fresh id.
    #[must_use]
    pub fn new(email: impl Into<String>, full_name: impl Into<String>, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            full_name: full_name.into(),
            phone: None,
            role,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_tokens() {
        assert_eq!(UserRole::Hospital.as_str(), "hospital");
        assert_eq!("ADMIN".parse::<UserRole>(), Ok(UserRole::Admin));
        assert!("nurse".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_new_user_has_unique_id() {
        let a = User::new("a@example.org", "A", UserRole::Donor);
        let b = User::new("b@example.org", "B", UserRole::Donor);
        assert_ne!(a.id, b.id);
        assert!(a.phone.is_none());
    }
}
