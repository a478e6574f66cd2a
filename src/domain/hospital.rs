//! Hospital profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Address;

/// Hospital profile, one-to-one with a [`super::User`].
///
/// `license_number` is unique across hospitals. New hospitals start
/// unverified and gain portal access once an administrator verifies them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub license_number: String,
    pub address: Address,
    pub phone: String,
    pub email: Option<String>,
    pub website: Option<String>,
    pub capacity: u32,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Hospital {
    #[must_use]
    pub fn new(
        user_id: Uuid,
        name: impl Into<String>,
        license_number: impl Into<String>,
        address: Address,
        phone: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            license_number: license_number.into(),
            address,
            phone: phone.into(),
            email: None,
            website: None,
            capacity: 0,
            is_verified: false,
            created_at: now,
            updated_at: now,
        }
    }
}
