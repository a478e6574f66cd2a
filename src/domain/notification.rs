//! In-app notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::token::token_enum;

token_enum! {
    pub enum NotificationType("notification type") {
        UrgentRequest => "urgent_request",
        EligibilityReminder => "eligibility_reminder",
        DonationConfirmation => "donation_confirmation",
        AppointmentReminder => "appointment_reminder",
        InventoryLow => "inventory_low",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub is_read: bool,
    /// Entity the notification is about (hospital, request, donation)
    pub related_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Create an unread notification.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: title.into(),
            message: message.into(),
            kind,
            is_read: false,
            related_id: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn related_to(mut self, id: Uuid) -> Self {
        self.related_id = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_as_type_token() {
        let n = Notification::new(Uuid::new_v4(), NotificationType::InventoryLow, "t", "m");
        let json = serde_json::to_value(&n).expect("Should serialize");
        assert_eq!(json["type"], "inventory_low");
        assert_eq!(json["is_read"], false);
    }
}
