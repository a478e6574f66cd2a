//! Hospital blood requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::token::{capitalize, token_enum};
use super::BloodType;

token_enum! {
    /// Request urgency, ordered from least to most urgent.
    pub enum RequestPriority("request priority") {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

token_enum! {
    /// Request lifecycle. `Open` is the only non-terminal status.
    pub enum RequestStatus("request status") {
        Open => "open",
        Fulfilled => "fulfilled",
        Cancelled => "cancelled",
    }
}

impl RequestPriority {
    /// Display label, e.g. "Urgent".
    #[must_use]
    pub fn label(&self) -> String {
        capitalize(self.as_str())
    }

    /// Whether opening a request at this priority should alert donors.
    #[must_use]
    pub fn alerts_donors(&self) -> bool {
        matches!(self, Self::High | Self::Urgent)
    }
}

impl Default for RequestPriority {
    fn default() -> Self {
        Self::Medium
    }
}

impl RequestStatus {
    #[must_use]
    pub fn label(&self) -> String {
        capitalize(self.as_str())
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }

    /// Only an open request may move, and only to a terminal status.
    #[must_use]
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        !self.is_terminal() && next.is_terminal()
    }
}

/// A hospital's request for units of one blood type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodRequest {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub blood_type: BloodType,
    pub units_needed: u32,
    pub units_fulfilled: u32,
    pub priority: RequestPriority,
    pub status: RequestStatus,
    pub reason: Option<String>,
    pub needed_by: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BloodRequest {
    /// Open a new request.
    #[must_use]
    pub fn open(
        hospital_id: Uuid,
        blood_type: BloodType,
        units_needed: u32,
        priority: RequestPriority,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            hospital_id,
            blood_type,
            units_needed,
            units_fulfilled: 0,
            priority,
            status: RequestStatus::Open,
            reason: None,
            needed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn units_remaining(&self) -> u32 {
        self.units_needed.saturating_sub(self.units_fulfilled)
    }

    /// Credit donated units; an open request becomes fulfilled once covered.
    pub fn credit(&mut self, units: u32) {
        self.units_fulfilled = self.units_fulfilled.saturating_add(units);
        if !self.status.is_terminal() && self.units_remaining() == 0 {
            self.status = RequestStatus::Fulfilled;
        }
        self.updated_at = Utc::now();
    }
}
