//! Per-hospital blood stock.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BloodType;

/// Stock of one blood type at one hospital. Unique per `(hospital_id, blood_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodInventory {
    pub id: Uuid,
    pub hospital_id: Uuid,
    pub blood_type: BloodType,
    pub units_available: u32,
    pub units_reserved: u32,
    pub expiry_date: Option<NaiveDate>,
    pub last_updated: DateTime<Utc>,
}

impl BloodInventory {
    /// An empty stock row.
    #[must_use]
    pub fn empty(hospital_id: Uuid, blood_type: BloodType) -> Self {
        Self {
            id: Uuid::new_v4(),
            hospital_id,
            blood_type,
            units_available: 0,
            units_reserved: 0,
            expiry_date: None,
            last_updated: Utc::now(),
        }
    }

    /// Apply a partial update and stamp `last_updated`.
    pub fn apply(&mut self, update: &InventoryUpdate) {
        if let Some(units) = update.units_available {
            self.units_available = units;
        }
        if let Some(units) = update.units_reserved {
            self.units_reserved = units;
        }
        if let Some(expiry) = update.expiry_date {
            self.expiry_date = Some(expiry);
        }
        self.last_updated = Utc::now();
    }

    /// Units available and not reserved.
    #[must_use]
    pub fn units_free(&self) -> u32 {
        self.units_available.saturating_sub(self.units_reserved)
    }

    #[must_use]
    pub fn level(&self, thresholds: &InventoryThresholds) -> InventoryLevel {
        thresholds.classify(self.units_available)
    }

    #[must_use]
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < today)
    }
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUpdate {
    pub units_available: Option<u32>,
    pub units_reserved: Option<u32>,
    pub expiry_date: Option<NaiveDate>,
}

/// Stock health, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InventoryLevel {
    Critical,
    Low,
    Good,
}

impl std::fmt::Display for InventoryLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "Critical"),
            Self::Low => write!(f, "Low"),
            Self::Good => write!(f, "Good"),
        }
    }
}

/// Unit counts below which stock is Low or Critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryThresholds {
    pub low_below: u32,
    pub critical_below: u32,
}

impl Default for InventoryThresholds {
    fn default() -> Self {
        Self {
            low_below: 20,
            critical_below: 5,
        }
    }
}

impl InventoryThresholds {
    #[must_use]
    pub fn classify(&self, units_available: u32) -> InventoryLevel {
        if units_available < self.critical_below {
            InventoryLevel::Critical
        } else if units_available < self.low_below {
            InventoryLevel::Low
        } else {
            InventoryLevel::Good
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_partial_update() {
        let mut row = BloodInventory::empty(Uuid::new_v4(), BloodType::ONeg);
        row.apply(&InventoryUpdate {
            units_available: Some(12),
            ..Default::default()
        });
        assert_eq!(row.units_available, 12);
        assert_eq!(row.units_reserved, 0);

        row.apply(&InventoryUpdate {
            units_reserved: Some(15),
            ..Default::default()
        });
        assert_eq!(row.units_available, 12);
        assert_eq!(row.units_free(), 0);
    }

    #[test]
    fn test_level_classification() {
        let t = InventoryThresholds::default();
        assert_eq!(t.classify(0), InventoryLevel::Critical);
        assert_eq!(t.classify(4), InventoryLevel::Critical);
        assert_eq!(t.classify(5), InventoryLevel::Low);
        assert_eq!(t.classify(19), InventoryLevel::Low);
        assert_eq!(t.classify(20), InventoryLevel::Good);
        assert!(InventoryLevel::Critical < InventoryLevel::Low);
    }

    #[test]
    fn test_expiry() {
        let mut row = BloodInventory::empty(Uuid::new_v4(), BloodType::APos);
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date");
        assert!(!row.is_expired_on(today));
        row.expiry_date = NaiveDate::from_ymd_opt(2024, 2, 28);
        assert!(row.is_expired_on(today));
    }
}
