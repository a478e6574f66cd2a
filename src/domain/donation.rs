//! Completed donations.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BloodType;

/// Vitals taken at the donation chair. All optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    /// g/dL
    pub hemoglobin_level: Option<f64>,
    pub blood_pressure_systolic: Option<u32>,
    pub blood_pressure_diastolic: Option<u32>,
}

/// A donation by a donor at a hospital, optionally against a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    pub id: Uuid,
    pub donor_id: Uuid,
    pub hospital_id: Uuid,
    pub blood_request_id: Option<Uuid>,
    pub donation_date: NaiveDate,
    pub units_donated: u32,
    pub blood_type: BloodType,
    pub vitals: Vitals,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Donation {
    #[must_use]
    pub fn new(
        donor_id: Uuid,
        hospital_id: Uuid,
        blood_type: BloodType,
        donation_date: NaiveDate,
        units_donated: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            donor_id,
            hospital_id,
            blood_request_id: None,
            donation_date,
            units_donated,
            blood_type,
            vitals: Vitals::default(),
            notes: None,
            created_at: Utc::now(),
        }
    }
}
