//! Donor profiles.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::eligibility;
use super::token::token_enum;
use super::BloodType;

token_enum! {
    /// Biological sex, used only for hemoglobin thresholds.
    pub enum Sex("sex") {
        Female => "female",
        Male => "male",
    }
}

/// Postal address shared by donors and hospitals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
}

/// Donor profile, one-to-one with a [`super::User`].
///
/// `next_eligible_date` is derived from `last_donation_date`; use
/// [`Donor::set_last_donation`] rather than writing either field directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub blood_type: BloodType,
    pub date_of_birth: NaiveDate,
    pub weight_kg: f64,
    pub sex: Option<Sex>,
    pub last_donation_date: Option<NaiveDate>,
    pub next_eligible_date: NaiveDate,
    pub medical_conditions: BTreeSet<String>,
    pub emergency_contact: Option<EmergencyContact>,
    pub address: Address,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Donor {
    /// Create an active donor; the next eligible date is derived as of `today`.
    #[must_use]
    pub fn new(
        user_id: Uuid,
        blood_type: BloodType,
        date_of_birth: NaiveDate,
        weight_kg: f64,
        last_donation_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            blood_type,
            date_of_birth,
            weight_kg,
            sex: None,
            last_donation_date,
            next_eligible_date: eligibility::next_eligible_date_on(last_donation_date, today),
            medical_conditions: BTreeSet::new(),
            emergency_contact: None,
            address: Address::default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a donation on `date` and roll the eligibility window forward.
    pub fn set_last_donation(&mut self, date: NaiveDate) {
        self.last_donation_date = Some(date);
        self.next_eligible_date = eligibility::next_eligible_date_on(Some(date), date);
        self.updated_at = Utc::now();
    }

    #[must_use]
    pub fn age_on(&self, today: NaiveDate) -> i32 {
        eligibility::calculate_age(self.date_of_birth, today)
    }

    #[must_use]
    pub fn is_eligible_on(&self, today: NaiveDate) -> bool {
        eligibility::is_eligible_to_donate_now(today, self.next_eligible_date, self.is_active)
    }

    /// Whole days until the window reopens; zero when already open.
    #[must_use]
    pub fn days_until_eligible(&self, today: NaiveDate) -> i64 {
        (self.next_eligible_date - today).num_days().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn donor(last: Option<NaiveDate>, today: NaiveDate) -> Donor {
        Donor::new(Uuid::new_v4(), BloodType::OPos, date(1990, 1, 1), 72.0, last, today)
    }

    #[test]
    fn test_new_donor_without_history_is_eligible() {
        let today = date(2024, 5, 1);
        let d = donor(None, today);
        assert_eq!(d.next_eligible_date, today);
        assert!(d.is_eligible_on(today));
        assert_eq!(d.days_until_eligible(today), 0);
    }

    #[test]
    fn test_set_last_donation_rolls_window() {
        let today = date(2024, 1, 1);
        let mut d = donor(None, today);
        d.set_last_donation(today);
        assert_eq!(d.next_eligible_date, date(2024, 2, 26));
        assert!(!d.is_eligible_on(date(2024, 2, 1)));
        assert_eq!(d.days_until_eligible(date(2024, 2, 1)), 25);
    }

    #[test]
    fn test_inactive_donor_is_never_eligible() {
        let today = date(2024, 5, 1);
        let mut d = donor(None, today);
        d.is_active = false;
        assert!(!d.is_eligible_on(today));
    }

    #[test]
    fn test_age_on() {
        let d = donor(None, date(2024, 5, 1));
        assert_eq!(d.age_on(date(2024, 5, 1)), 34);
    }
}
