//! Donor service: registration, eligibility status and donor search.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::storage;
use crate::adapters::StoreError;
use crate::domain::compatibility::compatible_donors;
use crate::domain::eligibility::{annual_donation_limit_reached, validate_donor_eligibility_on};
use crate::domain::{
    Address, BloodType, Donation, Donor, EmergencyContact, Notification, Sex, UserRole,
};
use crate::ports::Store;
use crate::{LifeflowError, Result};

/// Profile data submitted when a donor signs up or edits their profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonorRegistration {
    pub user_id: Uuid,
    pub blood_type: BloodType,
    pub date_of_birth: NaiveDate,
    pub weight_kg: f64,
    #[serde(default)]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub last_donation_date: Option<NaiveDate>,
    #[serde(default)]
    pub medical_conditions: BTreeSet<String>,
    #[serde(default)]
    pub emergency_contact: Option<EmergencyContact>,
    #[serde(default)]
    pub address: Address,
}

/// A donor's current standing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonorEligibility {
    pub donor_id: Uuid,
    pub blood_type: BloodType,
    pub is_eligible: bool,
    pub next_eligible_date: NaiveDate,
    pub days_until_eligible: i64,
    pub annual_limit_reached: bool,
}

/// Service for donor-facing use cases.
pub struct DonorService<S: Store> {
    store: Arc<S>,
}

impl<S> DonorService<S>
where
    S: Store,
    S::Error: Into<StoreError>,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create or replace the donor profile of a donor account.
    ///
    /// The age/weight screen runs first; the next eligible date is derived
    /// from the last donation as of `today`. For an existing profile the
    /// last donation is the latest of the submitted date, the stored date
    /// and any recorded donation.
    ///
    /// # Errors
    /// `NotFound` for an unknown user, `Validation` if the account is not a
    /// donor, `Ineligible` with every failed rule, or a storage error.
    pub fn register(&self, registration: DonorRegistration, today: NaiveDate) -> Result<Donor> {
        let user = self
            .store
            .get_user(registration.user_id)
            .map_err(storage)?
            .ok_or_else(|| LifeflowError::NotFound(format!("user {}", registration.user_id)))?;
        if user.role != UserRole::Donor {
            return Err(LifeflowError::Validation(format!(
                "{} accounts cannot hold a donor profile",
                user.role
            )));
        }

        let report = validate_donor_eligibility_on(
            registration.date_of_birth,
            registration.weight_kg,
            today,
        );
        if !report.is_eligible {
            tracing::warn!(reasons = ?report.reasons, "Donor registration rejected");
            return Err(LifeflowError::Ineligible(report.reasons));
        }

        let existing = self.store.get_donor_by_user(user.id).map_err(storage)?;
        let mut last_donation = registration.last_donation_date;
        if let Some(existing) = &existing {
            // A profile edit must not reopen the donation window.
            let recorded = self
                .store
                .donor_donations(existing.id)
                .map_err(storage)?
                .iter()
                .map(|d| d.donation_date)
                .max();
            last_donation = last_donation.max(existing.last_donation_date).max(recorded);
        }

        let mut donor = Donor::new(
            user.id,
            registration.blood_type,
            registration.date_of_birth,
            registration.weight_kg,
            last_donation,
            today,
        );
        if let Some(existing) = existing {
            donor.id = existing.id;
            donor.created_at = existing.created_at;
            donor.is_active = existing.is_active;
        }
        donor.sex = registration.sex;
        donor.medical_conditions = registration.medical_conditions;
        donor.emergency_contact = registration.emergency_contact;
        donor.address = registration.address;

        let stored = self.store.upsert_donor(&donor).map_err(storage)?;
        tracing::info!(
            donor_id = %stored.id,
            blood_type = %stored.blood_type,
            next_eligible_date = %stored.next_eligible_date,
            "Registered donor"
        );
        Ok(stored)
    }

    /// # Errors
    /// Returns error if the store fails.
    pub fn profile(&self, user_id: Uuid) -> Result<Option<Donor>> {
        self.store.get_donor_by_user(user_id).map_err(storage)
    }

    /// Whether the donor can give on `today`, and if not, when.
    ///
    /// # Errors
    /// `NotFound` if the user has no donor profile.
    pub fn eligibility_status(&self, user_id: Uuid, today: NaiveDate) -> Result<DonorEligibility> {
        let donor = self.require_donor(user_id)?;
        let dates: Vec<NaiveDate> = self
            .store
            .donor_donations(donor.id)
            .map_err(storage)?
            .iter()
            .map(|d| d.donation_date)
            .collect();
        let annual_limit_reached = annual_donation_limit_reached(&dates, today);

        Ok(DonorEligibility {
            donor_id: donor.id,
            blood_type: donor.blood_type,
            is_eligible: donor.is_eligible_on(today) && !annual_limit_reached,
            next_eligible_date: donor.next_eligible_date,
            days_until_eligible: donor.days_until_eligible(today),
            annual_limit_reached,
        })
    }

    /// Past donations, newest first.
    ///
    /// # Errors
    /// `NotFound` if the user has no donor profile.
    pub fn donation_history(&self, user_id: Uuid) -> Result<Vec<Donation>> {
        let donor = self.require_donor(user_id)?;
        self.store.donor_donations(donor.id).map_err(storage)
    }

    /// Active donors of exactly `blood_type` who can give on `today`,
    /// soonest-eligible first.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub fn eligible_donors(
        &self,
        blood_type: BloodType,
        city: Option<&str>,
        today: NaiveDate,
    ) -> Result<Vec<Donor>> {
        let donors = self
            .store
            .search_eligible_donors(blood_type, today, city)
            .map_err(storage)?;
        tracing::debug!(blood_type = %blood_type, count = donors.len(), "Searched eligible donors");
        Ok(donors)
    }

    /// Eligible donors of every type a `recipient` can receive.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub fn compatible_eligible_donors(
        &self,
        recipient: BloodType,
        city: Option<&str>,
        today: NaiveDate,
    ) -> Result<Vec<Donor>> {
        let mut donors = Vec::new();
        for donor_type in compatible_donors(recipient) {
            donors.extend(self.eligible_donors(*donor_type, city, today)?);
        }
        donors.sort_by_key(|d| d.next_eligible_date);
        Ok(donors)
    }

    /// # Errors
    /// Returns error if the store fails.
    pub fn notifications(&self, user_id: Uuid, unread_only: bool) -> Result<Vec<Notification>> {
        self.store
            .user_notifications(user_id, unread_only)
            .map_err(storage)
    }

    /// # Errors
    /// `Store(NotFound)` for an unknown notification.
    pub fn mark_notification_read(&self, notification_id: Uuid) -> Result<Notification> {
        self.store
            .mark_notification_read(notification_id)
            .map_err(storage)
    }

    fn require_donor(&self, user_id: Uuid) -> Result<Donor> {
        self.store
            .get_donor_by_user(user_id)
            .map_err(storage)?
            .ok_or_else(|| LifeflowError::NotFound(format!("donor profile for user {user_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SqliteStore;
    use crate::domain::User;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn setup() -> (Arc<SqliteStore>, DonorService<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().expect("Should create db"));
        let service = DonorService::new(Arc::clone(&store));
        (store, service)
    }

    fn account(store: &SqliteStore, email: &str, role: UserRole) -> Uuid {
        store
            .upsert_user(&User::new(email, "Someone", role))
            .expect("Should save user")
            .id
    }

    fn registration(user_id: Uuid, blood_type: BloodType) -> DonorRegistration {
        DonorRegistration {
            user_id,
            blood_type,
            date_of_birth: date(1990, 5, 5),
            weight_kg: 72.5,
            sex: Some(Sex::Female),
            last_donation_date: None,
            medical_conditions: BTreeSet::new(),
            emergency_contact: None,
            address: Address {
                city: "Springfield".into(),
                ..Address::default()
            },
        }
    }

    #[test]
    fn test_register_derives_next_date() {
        let (store, service) = setup();
        let user_id = account(&store, "d@example.org", UserRole::Donor);
        let mut reg = registration(user_id, BloodType::OPos);
        reg.last_donation_date = Some(date(2024, 1, 1));

        let donor = service.register(reg, date(2024, 1, 10)).expect("Should register");
        assert_eq!(donor.next_eligible_date, date(2024, 2, 26));
        assert!(donor.is_active);
    }

    #[test]
    fn test_register_rejects_ineligible_with_all_reasons() {
        let (store, service) = setup();
        let user_id = account(&store, "kid@example.org", UserRole::Donor);
        let mut reg = registration(user_id, BloodType::APos);
        reg.date_of_birth = date(2015, 1, 1);
        reg.weight_kg = 30.0;

        match service.register(reg, date(2024, 6, 1)) {
            Err(LifeflowError::Ineligible(reasons)) => assert_eq!(reasons.len(), 2),
            other => panic!("expected Ineligible, got {other:?}"),
        }
        assert!(store.get_donor_by_user(user_id).expect("Should load").is_none());
    }

    #[test]
    fn test_register_requires_donor_account() {
        let (store, service) = setup();
        let user_id = account(&store, "h@example.org", UserRole::Hospital);
        let err = service
            .register(registration(user_id, BloodType::APos), date(2024, 6, 1))
            .expect_err("Should refuse");
        assert!(matches!(err, LifeflowError::Validation(_)));

        let err = service
            .register(registration(Uuid::new_v4(), BloodType::APos), date(2024, 6, 1))
            .expect_err("Should refuse");
        assert!(matches!(err, LifeflowError::NotFound(_)));
    }

    #[test]
    fn test_reregistering_keeps_donor_id() {
        let (store, service) = setup();
        let user_id = account(&store, "d@example.org", UserRole::Donor);
        let first = service
            .register(registration(user_id, BloodType::BPos), date(2024, 6, 1))
            .expect("Should register");
        let second = service
            .register(registration(user_id, BloodType::BNeg), date(2024, 6, 2))
            .expect("Should update");
        assert_eq!(first.id, second.id);
        assert_eq!(second.blood_type, BloodType::BNeg);
    }

    #[test]
    fn test_reregistering_keeps_last_donation() {
        let (store, service) = setup();
        let user_id = account(&store, "d@example.org", UserRole::Donor);
        let mut reg = registration(user_id, BloodType::OPos);
        reg.last_donation_date = Some(date(2024, 6, 1));
        service.register(reg, date(2024, 6, 1)).expect("Should register");

        let edited = service
            .register(registration(user_id, BloodType::OPos), date(2024, 6, 2))
            .expect("Should update");
        assert_eq!(edited.last_donation_date, Some(date(2024, 6, 1)));
        assert_eq!(edited.next_eligible_date, date(2024, 7, 27));
        assert!(!edited.is_eligible_on(date(2024, 6, 2)));
    }

    #[test]
    fn test_eligibility_status_counts_down() {
        let (store, service) = setup();
        let user_id = account(&store, "d@example.org", UserRole::Donor);
        let mut reg = registration(user_id, BloodType::OPos);
        reg.last_donation_date = Some(date(2024, 1, 1));
        service.register(reg, date(2024, 1, 1)).expect("Should register");

        let status = service
            .eligibility_status(user_id, date(2024, 2, 16))
            .expect("Should compute");
        assert!(!status.is_eligible);
        assert_eq!(status.days_until_eligible, 10);

        let status = service
            .eligibility_status(user_id, date(2024, 2, 26))
            .expect("Should compute");
        assert!(status.is_eligible);
        assert_eq!(status.days_until_eligible, 0);
        assert!(!status.annual_limit_reached);
    }

    #[test]
    fn test_compatible_search_spans_donor_types() {
        let (store, service) = setup();
        for (email, bt) in [
            ("an@example.org", BloodType::ANeg),
            ("on@example.org", BloodType::ONeg),
            ("ap@example.org", BloodType::APos),
        ] {
            let user_id = account(&store, email, UserRole::Donor);
            service
                .register(registration(user_id, bt), date(2024, 6, 1))
                .expect("Should register");
        }

        let today = date(2024, 6, 1);
        assert_eq!(service.eligible_donors(BloodType::ANeg, None, today).expect("Should search").len(), 1);

        let compatible = service
            .compatible_eligible_donors(BloodType::ANeg, Some("springfield"), today)
            .expect("Should search");
        let types: BTreeSet<_> = compatible.iter().map(|d| d.blood_type).collect();
        assert_eq!(types, [BloodType::ANeg, BloodType::ONeg].into_iter().collect());
    }

    #[test]
    fn test_history_requires_profile() {
        let (store, service) = setup();
        let user_id = account(&store, "d@example.org", UserRole::Donor);
        assert!(matches!(
            service.donation_history(user_id),
            Err(LifeflowError::NotFound(_))
        ));
    }
}
