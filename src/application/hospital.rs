//! Hospital service: registration, inventory, requests and donations.
//!
//! Recording a donation touches several records: the donation itself, the
//! donor's eligibility window, the request it answers (if any), the
//! hospital's stock of the donor's type, and a confirmation to the donor.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::notifications::NotificationService;
use super::storage;
use crate::adapters::StoreError;
use crate::domain::compatibility::can_receive_from;
use crate::domain::eligibility::{
    annual_donation_limit_reached, hemoglobin_sufficient, minimum_hemoglobin,
    validate_donor_eligibility_on, MAX_DONATIONS_PER_YEAR,
};
use crate::domain::{
    Address, BloodInventory, BloodRequest, BloodType, Donation, Donor, Hospital, InventoryLevel,
    InventoryThresholds, InventoryUpdate, Notification, NotificationType, RequestPriority,
    RequestStatus, UserRole, Vitals,
};
use crate::ports::Store;
use crate::{LifeflowError, Result};

/// Default trailing window for [`HospitalService::stats`].
pub const DEFAULT_STATS_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HospitalRegistration {
    pub user_id: Uuid,
    pub name: String,
    pub license_number: String,
    pub address: Address,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub capacity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBloodRequest {
    pub hospital_id: Uuid,
    pub blood_type: BloodType,
    pub units_needed: u32,
    #[serde(default)]
    pub priority: RequestPriority,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub needed_by: Option<DateTime<Utc>>,
}

/// A donation as entered at the hospital; it is dated on the day recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDonation {
    pub donor_id: Uuid,
    pub hospital_id: Uuid,
    #[serde(default)]
    pub blood_request_id: Option<Uuid>,
    pub units_donated: u32,
    #[serde(default)]
    pub vitals: Vitals,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Dashboard totals for one hospital.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HospitalStats {
    pub hospital_id: Uuid,
    pub total_units_available: u64,
    pub total_units_reserved: u64,
    /// Available units not held by a reservation
    pub total_units_free: u64,
    pub active_requests: usize,
    /// Units donated within the trailing window
    pub recent_units_donated: u64,
    pub window_days: u32,
    /// Types currently below the low-stock threshold
    pub low_stock: Vec<BloodType>,
    /// Types whose stock is past its expiry date
    pub expired_stock: Vec<BloodType>,
    pub inventory_by_type: Vec<BloodInventory>,
}

/// Service for hospital-side use cases.
pub struct HospitalService<S: Store> {
    store: Arc<S>,
    notifier: NotificationService<S>,
    thresholds: InventoryThresholds,
    stats_window_days: u32,
}

impl<S> HospitalService<S>
where
    S: Store,
    S::Error: Into<StoreError>,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            notifier: NotificationService::new(Arc::clone(&store)),
            store,
            thresholds: InventoryThresholds::default(),
            stats_window_days: DEFAULT_STATS_WINDOW_DAYS,
        }
    }

    #[must_use]
    pub fn with_thresholds(mut self, thresholds: InventoryThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    #[must_use]
    pub fn with_stats_window(mut self, days: u32) -> Self {
        self.stats_window_days = days;
        self
    }

    /// Create or update the hospital profile of a hospital/admin account.
    ///
    /// New hospitals start unverified with a zeroed inventory row for every
    /// blood type. Re-registering keeps the verification flag and stock.
    ///
    /// # Errors
    /// `NotFound` for an unknown user, `Validation` for a donor account,
    /// `Store(Conflict)` for a licence number already in use.
    pub fn register(&self, registration: HospitalRegistration) -> Result<Hospital> {
        let user = self
            .store
            .get_user(registration.user_id)
            .map_err(storage)?
            .ok_or_else(|| LifeflowError::NotFound(format!("user {}", registration.user_id)))?;
        if user.role == UserRole::Donor {
            return Err(LifeflowError::Validation(
                "donor accounts cannot hold a hospital profile".to_string(),
            ));
        }

        let mut hospital = Hospital::new(
            user.id,
            registration.name,
            registration.license_number,
            registration.address,
            registration.phone,
        );
        hospital.email = registration.email;
        hospital.website = registration.website;
        hospital.capacity = registration.capacity;
        if let Some(existing) = self.store.get_hospital_by_user(user.id).map_err(storage)? {
            hospital.id = existing.id;
            hospital.created_at = existing.created_at;
            hospital.is_verified = existing.is_verified;
        }

        let stored = self.store.upsert_hospital(&hospital).map_err(storage)?;

        let stocked: Vec<BloodType> = self
            .store
            .hospital_inventory(stored.id)
            .map_err(storage)?
            .iter()
            .map(|row| row.blood_type)
            .collect();
        let missing: Vec<BloodInventory> = BloodType::ALL
            .iter()
            .filter(|bt| !stocked.contains(bt))
            .map(|bt| BloodInventory::empty(stored.id, *bt))
            .collect();
        if !missing.is_empty() {
            self.store.upsert_inventory_batch(&missing).map_err(storage)?;
        }

        tracing::info!(hospital_id = %stored.id, verified = stored.is_verified, "Registered hospital");
        Ok(stored)
    }

    /// # Errors
    /// `NotFound` for an unknown hospital.
    pub fn set_verified(&self, hospital_id: Uuid, verified: bool) -> Result<Hospital> {
        let mut hospital = self.require_hospital(hospital_id)?;
        hospital.is_verified = verified;
        let stored = self.store.upsert_hospital(&hospital).map_err(storage)?;
        tracing::info!(hospital_id = %hospital_id, verified, "Changed hospital verification");
        Ok(stored)
    }

    /// Verified hospitals by name.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub fn verified_hospitals(&self) -> Result<Vec<Hospital>> {
        self.store.verified_hospitals().map_err(storage)
    }

    /// Stock rows in canonical blood-type order.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub fn inventory(&self, hospital_id: Uuid) -> Result<Vec<BloodInventory>> {
        self.store.hospital_inventory(hospital_id).map_err(storage)
    }

    /// Apply a partial stock update for one type.
    ///
    /// When the update moves the type into a worse Low/Critical level, the
    /// hospital account is sent an `inventory_low` notification.
    ///
    /// # Errors
    /// `NotFound` for an unknown hospital.
    pub fn update_inventory(
        &self,
        hospital_id: Uuid,
        blood_type: BloodType,
        update: InventoryUpdate,
    ) -> Result<BloodInventory> {
        let hospital = self.require_hospital(hospital_id)?;
        let mut row = self
            .store
            .get_inventory(hospital_id, blood_type)
            .map_err(storage)?
            .unwrap_or_else(|| BloodInventory::empty(hospital_id, blood_type));

        let before = row.level(&self.thresholds);
        row.apply(&update);
        let stored = self.store.upsert_inventory(&row).map_err(storage)?;
        let after = stored.level(&self.thresholds);

        tracing::info!(
            hospital_id = %hospital_id,
            blood_type = %blood_type,
            units_available = stored.units_available,
            level = %after,
            "Updated inventory"
        );

        if after < before && after != InventoryLevel::Good {
            let alert = Notification::new(
                hospital.user_id,
                NotificationType::InventoryLow,
                format!("{after} Stock: {blood_type}"),
                format!(
                    "{} unit(s) of {blood_type} available at {}.",
                    stored.units_available, hospital.name
                ),
            )
            .related_to(stored.id);
            self.notifier.notify(&alert)?;
        }
        Ok(stored)
    }

    /// Open a request; high and urgent ones alert compatible eligible donors.
    ///
    /// # Errors
    /// `Validation` when fewer than one unit is requested, `NotFound` for an
    /// unknown hospital.
    pub fn create_request(&self, new: NewBloodRequest, today: NaiveDate) -> Result<BloodRequest> {
        if new.units_needed == 0 {
            return Err(LifeflowError::Validation(
                "a request needs at least one unit".to_string(),
            ));
        }
        let hospital = self.require_hospital(new.hospital_id)?;

        let mut request =
            BloodRequest::open(new.hospital_id, new.blood_type, new.units_needed, new.priority);
        request.reason = new.reason;
        request.needed_by = new.needed_by;
        let stored = self.store.create_request(&request).map_err(storage)?;

        tracing::info!(
            request_id = %stored.id,
            blood_type = %stored.blood_type,
            priority = %stored.priority,
            units_needed = stored.units_needed,
            "Opened blood request"
        );

        if stored.priority.alerts_donors() {
            self.notifier.alert_compatible_donors(&stored, &hospital.name, today)?;
        }
        Ok(stored)
    }

    /// Close an open request.
    ///
    /// # Errors
    /// `Validation` for any transition other than open to fulfilled or
    /// cancelled; `NotFound` for an unknown request.
    pub fn update_request_status(&self, request_id: Uuid, status: RequestStatus) -> Result<BloodRequest> {
        let mut request = self.require_request(request_id)?;
        if !request.status.can_transition_to(status) {
            return Err(LifeflowError::Validation(format!(
                "cannot move a {} request to {}",
                request.status, status
            )));
        }
        request.status = status;
        let stored = self.store.update_request(&request).map_err(storage)?;
        tracing::info!(request_id = %request_id, status = %status, "Updated request status");
        Ok(stored)
    }

    /// # Errors
    /// Returns error if the store fails.
    pub fn requests(&self, hospital_id: Uuid, status: Option<RequestStatus>) -> Result<Vec<BloodRequest>> {
        self.store.hospital_requests(hospital_id, status).map_err(storage)
    }

    /// Open requests across hospitals, most urgent first.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub fn active_requests(&self) -> Result<Vec<BloodRequest>> {
        self.store.active_requests().map_err(storage)
    }

    /// Record a donation dated `today`.
    ///
    /// The donor must be active, past their interval, under the yearly cap
    /// and (when measured) above the hemoglobin minimum for their sex.
    ///
    /// # Errors
    /// `Ineligible` when a screen fails, `Validation` for a bad request
    /// reference or zero units, `NotFound` for unknown records.
    pub fn record_donation(&self, entry: RecordDonation, today: NaiveDate) -> Result<Donation> {
        if entry.units_donated == 0 {
            return Err(LifeflowError::Validation(
                "a donation must be at least one unit".to_string(),
            ));
        }
        self.require_hospital(entry.hospital_id)?;
        let mut donor = self
            .store
            .get_donor(entry.donor_id)
            .map_err(storage)?
            .ok_or_else(|| LifeflowError::NotFound(format!("donor {}", entry.donor_id)))?;

        self.screen_donor(&donor, &entry.vitals, today)?;

        let request = match entry.blood_request_id {
            Some(id) => Some(self.matching_request(id, &entry, &donor)?),
            None => None,
        };

        let mut donation = Donation::new(
            donor.id,
            entry.hospital_id,
            donor.blood_type,
            today,
            entry.units_donated,
        );
        donation.blood_request_id = entry.blood_request_id;
        donation.vitals = entry.vitals;
        donation.notes = entry.notes;
        let stored = self.store.record_donation(&donation).map_err(storage)?;

        donor.set_last_donation(today);
        let donor = self.store.upsert_donor(&donor).map_err(storage)?;

        if let Some(mut request) = request {
            request.credit(entry.units_donated);
            self.store.update_request(&request).map_err(storage)?;
        }

        let mut stock = self
            .store
            .get_inventory(entry.hospital_id, donor.blood_type)
            .map_err(storage)?
            .unwrap_or_else(|| BloodInventory::empty(entry.hospital_id, donor.blood_type));
        stock.apply(&InventoryUpdate {
            units_available: Some(stock.units_available.saturating_add(entry.units_donated)),
            ..InventoryUpdate::default()
        });
        self.store.upsert_inventory(&stock).map_err(storage)?;

        let thanks = Notification::new(
            donor.user_id,
            NotificationType::DonationConfirmation,
            "Thank You for Donating",
            format!(
                "Your donation of {} unit(s) was recorded. You can donate again from {}.",
                entry.units_donated, donor.next_eligible_date
            ),
        )
        .related_to(stored.id);
        self.notifier.notify(&thanks)?;

        tracing::info!(
            donation_id = %stored.id,
            blood_type = %stored.blood_type,
            units = stored.units_donated,
            "Recorded donation"
        );
        Ok(stored)
    }

    /// Most recent donations at a hospital.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub fn donations(&self, hospital_id: Uuid, limit: usize) -> Result<Vec<Donation>> {
        self.store.hospital_donations(hospital_id, limit).map_err(storage)
    }

    /// # Errors
    /// `NotFound` for an unknown hospital.
    pub fn stats(&self, hospital_id: Uuid, today: NaiveDate) -> Result<HospitalStats> {
        self.require_hospital(hospital_id)?;
        let inventory = self.store.hospital_inventory(hospital_id).map_err(storage)?;
        let active = self
            .store
            .hospital_requests(hospital_id, Some(RequestStatus::Open))
            .map_err(storage)?;
        let since = today
            .checked_sub_days(Days::new(u64::from(self.stats_window_days)))
            .unwrap_or(NaiveDate::MIN);
        let recent = self
            .store
            .hospital_donations_since(hospital_id, since)
            .map_err(storage)?;

        let low_stock = inventory
            .iter()
            .filter(|row| row.level(&self.thresholds) != InventoryLevel::Good)
            .map(|row| row.blood_type)
            .collect();
        let expired_stock = inventory
            .iter()
            .filter(|row| row.is_expired_on(today))
            .map(|row| row.blood_type)
            .collect();
        let total = |units: fn(&BloodInventory) -> u32| -> u64 {
            inventory.iter().map(|row| u64::from(units(row))).sum()
        };

        Ok(HospitalStats {
            hospital_id,
            total_units_available: total(|r| r.units_available),
            total_units_reserved: total(|r| r.units_reserved),
            total_units_free: total(BloodInventory::units_free),
            active_requests: active.len(),
            recent_units_donated: recent.iter().map(|d| u64::from(d.units_donated)).sum(),
            window_days: self.stats_window_days,
            low_stock,
            expired_stock,
            inventory_by_type: inventory,
        })
    }

    fn screen_donor(&self, donor: &Donor, vitals: &Vitals, today: NaiveDate) -> Result<()> {
        // Age and weight are rechecked here since both drift after registration.
        let mut reasons =
            validate_donor_eligibility_on(donor.date_of_birth, donor.weight_kg, today).reasons;
        if !donor.is_active {
            reasons.push("Donor profile is inactive".to_string());
        } else if !donor.is_eligible_on(today) {
            reasons.push(format!("Next eligible on {}", donor.next_eligible_date));
        }

        if let Some(level) = vitals.hemoglobin_level {
            if !hemoglobin_sufficient(level, donor.sex) {
                reasons.push(format!(
                    "Hemoglobin {level} g/dL is below the {} g/dL minimum",
                    minimum_hemoglobin(donor.sex)
                ));
            }
        }

        let dates: Vec<NaiveDate> = self
            .store
            .donor_donations(donor.id)
            .map_err(storage)?
            .iter()
            .map(|d| d.donation_date)
            .collect();
        if annual_donation_limit_reached(&dates, today) {
            reasons.push(format!("At most {MAX_DONATIONS_PER_YEAR} donations per year"));
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            tracing::warn!(
                donor_id = %donor.id,
                age = donor.age_on(today),
                reasons = ?reasons,
                "Donation refused"
            );
            Err(LifeflowError::Ineligible(reasons))
        }
    }

    fn matching_request(&self, id: Uuid, entry: &RecordDonation, donor: &Donor) -> Result<BloodRequest> {
        let request = self.require_request(id)?;
        if request.hospital_id != entry.hospital_id {
            return Err(LifeflowError::Validation(
                "request belongs to another hospital".to_string(),
            ));
        }
        if request.status != RequestStatus::Open {
            return Err(LifeflowError::Validation(format!(
                "request is {}",
                request.status
            )));
        }
        if !can_receive_from(request.blood_type, donor.blood_type) {
            return Err(LifeflowError::Validation(format!(
                "{} blood cannot fill a {} request",
                donor.blood_type, request.blood_type
            )));
        }
        Ok(request)
    }

    fn require_hospital(&self, id: Uuid) -> Result<Hospital> {
        self.store
            .get_hospital(id)
            .map_err(storage)?
            .ok_or_else(|| LifeflowError::NotFound(format!("hospital {id}")))
    }

    fn require_request(&self, id: Uuid) -> Result<BloodRequest> {
        self.store
            .get_request(id)
            .map_err(storage)?
            .ok_or_else(|| LifeflowError::NotFound(format!("blood request {id}")))
    }
}
