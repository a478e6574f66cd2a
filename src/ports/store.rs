//! Store port: Trait for the persistence access layer.
//!
//! A pass-through boundary to the relational store: one create/read/update/
//! upsert per entity, no caching and no application-coordinated
//! transactions. Uniqueness (one donor and one hospital per user, one
//! inventory row per hospital and blood type, unique licence numbers) is
//! enforced by the backend and surfaces as an error.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{
    BloodInventory, BloodRequest, BloodType, Donation, Donor, Hospital, Notification,
    RequestStatus, User,
};

/// Trait for persistent storage operations.
pub trait Store: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    // ----- users -----

    /// Insert or replace a user by id.
    ///
    /// # Errors
    /// Returns error if the email belongs to another user or storage fails.
    fn upsert_user(&self, user: &User) -> Result<User, Self::Error>;

    fn get_user(&self, id: Uuid) -> Result<Option<User>, Self::Error>;

    // ----- donors -----

    /// Insert a donor or update the existing donor for the same user.
    ///
    /// The stored row keeps its original id when updating.
    ///
    /// # Errors
    /// Returns error if the user does not exist or storage fails.
    fn upsert_donor(&self, donor: &Donor) -> Result<Donor, Self::Error>;

    fn get_donor(&self, id: Uuid) -> Result<Option<Donor>, Self::Error>;

    fn get_donor_by_user(&self, user_id: Uuid) -> Result<Option<Donor>, Self::Error>;

    /// Active donors of exactly `blood_type` whose window is open on `today`,
    /// optionally filtered by a case-insensitive city substring, soonest
    /// eligible first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn search_eligible_donors(
        &self,
        blood_type: BloodType,
        today: NaiveDate,
        city: Option<&str>,
    ) -> Result<Vec<Donor>, Self::Error>;

    /// Active donors whose window reopens exactly on `date`.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn donors_eligible_on(&self, date: NaiveDate) -> Result<Vec<Donor>, Self::Error>;

    // ----- hospitals -----

    /// Insert a hospital or update the existing hospital for the same user.
    ///
    /// # Errors
    /// Returns error if the licence number is taken or storage fails.
    fn upsert_hospital(&self, hospital: &Hospital) -> Result<Hospital, Self::Error>;

    fn get_hospital(&self, id: Uuid) -> Result<Option<Hospital>, Self::Error>;

    fn get_hospital_by_user(&self, user_id: Uuid) -> Result<Option<Hospital>, Self::Error>;

    /// Verified hospitals ordered by name.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn verified_hospitals(&self) -> Result<Vec<Hospital>, Self::Error>;

    // ----- inventory -----

    /// A hospital's stock rows in canonical blood-type order.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn hospital_inventory(&self, hospital_id: Uuid) -> Result<Vec<BloodInventory>, Self::Error>;

    fn get_inventory(
        &self,
        hospital_id: Uuid,
        blood_type: BloodType,
    ) -> Result<Option<BloodInventory>, Self::Error>;

    /// Insert or update the row for `(hospital_id, blood_type)`.
    ///
    /// # Errors
    /// Returns error if the hospital does not exist or storage fails.
    fn upsert_inventory(&self, row: &BloodInventory) -> Result<BloodInventory, Self::Error>;

    /// Upsert several rows; returns them as stored.
    ///
    /// # Errors
    /// Returns error on the first row that fails.
    fn upsert_inventory_batch(
        &self,
        rows: &[BloodInventory],
    ) -> Result<Vec<BloodInventory>, Self::Error>;

    // ----- requests -----

    /// # Errors
    /// Returns error if the hospital does not exist or storage fails.
    fn create_request(&self, request: &BloodRequest) -> Result<BloodRequest, Self::Error>;

    fn get_request(&self, id: Uuid) -> Result<Option<BloodRequest>, Self::Error>;

    /// Overwrite a request's mutable fields.
    ///
    /// # Errors
    /// Returns a not-found error if the request does not exist.
    fn update_request(&self, request: &BloodRequest) -> Result<BloodRequest, Self::Error>;

    /// A hospital's requests, newest first, optionally filtered by status.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn hospital_requests(
        &self,
        hospital_id: Uuid,
        status: Option<RequestStatus>,
    ) -> Result<Vec<BloodRequest>, Self::Error>;

    /// Open requests across all hospitals, most urgent then newest first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn active_requests(&self) -> Result<Vec<BloodRequest>, Self::Error>;

    // ----- donations -----

    /// # Errors
    /// Returns error if a referenced donor, hospital or request is missing.
    fn record_donation(&self, donation: &Donation) -> Result<Donation, Self::Error>;

    /// Most recent donations received by a hospital, up to `limit`.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn hospital_donations(&self, hospital_id: Uuid, limit: usize) -> Result<Vec<Donation>, Self::Error>;

    /// Donations received by a hospital on or after `since`.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn hospital_donations_since(
        &self,
        hospital_id: Uuid,
        since: NaiveDate,
    ) -> Result<Vec<Donation>, Self::Error>;

    /// A donor's history, newest first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn donor_donations(&self, donor_id: Uuid) -> Result<Vec<Donation>, Self::Error>;

    // ----- notifications -----

    /// Insert notifications; returns how many were stored.
    ///
    /// # Errors
    /// Returns error if a recipient does not exist or storage fails.
    fn create_notifications(&self, notifications: &[Notification]) -> Result<usize, Self::Error>;

    /// A user's notifications, newest first.
    ///
    /// # Errors
    /// Returns error if storage operation fails.
    fn user_notifications(&self, user_id: Uuid, unread_only: bool) -> Result<Vec<Notification>, Self::Error>;

    /// # Errors
    /// Returns a not-found error if the notification does not exist.
    fn mark_notification_read(&self, id: Uuid) -> Result<Notification, Self::Error>;
}
