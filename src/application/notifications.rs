//! Notification service: fan-out of donor alerts and reminders.

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use super::storage;
use crate::adapters::StoreError;
use crate::domain::compatibility::compatible_donors;
use crate::domain::{BloodRequest, BloodType, Notification, NotificationType};
use crate::ports::Store;
use crate::Result;

/// Service creating in-app notifications.
pub struct NotificationService<S: Store> {
    store: Arc<S>,
}

impl<S> NotificationService<S>
where
    S: Store,
    S::Error: Into<StoreError>,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Alert every donor of exactly `blood_type` who can give today.
    ///
    /// Returns the number of notifications created.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub fn notify_eligible_donors(
        &self,
        blood_type: BloodType,
        hospital_id: Uuid,
        message: &str,
        today: NaiveDate,
    ) -> Result<usize> {
        let donors = self
            .store
            .search_eligible_donors(blood_type, today, None)
            .map_err(storage)?;

        let batch: Vec<Notification> = donors
            .iter()
            .map(|donor| {
                Notification::new(
                    donor.user_id,
                    NotificationType::UrgentRequest,
                    urgent_title(blood_type),
                    message,
                )
                .related_to(hospital_id)
            })
            .collect();

        let sent = self.send(&batch)?;
        tracing::info!(blood_type = %blood_type, notified = sent, "Notified eligible donors");
        Ok(sent)
    }

    /// Alert every eligible donor whose type the request can accept.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub fn alert_compatible_donors(
        &self,
        request: &BloodRequest,
        hospital_name: &str,
        today: NaiveDate,
    ) -> Result<usize> {
        let message = format!(
            "[{}] {hospital_name} needs {} unit(s) of {} blood. Please donate if you can.",
            request.priority.label(),
            request.units_remaining(),
            request.blood_type
        );

        let mut batch = Vec::new();
        for donor_type in compatible_donors(request.blood_type) {
            let donors = self
                .store
                .search_eligible_donors(*donor_type, today, None)
                .map_err(storage)?;
            batch.extend(donors.iter().map(|donor| {
                Notification::new(
                    donor.user_id,
                    NotificationType::UrgentRequest,
                    urgent_title(request.blood_type),
                    message.as_str(),
                )
                .related_to(request.id)
            }));
        }

        let sent = self.send(&batch)?;
        tracing::info!(
            blood_type = %request.blood_type,
            priority = %request.priority,
            notified = sent,
            "Alerted compatible donors"
        );
        Ok(sent)
    }

    /// Remind donors whose donation window reopens on `today`.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub fn send_eligibility_reminders(&self, today: NaiveDate) -> Result<usize> {
        let donors = self.store.donors_eligible_on(today).map_err(storage)?;
        let batch: Vec<Notification> = donors
            .iter()
            .map(|donor| {
                Notification::new(
                    donor.user_id,
                    NotificationType::EligibilityReminder,
                    "You Can Donate Again",
                    format!(
                        "As of {today} you are eligible to donate {} blood again.",
                        donor.blood_type
                    ),
                )
                .related_to(donor.id)
            })
            .collect();

        let sent = self.send(&batch)?;
        tracing::info!(%today, reminded = sent, "Sent eligibility reminders");
        Ok(sent)
    }

    /// Deliver a single notification.
    ///
    /// # Errors
    /// Returns error if the store fails.
    pub fn notify(&self, notification: &Notification) -> Result<()> {
        self.send(std::slice::from_ref(notification)).map(|_| ())
    }

    fn send(&self, batch: &[Notification]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        self.store.create_notifications(batch).map_err(storage)
    }
}

fn urgent_title(blood_type: BloodType) -> String {
    format!("Urgent: {blood_type} Blood Needed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SqliteStore;
    use crate::domain::{Donor, RequestPriority, User, UserRole};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn donor(store: &SqliteStore, email: &str, bt: BloodType, last: Option<NaiveDate>) -> Donor {
        let user = store
            .upsert_user(&User::new(email, "Donor", UserRole::Donor))
            .expect("Should save user");
        store
            .upsert_donor(&Donor::new(user.id, bt, date(1990, 1, 1), 70.0, last, date(2024, 6, 1)))
            .expect("Should save donor")
    }

    #[test]
    fn test_notify_eligible_donors_exact_type() {
        let store = Arc::new(SqliteStore::in_memory().expect("Should create db"));
        let a = donor(&store, "a@example.org", BloodType::ANeg, None);
        donor(&store, "o@example.org", BloodType::ONeg, None);
        donor(&store, "late@example.org", BloodType::ANeg, Some(date(2024, 5, 30)));

        let service = NotificationService::new(Arc::clone(&store));
        let hospital_id = Uuid::new_v4();
        let sent = service
            .notify_eligible_donors(BloodType::ANeg, hospital_id, "Come today", date(2024, 6, 1))
            .expect("Should notify");
        assert_eq!(sent, 1);

        let inbox = store.user_notifications(a.user_id, true).expect("Should list");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].title, "Urgent: A- Blood Needed");
        assert_eq!(inbox[0].message, "Come today");
        assert_eq!(inbox[0].kind, NotificationType::UrgentRequest);
        assert_eq!(inbox[0].related_id, Some(hospital_id));
    }

    #[test]
    fn test_no_eligible_donors_sends_nothing() {
        let store = Arc::new(SqliteStore::in_memory().expect("Should create db"));
        let service = NotificationService::new(store);
        let sent = service
            .notify_eligible_donors(BloodType::BNeg, Uuid::new_v4(), "msg", date(2024, 6, 1))
            .expect("Should succeed");
        assert_eq!(sent, 0);
    }

    #[test]
    fn test_alert_reaches_all_compatible_types() {
        let store = Arc::new(SqliteStore::in_memory().expect("Should create db"));
        donor(&store, "ap@example.org", BloodType::APos, None);
        donor(&store, "an@example.org", BloodType::ANeg, None);
        let on = donor(&store, "on@example.org", BloodType::ONeg, None);
        donor(&store, "bp@example.org", BloodType::BPos, None);

        let service = NotificationService::new(Arc::clone(&store));
        let request = BloodRequest::open(Uuid::new_v4(), BloodType::APos, 3, RequestPriority::Urgent);
        let sent = service
            .alert_compatible_donors(&request, "St. Mary", date(2024, 6, 1))
            .expect("Should alert");
        assert_eq!(sent, 3);

        let inbox = store.user_notifications(on.user_id, true).expect("Should list");
        assert_eq!(
            inbox[0].message,
            "[Urgent] St. Mary needs 3 unit(s) of A+ blood. Please donate if you can."
        );
    }

    #[test]
    fn test_reminders_only_on_reopening_day() {
        let store = Arc::new(SqliteStore::in_memory().expect("Should create db"));
        let due = donor(&store, "due@example.org", BloodType::OPos, Some(date(2024, 1, 1)));
        donor(&store, "later@example.org", BloodType::OPos, Some(date(2024, 1, 2)));

        let service = NotificationService::new(Arc::clone(&store));
        assert_eq!(service.send_eligibility_reminders(date(2024, 2, 26)).expect("Should send"), 1);

        let inbox = store.user_notifications(due.user_id, false).expect("Should list");
        assert_eq!(inbox[0].kind, NotificationType::EligibilityReminder);
    }
}
