//! Domain layer: Core business types and rules.
//!
//! Pure types and functions with no I/O. The compatibility tables and the
//! eligibility arithmetic are stateless; the entity types mirror what the
//! store persists.

pub mod compatibility;
pub mod eligibility;

mod blood_type;
mod donation;
mod donor;
mod hospital;
mod inventory;
mod notification;
mod request;
mod token;
mod user;

pub use blood_type::BloodType;
pub use donation::{Donation, Vitals};
pub use donor::{Address, Donor, EmergencyContact, Sex};
pub use eligibility::EligibilityReport;
pub use hospital::Hospital;
pub use inventory::{BloodInventory, InventoryLevel, InventoryThresholds, InventoryUpdate};
pub use notification::{Notification, NotificationType};
pub use request::{BloodRequest, RequestPriority, RequestStatus};
pub use token::ParseTokenError;
pub use user::{User, UserRole};
