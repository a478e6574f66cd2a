//! Application layer: Use cases and services.
//!
//! Services are generic over [`Store`](crate::ports::Store) and share it
//! through an `Arc`, so one store instance backs every service.

mod access;
mod donors;
mod hospital;
mod notifications;

pub use access::{AccessError, AccessGuard, AdminAccess, DonorAccess};
pub use donors::{DonorEligibility, DonorRegistration, DonorService};
pub use hospital::{HospitalRegistration, HospitalService, HospitalStats, NewBloodRequest, RecordDonation};
pub use notifications::NotificationService;

use crate::adapters::StoreError;
use crate::LifeflowError;

fn storage<E: Into<StoreError>>(err: E) -> LifeflowError {
    LifeflowError::Store(err.into())
}
