//! Portal access checks.
//!
//! Identity is established elsewhere; these checks only decide whether an
//! already signed-in account may enter a portal, based on its role and the
//! state of its profile.

use std::sync::Arc;

use uuid::Uuid;

use super::storage;
use crate::adapters::StoreError;
use crate::domain::{Donor, Hospital, User, UserRole};
use crate::ports::Store;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("no account with id {0}")]
    UnknownUser(Uuid),

    #[error("{role} accounts cannot use this portal")]
    AccessDenied { role: UserRole },

    #[error("profile setup is not complete")]
    ProfileIncomplete,

    #[error("hospital verification is pending")]
    VerificationPending,
}

/// An account cleared for the hospital/admin portal.
#[derive(Debug, Clone)]
pub struct AdminAccess {
    pub user: User,
    pub hospital: Hospital,
}

/// An account cleared for the donor portal.
#[derive(Debug, Clone)]
pub struct DonorAccess {
    pub user: User,
    pub donor: Donor,
}

pub struct AccessGuard<S: Store> {
    store: Arc<S>,
}

impl<S> AccessGuard<S>
where
    S: Store,
    S::Error: Into<StoreError>,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Hospital and admin accounts with a verified hospital profile.
    ///
    /// # Errors
    /// An [`AccessError`] naming the first failed check, or a storage error.
    pub fn admin_portal(&self, user_id: Uuid) -> Result<AdminAccess> {
        let user = self.account(user_id)?;
        if !matches!(user.role, UserRole::Hospital | UserRole::Admin) {
            return Err(deny(user_id, AccessError::AccessDenied { role: user.role }));
        }

        let hospital = self
            .store
            .get_hospital_by_user(user_id)
            .map_err(storage)?
            .ok_or_else(|| deny(user_id, AccessError::ProfileIncomplete))?;
        if !hospital.is_verified {
            return Err(deny(user_id, AccessError::VerificationPending));
        }

        tracing::debug!(user_id = %user_id, hospital_id = %hospital.id, "Admin portal access granted");
        Ok(AdminAccess { user, hospital })
    }

    /// Donor accounts with a completed donor profile.
    ///
    /// # Errors
    /// An [`AccessError`] naming the first failed check, or a storage error.
    pub fn donor_portal(&self, user_id: Uuid) -> Result<DonorAccess> {
        let user = self.account(user_id)?;
        if user.role != UserRole::Donor {
            return Err(deny(user_id, AccessError::AccessDenied { role: user.role }));
        }

        let donor = self
            .store
            .get_donor_by_user(user_id)
            .map_err(storage)?
            .ok_or_else(|| deny(user_id, AccessError::ProfileIncomplete))?;
        Ok(DonorAccess { user, donor })
    }

    fn account(&self, user_id: Uuid) -> Result<User> {
        self.store
            .get_user(user_id)
            .map_err(storage)?
            .ok_or_else(|| deny(user_id, AccessError::UnknownUser(user_id)))
    }
}

fn deny(user_id: Uuid, reason: AccessError) -> crate::LifeflowError {
    tracing::warn!(user_id = %user_id, reason = %reason, "Portal access denied");
    reason.into()
}
