//! Donor eligibility and donation-interval arithmetic.
//!
//! All dates are UTC calendar dates without a time-of-day component.
//! Functions that need "today" come in pairs: the plain form reads the
//! clock via [`today_utc`], the `_on` form takes the date explicitly.

use chrono::{Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Sex;

/// Minimum donor age in whole years.
pub const MIN_AGE: i32 = 18;

/// Maximum donor age in whole years.
pub const MAX_AGE: i32 = 65;

/// Minimum donor weight in kilograms.
pub const MIN_WEIGHT_KG: f64 = 50.0;

/// Minimum days between two whole-blood donations (8 weeks).
pub const DONATION_INTERVAL_DAYS: u64 = 56;

/// Donations allowed within any trailing 365-day window.
pub const MAX_DONATIONS_PER_YEAR: usize = 6;

/// Minimum hemoglobin, g/dL.
pub const MIN_HEMOGLOBIN_MALE: f64 = 13.0;

/// Minimum hemoglobin, g/dL.
pub const MIN_HEMOGLOBIN_FEMALE: f64 = 12.5;

/// Outcome of the age/weight screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub is_eligible: bool,
    /// One entry per failed rule, in rule order
    pub reasons: Vec<String>,
}

impl EligibilityReport {
    fn from_reasons(reasons: Vec<String>) -> Self {
        Self {
            is_eligible: reasons.is_empty(),
            reasons,
        }
    }
}

/// Today's date in UTC.
#[must_use]
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Date from which a donor may give again.
///
/// Without a previous donation the donor is eligible today.
#[must_use]
pub fn next_eligible_date(last_donation: Option<NaiveDate>) -> NaiveDate {
    next_eligible_date_on(last_donation, today_utc())
}

#[must_use]
pub fn next_eligible_date_on(last_donation: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
    match last_donation {
        Some(last) => last
            .checked_add_days(Days::new(DONATION_INTERVAL_DAYS))
            .unwrap_or(NaiveDate::MAX),
        None => today,
    }
}

/// True iff the donation window has reopened and the donor is active.
#[must_use]
pub fn is_eligible_to_donate_now(today: NaiveDate, next_eligible: NaiveDate, is_active: bool) -> bool {
    is_active && today >= next_eligible
}

/// Age in completed years on `today`.
#[must_use]
pub fn calculate_age(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

/// Screen a prospective donor on age and weight, as of today (UTC).
#[must_use]
pub fn validate_donor_eligibility(date_of_birth: NaiveDate, weight_kg: f64) -> EligibilityReport {
    validate_donor_eligibility_on(date_of_birth, weight_kg, today_utc())
}

/// Screen a prospective donor on age and weight.
///
/// Every failed rule contributes its own reason; the screen never stops at
/// the first failure. A NaN weight fails the weight rule.
#[must_use]
pub fn validate_donor_eligibility_on(
    date_of_birth: NaiveDate,
    weight_kg: f64,
    today: NaiveDate,
) -> EligibilityReport {
    let age = calculate_age(date_of_birth, today);
    let mut reasons = Vec::new();

    if age < MIN_AGE {
        reasons.push(format!("Must be at least {MIN_AGE} years old"));
    }
    if age > MAX_AGE {
        reasons.push(format!("Must be under {MAX_AGE} years old"));
    }
    if weight_kg.is_nan() || weight_kg < MIN_WEIGHT_KG {
        reasons.push(format!("Must weigh at least {MIN_WEIGHT_KG}kg"));
    }

    EligibilityReport::from_reasons(reasons)
}

/// Whether `donation_dates` already hold the yearly maximum within the
/// 365 days ending on `today`.
#[must_use]
pub fn annual_donation_limit_reached(donation_dates: &[NaiveDate], today: NaiveDate) -> bool {
    let window_start = today
        .checked_sub_days(Days::new(365))
        .unwrap_or(NaiveDate::MIN);
    let in_window = donation_dates
        .iter()
        .filter(|d| **d > window_start && **d <= today)
        .count();
    in_window >= MAX_DONATIONS_PER_YEAR
}

/// Hemoglobin threshold for the donor's sex; unknown uses the higher one.
#[must_use]
pub fn minimum_hemoglobin(sex: Option<Sex>) -> f64 {
    match sex {
        Some(Sex::Female) => MIN_HEMOGLOBIN_FEMALE,
        Some(Sex::Male) | None => MIN_HEMOGLOBIN_MALE,
    }
}

#[must_use]
pub fn hemoglobin_sufficient(level_g_dl: f64, sex: Option<Sex>) -> bool {
    level_g_dl >= minimum_hemoglobin(sex)
}
