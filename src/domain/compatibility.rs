//! Red-cell transfusion compatibility.
//!
//! The relation is fixed by immunohematology and asymmetric, so it is kept
//! as two explicit tables rather than computed from ABO/Rh antigens. Both
//! tables are indexed by [`BloodType::index`].

use std::collections::BTreeSet;

use super::BloodType;
use super::BloodType::{ABNeg, ABPos, ANeg, APos, BNeg, BPos, ONeg, OPos};

/// Recipient type -> donor types it may receive from.
const RECEIVES_FROM: [&[BloodType]; 8] = [
    /* A+  */ &[APos, ANeg, OPos, ONeg],
    /* A-  */ &[ANeg, ONeg],
    /* B+  */ &[BPos, BNeg, OPos, ONeg],
    /* B-  */ &[BNeg, ONeg],
    /* AB+ */ &[APos, ANeg, BPos, BNeg, ABPos, ABNeg, OPos, ONeg],
    /* AB- */ &[ANeg, BNeg, ABNeg, ONeg],
    /* O+  */ &[OPos, ONeg],
    /* O-  */ &[ONeg],
];

/// Donor type -> recipient types it may give to.
const DONATES_TO: [&[BloodType]; 8] = [
    /* A+  */ &[APos, ABPos],
    /* A-  */ &[APos, ANeg, ABPos, ABNeg],
    /* B+  */ &[BPos, ABPos],
    /* B-  */ &[BPos, BNeg, ABPos, ABNeg],
    /* AB+ */ &[ABPos],
    /* AB- */ &[ABPos, ABNeg],
    /* O+  */ &[APos, BPos, ABPos, OPos],
    /* O-  */ &[APos, ANeg, BPos, BNeg, ABPos, ABNeg, OPos, ONeg],
];

/// Donor types a recipient of `recipient` may safely receive from.
#[must_use]
pub fn compatible_donors(recipient: BloodType) -> &'static [BloodType] {
    RECEIVES_FROM[recipient.index()]
}

/// Recipient types a donor of `donor` may safely give to.
#[must_use]
pub fn compatible_recipients(donor: BloodType) -> &'static [BloodType] {
    DONATES_TO[donor.index()]
}

#[must_use]
pub fn can_donate_to(donor: BloodType, recipient: BloodType) -> bool {
    compatible_recipients(donor).contains(&recipient)
}

#[must_use]
pub fn can_receive_from(recipient: BloodType, donor: BloodType) -> bool {
    compatible_donors(recipient).contains(&donor)
}

/// Token-level lookup for callers holding raw input.
///
/// An unrecognised token yields an empty set rather than an error; callers
/// that need to reject bad input should parse into [`BloodType`] first.
#[must_use]
pub fn compatible_donors_for_token(recipient: &str) -> BTreeSet<BloodType> {
    recipient
        .parse::<BloodType>()
        .map(|bt| compatible_donors(bt).iter().copied().collect())
        .unwrap_or_default()
}

/// Token-level counterpart of [`compatible_recipients`]; unknown tokens
/// yield an empty set.
#[must_use]
pub fn compatible_recipients_for_token(donor: &str) -> BTreeSet<BloodType> {
    donor
        .parse::<BloodType>()
        .map(|bt| compatible_recipients(bt).iter().copied().collect())
        .unwrap_or_default()
}
