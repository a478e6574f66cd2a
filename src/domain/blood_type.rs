//! ABO/Rh blood groups.

use super::token::token_enum;

token_enum! {
    /// One of the eight ABO/Rh blood groups.
    ///
    /// Tokens are `A+`, `A-`, `B+`, `B-`, `AB+`, `AB-`, `O+`, `O-`; this is
    /// also the canonical ordering used for inventory listings.
    pub enum BloodType("blood type") {
        APos => "A+",
        ANeg => "A-",
        BPos => "B+",
        BNeg => "B-",
        ABPos => "AB+",
        ABNeg => "AB-",
        OPos => "O+",
        /// Universal donor
        ONeg => "O-",
    }
}

impl BloodType {
    /// Position of this type in [`BloodType::ALL`], used to index the
    /// compatibility tables.
    #[must_use]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    /// Whether the Rh(D) antigen is present.
    #[must_use]
    pub fn is_rh_positive(&self) -> bool {
        matches!(self, Self::APos | Self::BPos | Self::ABPos | Self::OPos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_roundtrip() {
        for bt in BloodType::ALL {
            let parsed: BloodType = bt.as_str().parse().expect("Should parse");
            assert_eq!(parsed, *bt);
            assert_eq!(bt.to_string(), bt.as_str());
        }
    }

    #[test]
    fn test_parse_is_lenient_on_case_and_whitespace() {
        assert_eq!(" ab+ ".parse::<BloodType>(), Ok(BloodType::ABPos));
        assert_eq!("o-".parse::<BloodType>(), Ok(BloodType::ONeg));
    }

    #[test]
    fn test_parse_rejects_unknown_tokens() {
        assert!("C+".parse::<BloodType>().is_err());
        assert!("A".parse::<BloodType>().is_err());
        assert!("".parse::<BloodType>().is_err());
    }

    #[test]
    fn test_index_matches_all_order() {
        for (i, bt) in BloodType::ALL.iter().enumerate() {
            assert_eq!(bt.index(), i);
        }
    }

    #[test]
    fn test_serde_uses_token() {
        let json = serde_json::to_string(&BloodType::ABNeg).expect("Should serialize");
        assert_eq!(json, "\"AB-\"");
        let back: BloodType = serde_json::from_str("\"O+\"").expect("Should deserialize");
        assert_eq!(back, BloodType::OPos);
    }
}
