//! Closed vocabularies persisted and exchanged as short string tokens.

/// Error returned when a string is not one of a vocabulary's tokens.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseTokenError {
    /// Which vocabulary rejected the value (e.g. "blood type")
    pub kind: &'static str,
    /// The rejected input, verbatim
    pub value: String,
}

impl ParseTokenError {
    #[must_use]
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Declares a fieldless enum whose variants round-trip through fixed tokens.
///
/// Generates `ALL`, `as_str`, `Display`, `FromStr` (trimmed, ASCII
/// case-insensitive) and serde impls that use the token as the wire form.
/// Variant declaration order defines `Ord`.
macro_rules! token_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident ($kind:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $token:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        $vis enum $name {
            $( $(#[$vmeta])* #[serde(rename = $token)] $variant, )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The canonical token for this variant.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $token, )+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::domain::ParseTokenError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                $(
                    if trimmed.eq_ignore_ascii_case($token) {
                        return Ok(Self::$variant);
                    }
                )+
                Err($crate::domain::ParseTokenError::new($kind, s))
            }
        }
    };
}

pub(crate) use token_enum;

/// Capitalise the first character of a token for display ("urgent" -> "Urgent").
#[must_use]
pub fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("urgent"), "Urgent");
        assert_eq!(capitalize("open"), "Open");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_error_message_names_vocabulary() {
        let err = ParseTokenError::new("blood type", "C+");
        assert_eq!(err.to_string(), "invalid blood type: \"C+\"");
    }
}
