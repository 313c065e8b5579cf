use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(TranslationStatus {
    Pending => "pending",
    Translating => "translating",
    Completed => "completed",
    Failed => "failed",
});

str_enum!(ProofreadStatus {
    Pending => "pending",
    ProofReading => "proof_reading",
    ApplyingProofread => "applying_proofread",
    Completed => "completed",
    Failed => "failed",
    Skipped => "skipped",
});

impl TranslationStatus {
    /// Terminal statuses never transition again; only a full record
    /// overwrite (a new run) replaces them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl ProofreadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn translation_status_round_trip() {
        for (variant, s) in [
            (TranslationStatus::Pending, "pending"),
            (TranslationStatus::Translating, "translating"),
            (TranslationStatus::Completed, "completed"),
            (TranslationStatus::Failed, "failed"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(TranslationStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn proofread_status_round_trip() {
        for (variant, s) in [
            (ProofreadStatus::Pending, "pending"),
            (ProofreadStatus::ProofReading, "proof_reading"),
            (ProofreadStatus::ApplyingProofread, "applying_proofread"),
            (ProofreadStatus::Completed, "completed"),
            (ProofreadStatus::Failed, "failed"),
            (ProofreadStatus::Skipped, "skipped"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(ProofreadStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn translation_terminal_states() {
        assert!(!TranslationStatus::Pending.is_terminal());
        assert!(!TranslationStatus::Translating.is_terminal());
        assert!(TranslationStatus::Completed.is_terminal());
        assert!(TranslationStatus::Failed.is_terminal());
    }

    #[test]
    fn proofread_terminal_states() {
        assert!(!ProofreadStatus::Pending.is_terminal());
        assert!(!ProofreadStatus::ProofReading.is_terminal());
        assert!(!ProofreadStatus::ApplyingProofread.is_terminal());
        assert!(ProofreadStatus::Completed.is_terminal());
        assert!(ProofreadStatus::Failed.is_terminal());
        assert!(ProofreadStatus::Skipped.is_terminal());
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(TranslationStatus::from_str("invalid").is_err());
        assert!(ProofreadStatus::from_str("unknown").is_err());
        assert!(TranslationStatus::from_str("").is_err());
    }

    #[test]
    fn statuses_serialize_as_snake_case() {
        let json = serde_json::to_string(&ProofreadStatus::ApplyingProofread).unwrap();
        assert_eq!(json, "\"applying_proofread\"");
        let back: ProofreadStatus = serde_json::from_str("\"proof_reading\"").unwrap();
        assert_eq!(back, ProofreadStatus::ProofReading);
    }
}
