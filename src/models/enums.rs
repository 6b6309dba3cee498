use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
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

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

str_enum!(ProviderStatus {
    Pending => "Pending",
    Validated => "Validated",
    Flagged => "Flagged",
});

str_enum!(JobStatus {
    Running => "running",
    Completed => "completed",
    Cancelled => "cancelled",
    Error => "error",
});

str_enum!(JobStep {
    Starting => "starting",
    Extraction => "extraction",
    Enrichment => "enrichment",
    Qa => "qa",
    Complete => "complete",
    Failed => "failed",
    Cancelled => "cancelled",
});

str_enum!(ExtractionMode {
    Batch => "batch",
    Single => "single",
});

str_enum!(AuditLevel {
    Info => "INFO",
    Success => "SUCCESS",
    Warn => "WARN",
    Error => "ERROR",
});

impl JobStatus {
    /// Terminal statuses accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn job_status_round_trips() {
        for status in [
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Cancelled,
            JobStatus::Error,
        ] {
            assert_eq!(JobStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn only_running_is_non_terminal() {
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn unknown_step_is_rejected() {
        let err = JobStep::from_str("warp");
        assert!(matches!(err, Err(DatabaseError::InvalidEnum { .. })));
    }

    #[test]
    fn provider_status_uses_display_casing() {
        assert_eq!(ProviderStatus::Validated.as_str(), "Validated");
        assert_eq!(ProviderStatus::Flagged.to_string(), "Flagged");
    }
}
