use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::db::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern,
/// plus SQLite column conversions through the same string form.
macro_rules! str_enum {
    ($name:ident { $($(#[$meta:meta])* $variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$meta])* $variant),+
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
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: DatabaseError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

str_enum!(PrincipalKind {
    Patient => "patient",
    Doctor => "doctor",
});

str_enum!(Gender {
    Male => "male",
    Female => "female",
    Other => "other",
});

str_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl AppointmentStatus {
    /// Completed and Cancelled admit no further transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Scheduled)
    }
}

str_enum!(ReminderType {
    Medication => "medication",
    Appointment => "appointment",
    General => "general",
});

str_enum!(RepeatRule {
    Daily => "daily",
    Weekly => "weekly",
    Monthly => "monthly",
    None => "none",
});

impl Default for RepeatRule {
    fn default() -> Self {
        Self::None
    }
}

str_enum!(BloodGroup {
    #[serde(rename = "A+")]
    APositive => "a_positive",
    #[serde(rename = "A-")]
    ANegative => "a_negative",
    #[serde(rename = "B+")]
    BPositive => "b_positive",
    #[serde(rename = "B-")]
    BNegative => "b_negative",
    #[serde(rename = "O+")]
    OPositive => "o_positive",
    #[serde(rename = "O-")]
    ONegative => "o_negative",
    #[serde(rename = "AB+")]
    AbPositive => "ab_positive",
    #[serde(rename = "AB-")]
    AbNegative => "ab_negative",
});

str_enum!(InsightCategory {
    General => "general",
    Diet => "diet",
    Fitness => "fitness",
    #[serde(rename = "Mental Health")]
    MentalHealth => "mental_health",
    Medical => "medical",
});

impl Default for InsightCategory {
    fn default() -> Self {
        Self::General
    }
}

str_enum!(ChatSender {
    User => "user",
    Bot => "bot",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn appointment_status_round_trip() {
        for (variant, s) in [
            (AppointmentStatus::Scheduled, "scheduled"),
            (AppointmentStatus::Completed, "completed"),
            (AppointmentStatus::Cancelled, "cancelled"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(AppointmentStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn only_scheduled_is_non_terminal() {
        assert!(!AppointmentStatus::Scheduled.is_terminal());
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(AppointmentStatus::Cancelled.is_terminal());
    }

    #[test]
    fn unknown_value_is_rejected() {
        let err = ReminderType::from_str("alarm").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn json_uses_display_names() {
        assert_eq!(
            serde_json::to_string(&BloodGroup::AbNegative).unwrap(),
            "\"AB-\""
        );
        assert_eq!(
            serde_json::to_string(&InsightCategory::MentalHealth).unwrap(),
            "\"Mental Health\""
        );
        let status: AppointmentStatus = serde_json::from_str("\"Cancelled\"").unwrap();
        assert_eq!(status, AppointmentStatus::Cancelled);
    }

    #[test]
    fn repeat_defaults_to_none() {
        assert_eq!(RepeatRule::default(), RepeatRule::None);
    }
}
