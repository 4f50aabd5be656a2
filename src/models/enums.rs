use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
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

str_enum!(Role {
    Admin => "admin",
    Coordinator => "coordinator",
    Nurse => "nurse",
    Carer => "carer",
    Resident => "resident",
    Family => "family",
});

impl Role {
    /// Staff roles work shifts or manage them.
    pub fn is_staff(self) -> bool {
        match self {
            Role::Admin | Role::Coordinator | Role::Nurse | Role::Carer => true,
            Role::Resident | Role::Family => false,
        }
    }

    /// Roles that can be assigned a shift and write shift notes.
    pub fn is_care_worker(self) -> bool {
        match self {
            Role::Nurse | Role::Carer => true,
            Role::Admin | Role::Coordinator | Role::Resident | Role::Family => false,
        }
    }
}

str_enum!(FamilyStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

str_enum!(TaskStatus {
    Pending => "pending",
    Completed => "completed",
    Missed => "missed",
});

str_enum!(HealthRecordType {
    Medication => "medication",
    Assessment => "assessment",
    Vitals => "vitals",
    Diagnosis => "diagnosis",
    Note => "note",
    Other => "other",
});

str_enum!(IncidentStatus {
    Open => "open",
    Closed => "closed",
});

str_enum!(FeedbackStatus {
    Open => "open",
    Resolved => "resolved",
    Pending => "pending",
});

str_enum!(NotificationType {
    ShiftAssigned => "shift_assigned",
    ShiftUpdated => "shift_updated",
    TaskAssigned => "task_assigned",
    VisitApproved => "visit_approved",
    VisitRejected => "visit_rejected",
    FamilyApproved => "family_approved",
    General => "general",
});

str_enum!(VisitStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

str_enum!(QuestionType {
    Text => "text",
    Textarea => "textarea",
    Checkbox => "checkbox",
    Radio => "radio",
    Dropdown => "dropdown",
    Date => "date",
    Number => "number",
});

str_enum!(CarePlanKind {
    Entries => "entries",
    Structured => "structured",
});

/// Shift lifecycle state.
///
/// Stored canonically as snake_case. Older rows were written with mixed
/// casing ("Completed", "In-progress", "scheduled"), so parsing folds case
/// and treats `-` and `_` as the same separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Scheduled,
    InProgress,
    Completed,
    Missed,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Missed => "missed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Missed)
    }
}

impl std::fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShiftStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded = s.trim().to_ascii_lowercase().replace('-', "_");
        match folded.as_str() {
            "scheduled" => Ok(Self::Scheduled),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "missed" => Ok(Self::Missed),
            _ => Err(DatabaseError::InvalidEnum {
                field: "ShiftStatus".into(),
                value: s.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trip() {
        for role in [
            Role::Admin,
            Role::Coordinator,
            Role::Nurse,
            Role::Carer,
            Role::Resident,
            Role::Family,
        ] {
            assert_eq!(Role::from_str(role.as_str()).unwrap(), role);
        }
    }

    #[test]
    fn role_is_case_sensitive() {
        assert!(Role::from_str("Admin").is_err());
        assert!(Role::from_str("superuser").is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Coordinator).unwrap(), "\"coordinator\"");
        let parsed: Role = serde_json::from_str("\"carer\"").unwrap();
        assert_eq!(parsed, Role::Carer);
    }

    #[test]
    fn staff_and_care_worker_roles() {
        assert!(Role::Admin.is_staff());
        assert!(!Role::Family.is_staff());
        assert!(Role::Nurse.is_care_worker());
        assert!(!Role::Coordinator.is_care_worker());
    }

    #[test]
    fn shift_status_accepts_legacy_casing() {
        assert_eq!(ShiftStatus::from_str("Completed").unwrap(), ShiftStatus::Completed);
        assert_eq!(ShiftStatus::from_str("completed").unwrap(), ShiftStatus::Completed);
        assert_eq!(ShiftStatus::from_str("In-progress").unwrap(), ShiftStatus::InProgress);
        assert_eq!(ShiftStatus::from_str("in-progress").unwrap(), ShiftStatus::InProgress);
        assert_eq!(ShiftStatus::from_str("Scheduled").unwrap(), ShiftStatus::Scheduled);
        assert!(ShiftStatus::from_str("cancelled").is_err());
    }

    #[test]
    fn shift_status_serializes_canonically() {
        assert_eq!(ShiftStatus::InProgress.as_str(), "in_progress");
        assert_eq!(
            serde_json::to_string(&ShiftStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
    }

    #[test]
    fn invalid_enum_reports_field() {
        let err = TaskStatus::from_str("done").unwrap_err();
        assert!(err.to_string().contains("TaskStatus"));
    }
}
