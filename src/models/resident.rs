use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::FamilyStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub relationship: Option<String>,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resident {
    pub id: Uuid,
    /// Login account of the resident, if one was created.
    pub user_id: Option<Uuid>,
    pub full_name: String,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub room_number: Option<String>,
    pub allergies: Option<String>,
    pub dietary_preference: Option<String>,
    pub medical_conditions: Vec<String>,
    pub medical_history: Option<String>,
    pub emergency_contacts: Vec<EmergencyContact>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewResident {
    pub user_id: Option<Uuid>,
    pub full_name: String,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub room_number: Option<String>,
    pub allergies: Option<String>,
    pub dietary_preference: Option<String>,
    #[serde(default)]
    pub medical_conditions: Vec<String>,
    pub medical_history: Option<String>,
    #[serde(default)]
    pub emergency_contacts: Vec<EmergencyContact>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResidentPatch {
    pub user_id: Option<Uuid>,
    pub full_name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub room_number: Option<String>,
    pub allergies: Option<String>,
    pub dietary_preference: Option<String>,
    pub medical_conditions: Option<Vec<String>>,
    pub medical_history: Option<String>,
    pub emergency_contacts: Option<Vec<EmergencyContact>>,
    pub photo_url: Option<String>,
}

impl ResidentPatch {
    pub fn apply(self, resident: &mut Resident) {
        let patch = self;
        apply_patch!(patch => resident;
            set: [full_name, medical_conditions, emergency_contacts];
            wrap: [user_id, gender, date_of_birth, room_number, allergies,
                   dietary_preference, medical_history, photo_url]);
    }
}

/// Link between a family account and the resident they visit.
///
/// `resident_id` is set exactly when `status` is `Approved`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resident_id: Option<Uuid>,
    pub relationship: Option<String>,
    pub status: FamilyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_replaces_lists_only_when_present() {
        let now = Utc::now();
        let mut resident = Resident {
            id: Uuid::new_v4(),
            user_id: None,
            full_name: "Maud Price".into(),
            gender: Some("female".into()),
            date_of_birth: NaiveDate::from_ymd_opt(1938, 4, 2),
            room_number: Some("12B".into()),
            allergies: None,
            dietary_preference: Some("soft foods".into()),
            medical_conditions: vec!["arthritis".into()],
            medical_history: None,
            emergency_contacts: vec![],
            photo_url: None,
            created_at: now,
            updated_at: now,
        };

        ResidentPatch {
            room_number: Some("14A".into()),
            ..Default::default()
        }
        .apply(&mut resident);

        assert_eq!(resident.room_number.as_deref(), Some("14A"));
        assert_eq!(resident.medical_conditions, vec!["arthritis".to_string()]);
        assert_eq!(resident.dietary_preference.as_deref(), Some("soft foods"));
    }
}
