use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{CarePlanKind, HealthRecordType, QuestionType, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarePlanEntry {
    pub title: String,
    pub details: String,
}

/// The two shapes a care plan takes.
///
/// Administrators keep a free-form list of titled entries; coordinators
/// keep a structured goals/risks review. They never share a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CarePlanBody {
    Entries {
        entries: Vec<CarePlanEntry>,
    },
    Structured {
        goals: String,
        risks: String,
        notes: Option<String>,
        next_review_date: Option<NaiveDate>,
    },
}

impl CarePlanBody {
    pub fn kind(&self) -> CarePlanKind {
        match self {
            CarePlanBody::Entries { .. } => CarePlanKind::Entries,
            CarePlanBody::Structured { .. } => CarePlanKind::Structured,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarePlan {
    pub id: Uuid,
    pub resident_id: Uuid,
    pub author_id: Uuid,
    #[serde(flatten)]
    pub body: CarePlanBody,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCarePlan {
    pub resident_id: Uuid,
    #[serde(flatten)]
    pub body: CarePlanBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CarePlanPatch {
    pub entries: Option<Vec<CarePlanEntry>>,
    pub goals: Option<String>,
    pub risks: Option<String>,
    pub notes: Option<String>,
    pub next_review_date: Option<NaiveDate>,
}

impl CarePlanPatch {
    /// Apply to the plan's own shape; fields of the other shape are rejected.
    pub fn apply(self, plan: &mut CarePlan) -> Result<(), String> {
        match &mut plan.body {
            CarePlanBody::Entries { entries } => {
                if self.goals.is_some()
                    || self.risks.is_some()
                    || self.notes.is_some()
                    || self.next_review_date.is_some()
                {
                    return Err("entries care plan has no goals, risks, notes or review date".into());
                }
                if let Some(new_entries) = self.entries {
                    *entries = new_entries;
                }
            }
            CarePlanBody::Structured {
                goals,
                risks,
                notes,
                next_review_date,
            } => {
                if self.entries.is_some() {
                    return Err("structured care plan has no entries list".into());
                }
                if let Some(v) = self.goals {
                    *goals = v;
                }
                if let Some(v) = self.risks {
                    *risks = v;
                }
                if let Some(v) = self.notes {
                    *notes = Some(v);
                }
                if let Some(v) = self.next_review_date {
                    *next_review_date = Some(v);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormQuestion {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub prompt: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareFormTemplate {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub roles_allowed: Vec<Role>,
    /// Residents this form applies to; empty means every resident.
    pub residents: Vec<Uuid>,
    pub questions: Vec<FormQuestion>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCareForm {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub roles_allowed: Vec<Role>,
    #[serde(default)]
    pub residents: Vec<Uuid>,
    #[serde(default)]
    pub questions: Vec<FormQuestion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CareFormPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub roles_allowed: Option<Vec<Role>>,
    pub residents: Option<Vec<Uuid>>,
    pub questions: Option<Vec<FormQuestion>>,
}

impl CareFormPatch {
    pub fn apply(self, form: &mut CareFormTemplate) {
        let patch = self;
        apply_patch!(patch => form;
            set: [title, roles_allowed, residents, questions];
            wrap: [description]);
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormAnswer {
    pub question_id: Uuid,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub id: Uuid,
    pub resident_id: Uuid,
    pub record_type: HealthRecordType,
    pub title: String,
    pub details: Option<String>,
    pub recorded_by: Uuid,
    pub record_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewHealthRecord {
    pub resident_id: Uuid,
    pub record_type: HealthRecordType,
    pub title: String,
    pub details: Option<String>,
    /// Defaults to the day the record is written.
    pub record_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthRecordPatch {
    pub record_type: Option<HealthRecordType>,
    pub title: Option<String>,
    pub details: Option<String>,
    pub record_date: Option<NaiveDate>,
}

impl HealthRecordPatch {
    pub fn apply(self, record: &mut HealthRecord) {
        let patch = self;
        apply_patch!(patch => record; set: [record_type, title, record_date]; wrap: [details]);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteCategory {
    pub id: Uuid,
    pub resident_id: Uuid,
    pub name: String,
    pub roles_allowed: Vec<Role>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewNoteCategory {
    pub resident_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub roles_allowed: Vec<Role>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoteCategoryPatch {
    pub name: Option<String>,
    pub roles_allowed: Option<Vec<Role>>,
}

impl NoteCategoryPatch {
    pub fn apply(self, category: &mut NoteCategory) {
        let patch = self;
        apply_patch!(patch => category; set: [name, roles_allowed]; wrap: []);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(body: CarePlanBody) -> CarePlan {
        let now = Utc::now();
        CarePlan {
            id: Uuid::new_v4(),
            resident_id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            body,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn care_plan_serializes_with_kind_tag() {
        let p = plan(CarePlanBody::Structured {
            goals: "Walk daily".into(),
            risks: "Falls".into(),
            notes: None,
            next_review_date: None,
        });
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["kind"], "structured");
        assert_eq!(json["goals"], "Walk daily");
    }

    #[test]
    fn new_care_plan_parses_entries_shape() {
        let input: NewCarePlan = serde_json::from_value(serde_json::json!({
            "resident_id": Uuid::nil(),
            "kind": "entries",
            "entries": [{"title": "Mobility", "details": "Frame at all times"}]
        }))
        .unwrap();
        assert_eq!(input.body.kind(), CarePlanKind::Entries);
    }

    #[test]
    fn patch_rejects_fields_of_other_shape() {
        let mut p = plan(CarePlanBody::Entries { entries: vec![] });
        let err = CarePlanPatch {
            goals: Some("x".into()),
            ..Default::default()
        }
        .apply(&mut p)
        .unwrap_err();
        assert!(err.contains("entries care plan"));
    }

    #[test]
    fn structured_patch_keeps_omitted_fields() {
        let mut p = plan(CarePlanBody::Structured {
            goals: "Walk daily".into(),
            risks: "Falls".into(),
            notes: Some("Uses frame".into()),
            next_review_date: None,
        });
        CarePlanPatch {
            risks: Some("Falls, dehydration".into()),
            ..Default::default()
        }
        .apply(&mut p)
        .unwrap();
        match p.body {
            CarePlanBody::Structured { goals, risks, notes, .. } => {
                assert_eq!(goals, "Walk daily");
                assert_eq!(risks, "Falls, dehydration");
                assert_eq!(notes.as_deref(), Some("Uses frame"));
            }
            CarePlanBody::Entries { .. } => panic!("shape changed"),
        }
    }
}
