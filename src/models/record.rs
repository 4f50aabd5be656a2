use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{FeedbackStatus, IncidentStatus, Role};

/// Metadata of a document held in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub title: String,
    pub file_type: String,
    /// URL handed to clients (viewer-wrapped for non-images).
    pub url: String,
    /// Raw object URL, used to remove the object again.
    #[serde(skip_serializing, default)]
    pub storage_url: String,
    pub resident_id: Option<Uuid>,
    pub uploaded_by: Uuid,
    pub roles_allowed: Vec<Role>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewFileMeta {
    pub title: String,
    pub file_type: Option<String>,
    pub resident_id: Option<Uuid>,
    #[serde(default)]
    pub roles_allowed: Vec<Role>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilePatch {
    pub title: Option<String>,
    pub file_type: Option<String>,
    pub resident_id: Option<Uuid>,
    pub roles_allowed: Option<Vec<Role>>,
    pub notes: Option<String>,
}

impl FilePatch {
    pub fn apply(self, file: &mut FileRecord) {
        let patch = self;
        apply_patch!(patch => file; set: [title, file_type, roles_allowed]; wrap: [resident_id, notes]);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub reported_by: Uuid,
    pub reporter_role: Role,
    pub resident_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
    pub status: IncidentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIncident {
    pub title: String,
    pub description: String,
    pub resident_id: Option<Uuid>,
    pub shift_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncidentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<IncidentStatus>,
}

impl IncidentPatch {
    pub fn apply(self, incident: &mut Incident) {
        let patch = self;
        apply_patch!(patch => incident; set: [title, description, status]; wrap: []);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    pub submitted_by: Uuid,
    pub message: String,
    pub category: String,
    pub status: FeedbackStatus,
    pub response: Option<String>,
    pub responded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFeedback {
    pub message: String,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackResponse {
    pub response: Option<String>,
    pub status: Option<FeedbackStatus>,
}
