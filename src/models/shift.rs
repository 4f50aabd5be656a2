use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Role, ShiftStatus, TaskStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub assigned_to: Uuid,
    pub resident_id: Option<Uuid>,
    pub status: ShiftStatus,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    /// Display form of `duration_minutes`, e.g. "47 min".
    pub duration: Option<String>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Render a worked duration the way the rota screens show it.
pub fn format_duration(minutes: i64) -> String {
    format!("{minutes} min")
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewShift {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub assigned_to: Uuid,
    pub resident_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShiftPatch {
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub assigned_to: Option<Uuid>,
    pub resident_id: Option<Uuid>,
    pub notes: Option<String>,
}

impl ShiftPatch {
    /// True when the patch moves the shift to another person or another slot.
    pub fn changes_schedule(&self, shift: &Shift) -> bool {
        self.assigned_to.is_some_and(|a| a != shift.assigned_to)
            || self.date.is_some_and(|d| d != shift.date)
            || self.start_time.is_some_and(|t| t != shift.start_time)
            || self.end_time.is_some_and(|t| t != shift.end_time)
    }

    pub fn apply(self, shift: &mut Shift) {
        let patch = self;
        apply_patch!(patch => shift;
            set: [date, start_time, end_time, assigned_to];
            wrap: [resident_id, notes]);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftNote {
    pub id: Uuid,
    pub shift_id: Uuid,
    pub resident_id: Uuid,
    pub author_id: Uuid,
    /// Role of the author when the note was written (nurse or carer).
    pub author_role: Role,
    pub category_id: Option<Uuid>,
    pub content: String,
    pub flagged: bool,
    pub flag_comment: Option<String>,
    pub flagged_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewShiftNote {
    pub shift_id: Uuid,
    pub resident_id: Uuid,
    pub category_id: Option<Uuid>,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShiftNotePatch {
    pub content: Option<String>,
    pub category_id: Option<Uuid>,
}

impl ShiftNotePatch {
    pub fn apply(self, note: &mut ShiftNote) {
        let patch = self;
        apply_patch!(patch => note; set: [content]; wrap: [category_id]);
    }
}

/// Coordinator review mark on a note.
#[derive(Debug, Clone, Deserialize)]
pub struct NoteFlag {
    pub flagged: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub description: String,
    pub due_time: NaiveTime,
    pub assigned_to: Uuid,
    pub shift_id: Option<Uuid>,
    pub resident_id: Option<Uuid>,
    pub status: TaskStatus,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub description: String,
    pub due_time: NaiveTime,
    pub assigned_to: Uuid,
    pub shift_id: Option<Uuid>,
    pub resident_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// What the assignee may change on their own task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub notes: Option<String>,
}

impl TaskPatch {
    pub fn apply(self, task: &mut Task) {
        let patch = self;
        apply_patch!(patch => task; set: [status]; wrap: [notes]);
    }
}
