use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{collect_rows, enum_at, json_at, opt_uuid_at, to_json, uuid_at};
use crate::db::DatabaseError;
use crate::models::enums::{FeedbackStatus, IncidentStatus};
use crate::models::{Feedback, FileRecord, Incident};

// ── Files ───────────────────────────────────────────────────

const FILE_COLUMNS: &str = "id, title, file_type, url, storage_url, resident_id, uploaded_by,
     roles_allowed, notes, created_at, updated_at";

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        file_type: row.get(2)?,
        url: row.get(3)?,
        storage_url: row.get(4)?,
        resident_id: opt_uuid_at(row, 5)?,
        uploaded_by: uuid_at(row, 6)?,
        roles_allowed: json_at(row, 7)?,
        notes: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub fn insert_file(conn: &Connection, file: &FileRecord) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO files ({FILE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            file.id.to_string(),
            file.title,
            file.file_type,
            file.url,
            file.storage_url,
            file.resident_id.map(|id| id.to_string()),
            file.uploaded_by.to_string(),
            to_json(&file.roles_allowed)?,
            file.notes,
            file.created_at,
            file.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_file(conn: &Connection, id: &Uuid) -> Result<Option<FileRecord>, DatabaseError> {
    let file = conn
        .query_row(
            &format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1"),
            params![id.to_string()],
            file_from_row,
        )
        .optional()?;
    Ok(file)
}

/// Every file, optionally for one resident. Role visibility is applied by the caller.
pub fn list_files(
    conn: &Connection,
    resident_id: Option<&Uuid>,
) -> Result<Vec<FileRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FILE_COLUMNS} FROM files
         WHERE (?1 IS NULL OR resident_id = ?1) ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![resident_id.map(|id| id.to_string())], file_from_row)?;
    collect_rows(rows)
}

pub fn update_file(conn: &Connection, file: &FileRecord) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE files SET title = ?1, file_type = ?2, url = ?3, storage_url = ?4,
         resident_id = ?5, roles_allowed = ?6, notes = ?7, updated_at = ?8
         WHERE id = ?9",
        params![
            file.title,
            file.file_type,
            file.url,
            file.storage_url,
            file.resident_id.map(|id| id.to_string()),
            to_json(&file.roles_allowed)?,
            file.notes,
            file.updated_at,
            file.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("File", file.id));
    }
    Ok(())
}

pub fn delete_file(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM files WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

// ── Incidents ───────────────────────────────────────────────

const INCIDENT_COLUMNS: &str = "id, title, description, reported_by, reporter_role, resident_id,
     shift_id, status, created_at, updated_at";

fn incident_from_row(row: &Row<'_>) -> rusqlite::Result<Incident> {
    Ok(Incident {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        reported_by: uuid_at(row, 3)?,
        reporter_role: enum_at(row, 4)?,
        resident_id: opt_uuid_at(row, 5)?,
        shift_id: opt_uuid_at(row, 6)?,
        status: enum_at(row, 7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub fn insert_incident(conn: &Connection, incident: &Incident) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO incidents ({INCIDENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        params![
            incident.id.to_string(),
            incident.title,
            incident.description,
            incident.reported_by.to_string(),
            incident.reporter_role.as_str(),
            incident.resident_id.map(|id| id.to_string()),
            incident.shift_id.map(|id| id.to_string()),
            incident.status.as_str(),
            incident.created_at,
            incident.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_incident(conn: &Connection, id: &Uuid) -> Result<Option<Incident>, DatabaseError> {
    let incident = conn
        .query_row(
            &format!("SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = ?1"),
            params![id.to_string()],
            incident_from_row,
        )
        .optional()?;
    Ok(incident)
}

#[derive(Debug, Clone, Default)]
pub struct IncidentFilter {
    pub status: Option<IncidentStatus>,
    pub reported_by: Option<Uuid>,
    pub resident_id: Option<Uuid>,
}

pub fn list_incidents(
    conn: &Connection,
    filter: &IncidentFilter,
) -> Result<Vec<Incident>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {INCIDENT_COLUMNS} FROM incidents
         WHERE (?1 IS NULL OR status = ?1)
           AND (?2 IS NULL OR reported_by = ?2)
           AND (?3 IS NULL OR resident_id = ?3)
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(
        params![
            filter.status.map(|s| s.as_str()),
            filter.reported_by.map(|id| id.to_string()),
            filter.resident_id.map(|id| id.to_string()),
        ],
        incident_from_row,
    )?;
    collect_rows(rows)
}

pub fn recent_incidents(conn: &Connection, limit: usize) -> Result<Vec<Incident>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {INCIDENT_COLUMNS} FROM incidents ORDER BY created_at DESC LIMIT ?1"
    ))?;
    let rows = stmt.query_map(params![limit as i64], incident_from_row)?;
    collect_rows(rows)
}

pub fn update_incident(conn: &Connection, incident: &Incident) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE incidents SET title = ?1, description = ?2, status = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            incident.title,
            incident.description,
            incident.status.as_str(),
            incident.updated_at,
            incident.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Incident", incident.id));
    }
    Ok(())
}

pub fn delete_incident(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM incidents WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

// ── Feedback ────────────────────────────────────────────────

const FEEDBACK_COLUMNS: &str = "id, submitted_by, message, category, status, response,
     responded_by, created_at, updated_at";

fn feedback_from_row(row: &Row<'_>) -> rusqlite::Result<Feedback> {
    Ok(Feedback {
        id: uuid_at(row, 0)?,
        submitted_by: uuid_at(row, 1)?,
        message: row.get(2)?,
        category: row.get(3)?,
        status: enum_at(row, 4)?,
        response: row.get(5)?,
        responded_by: opt_uuid_at(row, 6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub fn insert_feedback(conn: &Connection, feedback: &Feedback) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO feedback ({FEEDBACK_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            feedback.id.to_string(),
            feedback.submitted_by.to_string(),
            feedback.message,
            feedback.category,
            feedback.status.as_str(),
            feedback.response,
            feedback.responded_by.map(|id| id.to_string()),
            feedback.created_at,
            feedback.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_feedback(conn: &Connection, id: &Uuid) -> Result<Option<Feedback>, DatabaseError> {
    let feedback = conn
        .query_row(
            &format!("SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE id = ?1"),
            params![id.to_string()],
            feedback_from_row,
        )
        .optional()?;
    Ok(feedback)
}

pub fn list_feedback(
    conn: &Connection,
    submitted_by: Option<&Uuid>,
    status: Option<FeedbackStatus>,
) -> Result<Vec<Feedback>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FEEDBACK_COLUMNS} FROM feedback
         WHERE (?1 IS NULL OR submitted_by = ?1) AND (?2 IS NULL OR status = ?2)
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(
        params![submitted_by.map(|id| id.to_string()), status.map(|s| s.as_str())],
        feedback_from_row,
    )?;
    collect_rows(rows)
}

pub fn update_feedback(conn: &Connection, feedback: &Feedback) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE feedback SET message = ?1, category = ?2, status = ?3, response = ?4,
         responded_by = ?5, updated_at = ?6 WHERE id = ?7",
        params![
            feedback.message,
            feedback.category,
            feedback.status.as_str(),
            feedback.response,
            feedback.responded_by.map(|id| id.to_string()),
            feedback.updated_at,
            feedback.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Feedback", feedback.id));
    }
    Ok(())
}

pub fn delete_feedback(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM feedback WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}
