use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{collect_rows, enum_at, opt_uuid_at, uuid_at};
use crate::db::DatabaseError;
use crate::models::enums::{Role, ShiftStatus};
use crate::models::{format_duration, Shift, ShiftNote, Task};

/// Status column folded to its canonical spelling, for rows written with legacy casing.
const CANONICAL_STATUS: &str = "LOWER(REPLACE(status, '-', '_'))";

const SHIFT_COLUMNS: &str = "id, date, start_time, end_time, assigned_to, resident_id, status,
     actual_start_time, actual_end_time, duration_minutes, notes, created_by,
     created_at, updated_at";

fn shift_from_row(row: &Row<'_>) -> rusqlite::Result<Shift> {
    let duration_minutes: Option<i64> = row.get(9)?;
    Ok(Shift {
        id: uuid_at(row, 0)?,
        date: row.get(1)?,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
        assigned_to: uuid_at(row, 4)?,
        resident_id: opt_uuid_at(row, 5)?,
        status: enum_at(row, 6)?,
        actual_start_time: row.get(7)?,
        actual_end_time: row.get(8)?,
        duration_minutes,
        duration: duration_minutes.map(format_duration),
        notes: row.get(10)?,
        created_by: uuid_at(row, 11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// Filters for the management rota view. All fields are optional.
#[derive(Debug, Clone, Default)]
pub struct ShiftFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub assigned_to: Option<Uuid>,
    pub resident_id: Option<Uuid>,
    pub status: Option<ShiftStatus>,
}

pub fn insert_shift(conn: &Connection, shift: &Shift) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO shifts ({SHIFT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            shift.id.to_string(),
            shift.date,
            shift.start_time,
            shift.end_time,
            shift.assigned_to.to_string(),
            shift.resident_id.map(|id| id.to_string()),
            shift.status.as_str(),
            shift.actual_start_time,
            shift.actual_end_time,
            shift.duration_minutes,
            shift.notes,
            shift.created_by.to_string(),
            shift.created_at,
            shift.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_shift(conn: &Connection, id: &Uuid) -> Result<Option<Shift>, DatabaseError> {
    let shift = conn
        .query_row(
            &format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?1"),
            params![id.to_string()],
            shift_from_row,
        )
        .optional()?;
    Ok(shift)
}

pub fn list_shifts(conn: &Connection, filter: &ShiftFilter) -> Result<Vec<Shift>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SHIFT_COLUMNS} FROM shifts
         WHERE (?1 IS NULL OR date >= ?1)
           AND (?2 IS NULL OR date <= ?2)
           AND (?3 IS NULL OR assigned_to = ?3)
           AND (?4 IS NULL OR resident_id = ?4)
           AND (?5 IS NULL OR {CANONICAL_STATUS} = ?5)
         ORDER BY date, start_time"
    ))?;
    let rows = stmt.query_map(
        params![
            filter.from,
            filter.to,
            filter.assigned_to.map(|id| id.to_string()),
            filter.resident_id.map(|id| id.to_string()),
            filter.status.map(|s| s.as_str()),
        ],
        shift_from_row,
    )?;
    collect_rows(rows)
}

/// Shifts assigned to a user dated on or after `from`, soonest first.
pub fn list_shifts_for_user_from(
    conn: &Connection,
    user_id: &Uuid,
    from: NaiveDate,
) -> Result<Vec<Shift>, DatabaseError> {
    list_shifts(
        conn,
        &ShiftFilter {
            from: Some(from),
            assigned_to: Some(*user_id),
            ..Default::default()
        },
    )
}

/// Completed shifts of a user, most recently finished first.
pub fn list_completed_shifts_for_user(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Vec<Shift>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SHIFT_COLUMNS} FROM shifts
         WHERE assigned_to = ?1 AND {CANONICAL_STATUS} = 'completed'
         ORDER BY date DESC, actual_end_time DESC"
    ))?;
    let rows = stmt.query_map(params![user_id.to_string()], shift_from_row)?;
    collect_rows(rows)
}

/// Full rewrite of the schedule fields of a shift.
pub fn update_shift(conn: &Connection, shift: &Shift) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE shifts SET date = ?1, start_time = ?2, end_time = ?3, assigned_to = ?4,
         resident_id = ?5, notes = ?6, updated_at = ?7
         WHERE id = ?8",
        params![
            shift.date,
            shift.start_time,
            shift.end_time,
            shift.assigned_to.to_string(),
            shift.resident_id.map(|id| id.to_string()),
            shift.notes,
            shift.updated_at,
            shift.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Shift", shift.id));
    }
    Ok(())
}

/// Write the lifecycle columns only if the stored status still equals `expected`.
///
/// Returns `false` when another writer moved the shift first.
pub fn transition_shift(
    conn: &Connection,
    shift: &Shift,
    expected: ShiftStatus,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        &format!(
            "UPDATE shifts SET status = ?1, actual_start_time = ?2, actual_end_time = ?3,
             duration_minutes = ?4, updated_at = ?5
             WHERE id = ?6 AND {CANONICAL_STATUS} = ?7"
        ),
        params![
            shift.status.as_str(),
            shift.actual_start_time,
            shift.actual_end_time,
            shift.duration_minutes,
            shift.updated_at,
            shift.id.to_string(),
            expected.as_str(),
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete_shift(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM shifts WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

pub fn count_shifts_on(
    conn: &Connection,
    date: NaiveDate,
) -> Result<Vec<(ShiftStatus, i64)>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CANONICAL_STATUS}, COUNT(*) FROM shifts WHERE date = ?1 GROUP BY 1"
    ))?;
    let rows = stmt.query_map(params![date], |row| {
        Ok((enum_at::<ShiftStatus>(row, 0)?, row.get::<_, i64>(1)?))
    })?;
    collect_rows(rows)
}

// ── Shift notes ─────────────────────────────────────────────

const NOTE_COLUMNS: &str = "id, shift_id, resident_id, author_id, author_role, category_id,
     content, flagged, flag_comment, flagged_by, created_at, updated_at";

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<ShiftNote> {
    Ok(ShiftNote {
        id: uuid_at(row, 0)?,
        shift_id: uuid_at(row, 1)?,
        resident_id: uuid_at(row, 2)?,
        author_id: uuid_at(row, 3)?,
        author_role: enum_at(row, 4)?,
        category_id: opt_uuid_at(row, 5)?,
        content: row.get(6)?,
        flagged: row.get(7)?,
        flag_comment: row.get(8)?,
        flagged_by: opt_uuid_at(row, 9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub fn insert_shift_note(conn: &Connection, note: &ShiftNote) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO shift_notes ({NOTE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            note.id.to_string(),
            note.shift_id.to_string(),
            note.resident_id.to_string(),
            note.author_id.to_string(),
            note.author_role.as_str(),
            note.category_id.map(|id| id.to_string()),
            note.content,
            note.flagged,
            note.flag_comment,
            note.flagged_by.map(|id| id.to_string()),
            note.created_at,
            note.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_shift_note(conn: &Connection, id: &Uuid) -> Result<Option<ShiftNote>, DatabaseError> {
    let note = conn
        .query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM shift_notes WHERE id = ?1"),
            params![id.to_string()],
            note_from_row,
        )
        .optional()?;
    Ok(note)
}

/// Notes of a shift, oldest first, optionally restricted to one author role.
pub fn list_notes_by_shift(
    conn: &Connection,
    shift_id: &Uuid,
    author_role: Option<Role>,
) -> Result<Vec<ShiftNote>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTE_COLUMNS} FROM shift_notes
         WHERE shift_id = ?1 AND (?2 IS NULL OR author_role = ?2)
         ORDER BY created_at"
    ))?;
    let rows = stmt.query_map(
        params![shift_id.to_string(), author_role.map(|r| r.as_str())],
        note_from_row,
    )?;
    collect_rows(rows)
}

pub fn list_notes_by_resident(
    conn: &Connection,
    resident_id: &Uuid,
) -> Result<Vec<ShiftNote>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTE_COLUMNS} FROM shift_notes WHERE resident_id = ?1 ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![resident_id.to_string()], note_from_row)?;
    collect_rows(rows)
}

pub fn update_shift_note(conn: &Connection, note: &ShiftNote) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE shift_notes SET category_id = ?1, content = ?2, flagged = ?3, flag_comment = ?4,
         flagged_by = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            note.category_id.map(|id| id.to_string()),
            note.content,
            note.flagged,
            note.flag_comment,
            note.flagged_by.map(|id| id.to_string()),
            note.updated_at,
            note.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("ShiftNote", note.id));
    }
    Ok(())
}

pub fn delete_shift_note(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM shift_notes WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

// ── Tasks ───────────────────────────────────────────────────

const TASK_COLUMNS: &str = "id, description, due_time, assigned_to, shift_id, resident_id,
     status, notes, created_by, created_at, updated_at";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: uuid_at(row, 0)?,
        description: row.get(1)?,
        due_time: row.get(2)?,
        assigned_to: uuid_at(row, 3)?,
        shift_id: opt_uuid_at(row, 4)?,
        resident_id: opt_uuid_at(row, 5)?,
        status: enum_at(row, 6)?,
        notes: row.get(7)?,
        created_by: uuid_at(row, 8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub shift_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
}

pub fn insert_task(conn: &Connection, task: &Task) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO tasks ({TASK_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            task.id.to_string(),
            task.description,
            task.due_time,
            task.assigned_to.to_string(),
            task.shift_id.map(|id| id.to_string()),
            task.resident_id.map(|id| id.to_string()),
            task.status.as_str(),
            task.notes,
            task.created_by.to_string(),
            task.created_at,
            task.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_task(conn: &Connection, id: &Uuid) -> Result<Option<Task>, DatabaseError> {
    let task = conn
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![id.to_string()],
            task_from_row,
        )
        .optional()?;
    Ok(task)
}

pub fn list_tasks(conn: &Connection, filter: &TaskFilter) -> Result<Vec<Task>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE (?1 IS NULL OR shift_id = ?1) AND (?2 IS NULL OR assigned_to = ?2)
         ORDER BY due_time"
    ))?;
    let rows = stmt.query_map(
        params![
            filter.shift_id.map(|id| id.to_string()),
            filter.assigned_to.map(|id| id.to_string()),
        ],
        task_from_row,
    )?;
    collect_rows(rows)
}

pub fn update_task(conn: &Connection, task: &Task) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE tasks SET description = ?1, due_time = ?2, assigned_to = ?3, status = ?4,
         notes = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            task.description,
            task.due_time,
            task.assigned_to.to_string(),
            task.status.as_str(),
            task.notes,
            task.updated_at,
            task.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Task", task.id));
    }
    Ok(())
}

pub fn delete_task(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}
