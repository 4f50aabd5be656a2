//! Shift rota, the shift lifecycle, shift notes and tasks.
//!
//! Lifecycle: `Scheduled → InProgress → Completed`, or `Scheduled → Missed`.
//! Terminal states are never left. Each transition is a compare-and-swap on
//! the stored status; the loser of a concurrent transition gets `Conflict`.

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::access::{authorize, ensure_owner_or_admin, visible_to, Action, Actor, Entity};
use crate::db::repository::{self, ShiftFilter, TaskFilter};
use crate::error::{ServiceError, ServiceResult};
use crate::models::enums::{NotificationType, Role, ShiftStatus, TaskStatus};
use crate::models::{
    format_duration, NewShift, NewShiftNote, NewTask, NoteFlag, Shift, ShiftNote, ShiftNotePatch,
    ShiftPatch, Task, TaskPatch,
};
use crate::notifications::notify;

// ═══════════════════════════════════════════
// Shift type and duration rules
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftType {
    Morning,
    Afternoon,
    Night,
}

/// Classify a shift by its start hour: 05–12 morning, 13–20 afternoon,
/// anything else night.
pub fn shift_type(start_time: NaiveTime) -> ShiftType {
    match start_time.hour() {
        5..=12 => ShiftType::Morning,
        13..=20 => ShiftType::Afternoon,
        _ => ShiftType::Night,
    }
}

const MINUTES_PER_DAY: i64 = 1440;

fn round_minutes(seconds: i64) -> i64 {
    (seconds as f64 / 60.0).round() as i64
}

/// Minutes worked between `start` and `end`.
///
/// Nurses are timed on the clock face only: a negative difference means the
/// shift crossed midnight and wraps by a day. Carers are timed on the full
/// timestamps.
pub fn worked_minutes(role: Role, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    match role {
        Role::Nurse => {
            let minutes = round_minutes((end.time() - start.time()).num_seconds());
            if minutes < 0 {
                minutes + MINUTES_PER_DAY
            } else {
                minutes
            }
        }
        _ => round_minutes((end - start).num_seconds()),
    }
}

/// A shift as shown to the person working it.
#[derive(Debug, Clone, Serialize)]
pub struct AssignedShift {
    #[serde(flatten)]
    pub shift: Shift,
    pub shift_type: ShiftType,
}

impl From<Shift> for AssignedShift {
    fn from(shift: Shift) -> Self {
        Self {
            shift_type: shift_type(shift.start_time),
            shift,
        }
    }
}

// ═══════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════

fn load_shift(conn: &Connection, id: &Uuid) -> ServiceResult<Shift> {
    repository::get_shift(conn, id)?.ok_or_else(|| ServiceError::not_found("Shift"))
}

/// The assignee must be an active nurse or carer.
fn ensure_care_worker(conn: &Connection, user_id: &Uuid) -> ServiceResult<()> {
    match repository::get_user(conn, user_id)? {
        Some(user) if user.is_active && user.role.is_care_worker() => Ok(()),
        Some(_) => Err(ServiceError::validation(
            "Shifts and tasks can only be assigned to an active nurse or carer",
        )),
        None => Err(ServiceError::validation("Assignee does not exist")),
    }
}

fn ensure_resident_exists(conn: &Connection, resident_id: &Uuid) -> ServiceResult<()> {
    if repository::get_resident(conn, resident_id)?.is_none() {
        return Err(ServiceError::validation("Resident does not exist"));
    }
    Ok(())
}

fn ensure_assignee(actor: &Actor, shift: &Shift) -> ServiceResult<()> {
    if !actor.role.is_care_worker() {
        return Err(ServiceError::forbidden("only nurses and carers work shifts"));
    }
    if shift.assigned_to != actor.id {
        return Err(ServiceError::forbidden("shift is assigned to someone else"));
    }
    Ok(())
}

fn ensure_self(actor: &Actor, user_id: &Uuid) -> ServiceResult<()> {
    if !actor.role.is_care_worker() || &actor.id != user_id {
        return Err(ServiceError::forbidden("shifts can only be listed by their assignee"));
    }
    Ok(())
}

fn shift_link(id: &Uuid) -> Option<String> {
    Some(format!("/shifts/{id}"))
}

// ═══════════════════════════════════════════
// Rota management
// ═══════════════════════════════════════════

pub fn create_shift(conn: &Connection, actor: &Actor, input: NewShift, now: DateTime<Utc>) -> ServiceResult<Shift> {
    authorize(actor, Entity::Shift, Action::Create)?;
    if input.start_time == input.end_time {
        return Err(ServiceError::validation("Shift end time must differ from start time"));
    }
    ensure_care_worker(conn, &input.assigned_to)?;
    if let Some(resident_id) = &input.resident_id {
        ensure_resident_exists(conn, resident_id)?;
    }

    let shift = Shift {
        id: Uuid::new_v4(),
        date: input.date,
        start_time: input.start_time,
        end_time: input.end_time,
        assigned_to: input.assigned_to,
        resident_id: input.resident_id,
        status: ShiftStatus::Scheduled,
        actual_start_time: None,
        actual_end_time: None,
        duration_minutes: None,
        duration: None,
        notes: input.notes,
        created_by: actor.id,
        created_at: now,
        updated_at: now,
    };

    let tx = conn.unchecked_transaction()?;
    repository::insert_shift(&tx, &shift)?;
    notify(
        &tx,
        shift.assigned_to,
        NotificationType::ShiftAssigned,
        format!(
            "New shift on {} from {} to {}",
            shift.date,
            shift.start_time.format("%H:%M"),
            shift.end_time.format("%H:%M")
        ),
        shift_link(&shift.id),
        now,
    )?;
    tx.commit()?;

    tracing::info!(shift_id = %shift.id, assigned_to = %shift.assigned_to, "Shift created");
    Ok(shift)
}

pub fn list_shifts(conn: &Connection, actor: &Actor, filter: &ShiftFilter) -> ServiceResult<Vec<Shift>> {
    authorize(actor, Entity::Shift, Action::Read)?;
    match actor.role {
        Role::Admin | Role::Coordinator => Ok(repository::list_shifts(conn, filter)?),
        Role::Nurse | Role::Carer => {
            let own = ShiftFilter {
                assigned_to: Some(actor.id),
                ..filter.clone()
            };
            Ok(repository::list_shifts(conn, &own)?)
        }
        Role::Resident | Role::Family => Err(ServiceError::forbidden("no access to the rota")),
    }
}

pub fn get_shift(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<Shift> {
    authorize(actor, Entity::Shift, Action::Read)?;
    let shift = load_shift(conn, id)?;
    if actor.role.is_care_worker() && shift.assigned_to != actor.id {
        return Err(ServiceError::forbidden("shift is assigned to someone else"));
    }
    Ok(shift)
}

/// Partial update of the schedule. Moving a shift to another person or slot
/// notifies whoever holds it afterwards.
pub fn update_shift(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    patch: ShiftPatch,
    now: DateTime<Utc>,
) -> ServiceResult<Shift> {
    authorize(actor, Entity::Shift, Action::Update)?;
    let mut shift = load_shift(conn, id)?;
    let reschedules = patch.changes_schedule(&shift);
    if reschedules && shift.status != ShiftStatus::Scheduled {
        return Err(ServiceError::conflict(format!(
            "A {} shift can no longer be rescheduled",
            shift.status
        )));
    }
    if let Some(assignee) = &patch.assigned_to {
        ensure_care_worker(conn, assignee)?;
    }
    if let Some(resident_id) = &patch.resident_id {
        ensure_resident_exists(conn, resident_id)?;
    }
    patch.apply(&mut shift);
    if shift.start_time == shift.end_time {
        return Err(ServiceError::validation("Shift end time must differ from start time"));
    }
    shift.updated_at = now;

    let tx = conn.unchecked_transaction()?;
    repository::update_shift(&tx, &shift)?;
    if reschedules {
        notify(
            &tx,
            shift.assigned_to,
            NotificationType::ShiftUpdated,
            format!(
                "Shift updated: {} from {} to {}",
                shift.date,
                shift.start_time.format("%H:%M"),
                shift.end_time.format("%H:%M")
            ),
            shift_link(&shift.id),
            now,
        )?;
    }
    tx.commit()?;
    Ok(shift)
}

pub fn delete_shift(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<()> {
    authorize(actor, Entity::Shift, Action::Delete)?;
    if !repository::delete_shift(conn, id)? {
        return Err(ServiceError::not_found("Shift"));
    }
    tracing::info!(shift_id = %id, deleted_by = %actor.id, "Shift deleted");
    Ok(())
}

// ═══════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════

fn commit_transition(conn: &Connection, shift: &Shift, expected: ShiftStatus) -> ServiceResult<()> {
    if !repository::transition_shift(conn, shift, expected)? {
        return Err(ServiceError::conflict("Shift was changed by someone else"));
    }
    Ok(())
}

pub fn start_shift(conn: &Connection, actor: &Actor, id: &Uuid, now: DateTime<Utc>) -> ServiceResult<Shift> {
    let mut shift = load_shift(conn, id)?;
    ensure_assignee(actor, &shift)?;
    if shift.status != ShiftStatus::Scheduled {
        return Err(ServiceError::conflict(format!("Shift is already {}", shift.status)));
    }

    shift.status = ShiftStatus::InProgress;
    shift.actual_start_time = Some(now);
    shift.updated_at = now;
    commit_transition(conn, &shift, ShiftStatus::Scheduled)?;

    tracing::info!(shift_id = %shift.id, user_id = %actor.id, "Shift started");
    Ok(shift)
}

pub fn complete_shift(conn: &Connection, actor: &Actor, id: &Uuid, now: DateTime<Utc>) -> ServiceResult<Shift> {
    let mut shift = load_shift(conn, id)?;
    ensure_assignee(actor, &shift)?;
    if shift.status.is_terminal() {
        return Err(ServiceError::conflict(format!("Shift is already {}", shift.status)));
    }
    let started = shift
        .actual_start_time
        .ok_or_else(|| ServiceError::validation("Shift has not been started"))?;

    let minutes = worked_minutes(actor.role, started, now);
    let expected = shift.status;
    shift.status = ShiftStatus::Completed;
    shift.actual_end_time = Some(now);
    shift.duration_minutes = Some(minutes);
    shift.duration = Some(format_duration(minutes));
    shift.updated_at = now;
    commit_transition(conn, &shift, expected)?;

    tracing::info!(shift_id = %shift.id, user_id = %actor.id, minutes, "Shift completed");
    Ok(shift)
}

/// Management marks a shift nobody turned up for.
pub fn mark_missed(conn: &Connection, actor: &Actor, id: &Uuid, now: DateTime<Utc>) -> ServiceResult<Shift> {
    authorize(actor, Entity::Shift, Action::Review)?;
    let mut shift = load_shift(conn, id)?;
    if shift.status != ShiftStatus::Scheduled {
        return Err(ServiceError::conflict(format!(
            "Only scheduled shifts can be marked missed, this one is {}",
            shift.status
        )));
    }
    shift.status = ShiftStatus::Missed;
    shift.updated_at = now;
    commit_transition(conn, &shift, ShiftStatus::Scheduled)?;
    Ok(shift)
}

/// Upcoming work of the caller: today onwards, not yet finished.
pub fn list_assigned(
    conn: &Connection,
    actor: &Actor,
    user_id: &Uuid,
    today: NaiveDate,
) -> ServiceResult<Vec<AssignedShift>> {
    ensure_self(actor, user_id)?;
    let shifts = repository::list_shifts_for_user_from(conn, user_id, today)?;
    Ok(shifts
        .into_iter()
        .filter(|s| !s.status.is_terminal())
        .map(AssignedShift::from)
        .collect())
}

pub fn list_completed(conn: &Connection, actor: &Actor, user_id: &Uuid) -> ServiceResult<Vec<AssignedShift>> {
    ensure_self(actor, user_id)?;
    Ok(repository::list_completed_shifts_for_user(conn, user_id)?
        .into_iter()
        .map(AssignedShift::from)
        .collect())
}

// ═══════════════════════════════════════════
// Shift notes
// ═══════════════════════════════════════════

fn load_note(conn: &Connection, id: &Uuid) -> ServiceResult<ShiftNote> {
    repository::get_shift_note(conn, id)?.ok_or_else(|| ServiceError::not_found("Shift note"))
}

pub fn create_note(conn: &Connection, actor: &Actor, input: NewShiftNote, now: DateTime<Utc>) -> ServiceResult<ShiftNote> {
    authorize(actor, Entity::ShiftNote, Action::Create)?;
    let content = input.content.trim();
    if content.is_empty() {
        return Err(ServiceError::validation("Note content is required"));
    }
    load_shift(conn, &input.shift_id)?;
    ensure_resident_exists(conn, &input.resident_id)?;
    if let Some(category_id) = &input.category_id {
        let category = repository::get_note_category(conn, category_id)?
            .ok_or_else(|| ServiceError::validation("Note category does not exist"))?;
        if category.resident_id != input.resident_id {
            return Err(ServiceError::validation("Note category belongs to another resident"));
        }
        if !visible_to(&category.roles_allowed, actor.role) {
            return Err(ServiceError::forbidden("note category not available to your role"));
        }
    }

    let note = ShiftNote {
        id: Uuid::new_v4(),
        shift_id: input.shift_id,
        resident_id: input.resident_id,
        author_id: actor.id,
        author_role: actor.role,
        category_id: input.category_id,
        content: content.to_string(),
        flagged: false,
        flag_comment: None,
        flagged_by: None,
        created_at: now,
        updated_at: now,
    };
    repository::insert_shift_note(conn, &note)?;
    Ok(note)
}

/// Notes of a shift, optionally only those written by one role.
pub fn list_notes_by_shift(
    conn: &Connection,
    actor: &Actor,
    shift_id: &Uuid,
    author_role: Option<Role>,
) -> ServiceResult<Vec<ShiftNote>> {
    authorize(actor, Entity::ShiftNote, Action::Read)?;
    load_shift(conn, shift_id)?;
    Ok(repository::list_notes_by_shift(conn, shift_id, author_role)?)
}

pub fn list_notes_by_resident(conn: &Connection, actor: &Actor, resident_id: &Uuid) -> ServiceResult<Vec<ShiftNote>> {
    authorize(actor, Entity::ShiftNote, Action::Read)?;
    Ok(repository::list_notes_by_resident(conn, resident_id)?)
}

pub fn update_note(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    patch: ShiftNotePatch,
    now: DateTime<Utc>,
) -> ServiceResult<ShiftNote> {
    authorize(actor, Entity::ShiftNote, Action::Update)?;
    let mut note = load_note(conn, id)?;
    if note.author_id != actor.id {
        return Err(ServiceError::forbidden("only the author may edit a note"));
    }
    if patch.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
        return Err(ServiceError::validation("Note content is required"));
    }
    patch.apply(&mut note);
    note.updated_at = now;
    repository::update_shift_note(conn, &note)?;
    Ok(note)
}

/// Coordinator review flag. Clearing the flag drops its comment.
pub fn flag_note(conn: &Connection, actor: &Actor, id: &Uuid, flag: NoteFlag, now: DateTime<Utc>) -> ServiceResult<ShiftNote> {
    authorize(actor, Entity::ShiftNote, Action::Review)?;
    let mut note = load_note(conn, id)?;
    note.flagged = flag.flagged;
    if flag.flagged {
        note.flag_comment = flag.comment;
        note.flagged_by = Some(actor.id);
    } else {
        note.flag_comment = None;
        note.flagged_by = None;
    }
    note.updated_at = now;
    repository::update_shift_note(conn, &note)?;
    Ok(note)
}

pub fn delete_note(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<()> {
    authorize(actor, Entity::ShiftNote, Action::Delete)?;
    let note = load_note(conn, id)?;
    ensure_owner_or_admin(actor, note.author_id, "note")?;
    repository::delete_shift_note(conn, id)?;
    Ok(())
}

// ═══════════════════════════════════════════
// Tasks
// ═══════════════════════════════════════════

fn load_task(conn: &Connection, id: &Uuid) -> ServiceResult<Task> {
    repository::get_task(conn, id)?.ok_or_else(|| ServiceError::not_found("Task"))
}

pub fn create_task(conn: &Connection, actor: &Actor, input: NewTask, now: DateTime<Utc>) -> ServiceResult<Task> {
    authorize(actor, Entity::Task, Action::Create)?;
    let description = input.description.trim();
    if description.is_empty() {
        return Err(ServiceError::validation("Task description is required"));
    }
    ensure_care_worker(conn, &input.assigned_to)?;
    if let Some(shift_id) = &input.shift_id {
        load_shift(conn, shift_id)?;
    }
    if let Some(resident_id) = &input.resident_id {
        ensure_resident_exists(conn, resident_id)?;
    }

    let task = Task {
        id: Uuid::new_v4(),
        description: description.to_string(),
        due_time: input.due_time,
        assigned_to: input.assigned_to,
        shift_id: input.shift_id,
        resident_id: input.resident_id,
        status: TaskStatus::Pending,
        notes: input.notes,
        created_by: actor.id,
        created_at: now,
        updated_at: now,
    };

    let tx = conn.unchecked_transaction()?;
    repository::insert_task(&tx, &task)?;
    notify(
        &tx,
        task.assigned_to,
        NotificationType::TaskAssigned,
        format!("New task due {}: {}", task.due_time.format("%H:%M"), task.description),
        Some(format!("/tasks/{}", task.id)),
        now,
    )?;
    tx.commit()?;
    Ok(task)
}

/// Management may filter freely; nurses and carers only ever see their own.
pub fn list_tasks(conn: &Connection, actor: &Actor, filter: &TaskFilter) -> ServiceResult<Vec<Task>> {
    authorize(actor, Entity::Task, Action::Read)?;
    let filter = if actor.role.is_care_worker() {
        TaskFilter {
            assigned_to: Some(actor.id),
            ..filter.clone()
        }
    } else {
        filter.clone()
    };
    Ok(repository::list_tasks(conn, &filter)?)
}

pub fn get_task(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<Task> {
    authorize(actor, Entity::Task, Action::Read)?;
    let task = load_task(conn, id)?;
    if actor.role.is_care_worker() && task.assigned_to != actor.id {
        return Err(ServiceError::forbidden("task is assigned to someone else"));
    }
    Ok(task)
}

pub fn update_task(conn: &Connection, actor: &Actor, id: &Uuid, patch: TaskPatch, now: DateTime<Utc>) -> ServiceResult<Task> {
    authorize(actor, Entity::Task, Action::Update)?;
    let mut task = load_task(conn, id)?;
    if task.assigned_to != actor.id {
        return Err(ServiceError::forbidden("only the assignee may update a task"));
    }
    patch.apply(&mut task);
    task.updated_at = now;
    repository::update_task(conn, &task)?;
    Ok(task)
}

pub fn delete_task(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<()> {
    authorize(actor, Entity::Task, Action::Delete)?;
    if !repository::delete_task(conn, id)? {
        return Err(ServiceError::not_found("Task"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::fixtures::{seed_resident, seed_user};
    use chrono::{Duration, TimeZone};

    struct Rota {
        conn: Connection,
        coordinator: Actor,
        nurse: Actor,
        carer: Actor,
    }

    fn rota() -> Rota {
        let conn = open_memory_database().unwrap();
        let coordinator = seed_user(&conn, Role::Coordinator);
        let nurse = seed_user(&conn, Role::Nurse);
        let carer = seed_user(&conn, Role::Carer);
        Rota {
            coordinator: Actor::new(coordinator.id, coordinator.role),
            nurse: Actor::new(nurse.id, nurse.role),
            carer: Actor::new(carer.id, carer.role),
            conn,
        }
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn new_shift(assignee: &Actor, date: NaiveDate) -> NewShift {
        NewShift {
            date,
            start_time: hm(8, 0),
            end_time: hm(16, 0),
            assigned_to: assignee.id,
            resident_id: None,
            notes: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    #[test]
    fn shift_type_by_start_hour() {
        assert_eq!(shift_type(hm(5, 0)), ShiftType::Morning);
        assert_eq!(shift_type(hm(12, 59)), ShiftType::Morning);
        assert_eq!(shift_type(hm(13, 0)), ShiftType::Afternoon);
        assert_eq!(shift_type(hm(20, 30)), ShiftType::Afternoon);
        assert_eq!(shift_type(hm(21, 0)), ShiftType::Night);
        assert_eq!(shift_type(hm(4, 59)), ShiftType::Night);
    }

    #[test]
    fn nurse_duration_wraps_past_midnight() {
        let start = Utc.with_ymd_and_hms(2024, 5, 10, 23, 50, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 11, 0, 10, 0).unwrap();
        assert_eq!(worked_minutes(Role::Nurse, start, end), 20);
        assert_eq!(worked_minutes(Role::Carer, start, end), 20);
    }

    #[test]
    fn carer_duration_uses_full_timestamps() {
        let start = Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap();
        assert_eq!(worked_minutes(Role::Carer, start, start + Duration::minutes(47)), 47);
        assert_eq!(worked_minutes(Role::Carer, start, start + Duration::hours(25)), 1500);
        assert_eq!(worked_minutes(Role::Carer, start, start + Duration::seconds(90)), 2);
    }

    #[test]
    fn create_notifies_assignee_in_same_write() {
        let r = rota();
        let shift = create_shift(&r.conn, &r.coordinator, new_shift(&r.carer, today()), Utc::now()).unwrap();
        assert_eq!(shift.status, ShiftStatus::Scheduled);

        let inbox = repository::list_notifications(&r.conn, &r.carer.id, false).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].notification_type, NotificationType::ShiftAssigned);
        assert_eq!(inbox[0].link.as_deref(), Some(format!("/shifts/{}", shift.id).as_str()));
    }

    #[test]
    fn create_rejects_bad_assignee_and_times() {
        let r = rota();
        let mut input = new_shift(&r.coordinator, today());
        assert!(matches!(
            create_shift(&r.conn, &r.coordinator, input.clone(), Utc::now()),
            Err(ServiceError::Validation(_))
        ));
        input.assigned_to = r.nurse.id;
        input.end_time = input.start_time;
        assert!(matches!(
            create_shift(&r.conn, &r.coordinator, input, Utc::now()),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            create_shift(&r.conn, &r.nurse, new_shift(&r.nurse, today()), Utc::now()),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn carer_shift_runs_47_minutes() {
        let r = rota();
        let shift = create_shift(&r.conn, &r.coordinator, new_shift(&r.carer, today()), Utc::now()).unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 10, 8, 2, 0).unwrap();

        let started = start_shift(&r.conn, &r.carer, &shift.id, t0).unwrap();
        assert_eq!(started.status, ShiftStatus::InProgress);

        let done = complete_shift(&r.conn, &r.carer, &shift.id, t0 + Duration::minutes(47)).unwrap();
        assert_eq!(done.duration.as_deref(), Some("47 min"));

        let stored = repository::get_shift(&r.conn, &shift.id).unwrap().unwrap();
        assert_eq!(stored.status, ShiftStatus::Completed);
        assert_eq!(stored.duration_minutes, Some(47));
        assert_eq!(stored.duration.as_deref(), Some("47 min"));
    }

    #[test]
    fn nurse_night_shift_crossing_midnight() {
        let r = rota();
        let mut input = new_shift(&r.nurse, today());
        input.start_time = hm(23, 50);
        input.end_time = hm(0, 10);
        let shift = create_shift(&r.conn, &r.coordinator, input, Utc::now()).unwrap();

        start_shift(&r.conn, &r.nurse, &shift.id, Utc.with_ymd_and_hms(2024, 5, 10, 23, 50, 0).unwrap()).unwrap();
        let done = complete_shift(
            &r.conn,
            &r.nurse,
            &shift.id,
            Utc.with_ymd_and_hms(2024, 5, 11, 0, 10, 0).unwrap(),
        )
        .unwrap();
        assert_eq!(done.duration.as_deref(), Some("20 min"));
    }

    #[test]
    fn complete_before_start_is_validation_error() {
        let r = rota();
        let shift = create_shift(&r.conn, &r.coordinator, new_shift(&r.carer, today()), Utc::now()).unwrap();
        let err = complete_shift(&r.conn, &r.carer, &shift.id, Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn lifecycle_requires_the_assignee() {
        let r = rota();
        let shift = create_shift(&r.conn, &r.coordinator, new_shift(&r.carer, today()), Utc::now()).unwrap();
        assert!(matches!(start_shift(&r.conn, &r.nurse, &shift.id, Utc::now()), Err(ServiceError::Forbidden(_))));
        assert!(matches!(
            start_shift(&r.conn, &r.coordinator, &shift.id, Utc::now()),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            start_shift(&r.conn, &r.carer, &Uuid::new_v4(), Utc::now()),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn terminal_states_are_not_left() {
        let r = rota();
        let shift = create_shift(&r.conn, &r.coordinator, new_shift(&r.carer, today()), Utc::now()).unwrap();
        let now = Utc::now();
        start_shift(&r.conn, &r.carer, &shift.id, now).unwrap();
        complete_shift(&r.conn, &r.carer, &shift.id, now + Duration::minutes(5)).unwrap();

        assert!(matches!(start_shift(&r.conn, &r.carer, &shift.id, now), Err(ServiceError::Conflict(_))));
        assert!(matches!(
            complete_shift(&r.conn, &r.carer, &shift.id, now + Duration::minutes(9)),
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(mark_missed(&r.conn, &r.coordinator, &shift.id, now), Err(ServiceError::Conflict(_))));
    }

    #[test]
    fn legacy_status_rows_still_transition() {
        let r = rota();
        let shift = create_shift(&r.conn, &r.coordinator, new_shift(&r.carer, today()), Utc::now()).unwrap();
        r.conn
            .execute("UPDATE shifts SET status = 'Scheduled' WHERE id = ?1", [shift.id.to_string()])
            .unwrap();
        let started = start_shift(&r.conn, &r.carer, &shift.id, Utc::now()).unwrap();
        assert_eq!(started.status, ShiftStatus::InProgress);
    }

    #[test]
    fn stale_transition_loses_with_conflict() {
        let r = rota();
        let shift = create_shift(&r.conn, &r.coordinator, new_shift(&r.carer, today()), Utc::now()).unwrap();
        let mut stale = shift.clone();
        mark_missed(&r.conn, &r.coordinator, &shift.id, Utc::now()).unwrap();

        stale.status = ShiftStatus::InProgress;
        stale.actual_start_time = Some(Utc::now());
        let err = commit_transition(&r.conn, &stale, ShiftStatus::Scheduled).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn assigned_lists_today_onwards_for_self_only() {
        let r = rota();
        let yesterday = today().pred_opt().unwrap();
        let tomorrow = today().succ_opt().unwrap();
        for date in [yesterday, today(), tomorrow] {
            create_shift(&r.conn, &r.coordinator, new_shift(&r.carer, date), Utc::now()).unwrap();
        }
        let upcoming = list_assigned(&r.conn, &r.carer, &r.carer.id, today()).unwrap();
        let dates: Vec<_> = upcoming.iter().map(|s| s.shift.date).collect();
        assert_eq!(dates, vec![today(), tomorrow]);
        assert_eq!(upcoming[0].shift_type, ShiftType::Morning);

        assert!(matches!(
            list_assigned(&r.conn, &r.nurse, &r.carer.id, today()),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            list_completed(&r.conn, &r.coordinator, &r.coordinator.id),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn reschedule_notifies_new_assignee_only_on_change() {
        let r = rota();
        let shift = create_shift(&r.conn, &r.coordinator, new_shift(&r.carer, today()), Utc::now()).unwrap();

        update_shift(
            &r.conn,
            &r.coordinator,
            &shift.id,
            ShiftPatch {
                notes: Some("bring keys".into()),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert!(repository::list_notifications(&r.conn, &r.nurse.id, false).unwrap().is_empty());

        let moved = update_shift(
            &r.conn,
            &r.coordinator,
            &shift.id,
            ShiftPatch {
                assigned_to: Some(r.nurse.id),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(moved.notes.as_deref(), Some("bring keys"));
        let inbox = repository::list_notifications(&r.conn, &r.nurse.id, false).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].notification_type, NotificationType::ShiftUpdated);
    }

    #[test]
    fn failed_notification_rolls_back_the_shift() {
        let r = rota();
        r.conn.execute_batch("DROP TABLE notifications").unwrap();
        assert!(create_shift(&r.conn, &r.coordinator, new_shift(&r.carer, today()), Utc::now()).is_err());
        assert!(repository::list_shifts(&r.conn, &ShiftFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn notes_filtered_by_author_role() {
        let r = rota();
        let resident = seed_resident(&r.conn, "Ada");
        let shift = create_shift(&r.conn, &r.coordinator, new_shift(&r.nurse, today()), Utc::now()).unwrap();
        for (actor, text) in [(&r.nurse, "BP stable"), (&r.carer, "Ate lunch")] {
            create_note(
                &r.conn,
                actor,
                NewShiftNote {
                    shift_id: shift.id,
                    resident_id: resident.id,
                    category_id: None,
                    content: text.into(),
                },
                Utc::now(),
            )
            .unwrap();
        }

        let nurse_notes = list_notes_by_shift(&r.conn, &r.coordinator, &shift.id, Some(Role::Nurse)).unwrap();
        assert_eq!(nurse_notes.len(), 1);
        assert_eq!(nurse_notes[0].content, "BP stable");
        assert_eq!(nurse_notes[0].author_role, Role::Nurse);
        assert_eq!(list_notes_by_shift(&r.conn, &r.coordinator, &shift.id, None).unwrap().len(), 2);
    }

    #[test]
    fn notes_edited_by_author_flagged_by_coordinator() {
        let r = rota();
        let resident = seed_resident(&r.conn, "Ada");
        let shift = create_shift(&r.conn, &r.coordinator, new_shift(&r.carer, today()), Utc::now()).unwrap();
        let note = create_note(
            &r.conn,
            &r.carer,
            NewShiftNote {
                shift_id: shift.id,
                resident_id: resident.id,
                category_id: None,
                content: "Refused meds".into(),
            },
            Utc::now(),
        )
        .unwrap();

        let edit = ShiftNotePatch {
            content: Some("Refused evening meds".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_note(&r.conn, &r.nurse, &note.id, edit.clone(), Utc::now()),
            Err(ServiceError::Forbidden(_))
        ));
        update_note(&r.conn, &r.carer, &note.id, edit, Utc::now()).unwrap();

        let flag = NoteFlag {
            flagged: true,
            comment: Some("Escalate to GP".into()),
        };
        assert!(matches!(
            flag_note(&r.conn, &r.carer, &note.id, flag.clone(), Utc::now()),
            Err(ServiceError::Forbidden(_))
        ));
        let flagged = flag_note(&r.conn, &r.coordinator, &note.id, flag, Utc::now()).unwrap();
        assert!(flagged.flagged);
        assert_eq!(flagged.flagged_by, Some(r.coordinator.id));
        assert_eq!(flagged.content, "Refused evening meds");
    }

    #[test]
    fn tasks_updated_by_assignee_only() {
        let r = rota();
        let task = create_task(
            &r.conn,
            &r.coordinator,
            NewTask {
                description: "Turn resident".into(),
                due_time: hm(10, 0),
                assigned_to: r.carer.id,
                shift_id: None,
                resident_id: None,
                notes: None,
            },
            Utc::now(),
        )
        .unwrap();
        let inbox = repository::list_notifications(&r.conn, &r.carer.id, false).unwrap();
        assert_eq!(inbox[0].notification_type, NotificationType::TaskAssigned);

        let done = TaskPatch {
            status: Some(TaskStatus::Completed),
            notes: None,
        };
        assert!(matches!(
            update_task(&r.conn, &r.nurse, &task.id, done.clone(), Utc::now()),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            update_task(&r.conn, &r.coordinator, &task.id, done.clone(), Utc::now()),
            Err(ServiceError::Forbidden(_))
        ));
        let updated = update_task(&r.conn, &r.carer, &task.id, done, Utc::now()).unwrap();
        assert_eq!(updated.status, TaskStatus::Completed);

        assert!(list_tasks(&r.conn, &r.nurse, &TaskFilter::default()).unwrap().is_empty());
        assert_eq!(list_tasks(&r.conn, &r.coordinator, &TaskFilter::default()).unwrap().len(), 1);
    }
}
