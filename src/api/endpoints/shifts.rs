//! Rota, shift lifecycle, shift notes and tasks.
//!
//! Management (`/api/coordinator`) plans shifts and tasks and flags notes;
//! care staff (`/api/staff`) start and complete their own shifts and write
//! notes against them.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::access::Actor;
use crate::api::error::ApiError;
use crate::api::types::{created, parse_id, ApiContext, Created};
use crate::db::repository::{ShiftFilter, TaskFilter};
use crate::models::enums::{Role, ShiftStatus};
use crate::models::{
    NewShift, NewShiftNote, NewTask, NoteFlag, Shift, ShiftNote, ShiftNotePatch, ShiftPatch, Task, TaskPatch,
};
use crate::shifts::{self, AssignedShift};

// ═══════════════════════════════════════════════════════════
// Rota
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct ShiftQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub assigned_to: Option<Uuid>,
    pub resident_id: Option<Uuid>,
    pub status: Option<ShiftStatus>,
}

impl From<ShiftQuery> for ShiftFilter {
    fn from(q: ShiftQuery) -> Self {
        ShiftFilter {
            from: q.from,
            to: q.to,
            assigned_to: q.assigned_to,
            resident_id: q.resident_id,
            status: q.status,
        }
    }
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ShiftQuery>,
) -> Result<Json<Vec<Shift>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(shifts::list_shifts(&conn, &actor, &query.into())?))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<NewShift>,
) -> Result<Created<Shift>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(created(shifts::create_shift(&conn, &actor, input, Utc::now())?))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Shift>, ApiError> {
    let id = parse_id(&id, "shift")?;
    let conn = ctx.core.db()?;
    Ok(Json(shifts::get_shift(&conn, &actor, &id)?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(patch): Json<ShiftPatch>,
) -> Result<Json<Shift>, ApiError> {
    let id = parse_id(&id, "shift")?;
    let conn = ctx.core.db()?;
    Ok(Json(shifts::update_shift(&conn, &actor, &id, patch, Utc::now())?))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "shift")?;
    let conn = ctx.core.db()?;
    shifts::delete_shift(&conn, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_missed(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Shift>, ApiError> {
    let id = parse_id(&id, "shift")?;
    let conn = ctx.core.db()?;
    Ok(Json(shifts::mark_missed(&conn, &actor, &id, Utc::now())?))
}

// ═══════════════════════════════════════════════════════════
// Own shifts
// ═══════════════════════════════════════════════════════════

pub async fn assigned(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<AssignedShift>>, ApiError> {
    let conn = ctx.core.db()?;
    let today = Utc::now().date_naive();
    Ok(Json(shifts::list_assigned(&conn, &actor, &actor.id, today)?))
}

pub async fn completed(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<AssignedShift>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(shifts::list_completed(&conn, &actor, &actor.id)?))
}

pub async fn start(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Shift>, ApiError> {
    let id = parse_id(&id, "shift")?;
    let conn = ctx.core.db()?;
    Ok(Json(shifts::start_shift(&conn, &actor, &id, Utc::now())?))
}

pub async fn complete(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Shift>, ApiError> {
    let id = parse_id(&id, "shift")?;
    let conn = ctx.core.db()?;
    Ok(Json(shifts::complete_shift(&conn, &actor, &id, Utc::now())?))
}

// ═══════════════════════════════════════════════════════════
// Shift notes
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct NoteQuery {
    pub role: Option<Role>,
}

pub async fn shift_notes(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Query(query): Query<NoteQuery>,
) -> Result<Json<Vec<ShiftNote>>, ApiError> {
    let id = parse_id(&id, "shift")?;
    let conn = ctx.core.db()?;
    Ok(Json(shifts::list_notes_by_shift(&conn, &actor, &id, query.role)?))
}

pub async fn resident_notes(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ShiftNote>>, ApiError> {
    let id = parse_id(&id, "resident")?;
    let conn = ctx.core.db()?;
    Ok(Json(shifts::list_notes_by_resident(&conn, &actor, &id)?))
}

pub async fn create_note(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<NewShiftNote>,
) -> Result<Created<ShiftNote>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(created(shifts::create_note(&conn, &actor, input, Utc::now())?))
}

pub async fn update_note(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(patch): Json<ShiftNotePatch>,
) -> Result<Json<ShiftNote>, ApiError> {
    let id = parse_id(&id, "note")?;
    let conn = ctx.core.db()?;
    Ok(Json(shifts::update_note(&conn, &actor, &id, patch, Utc::now())?))
}

pub async fn flag_note(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(flag): Json<NoteFlag>,
) -> Result<Json<ShiftNote>, ApiError> {
    let id = parse_id(&id, "note")?;
    let conn = ctx.core.db()?;
    Ok(Json(shifts::flag_note(&conn, &actor, &id, flag, Utc::now())?))
}

pub async fn delete_note(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "note")?;
    let conn = ctx.core.db()?;
    shifts::delete_note(&conn, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ═══════════════════════════════════════════════════════════
// Tasks
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct TaskQuery {
    pub shift_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
}

pub async fn list_tasks(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let filter = TaskFilter {
        shift_id: query.shift_id,
        assigned_to: query.assigned_to,
    };
    let conn = ctx.core.db()?;
    Ok(Json(shifts::list_tasks(&conn, &actor, &filter)?))
}

pub async fn create_task(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<NewTask>,
) -> Result<Created<Task>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(created(shifts::create_task(&conn, &actor, input, Utc::now())?))
}

pub async fn task_detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let id = parse_id(&id, "task")?;
    let conn = ctx.core.db()?;
    Ok(Json(shifts::get_task(&conn, &actor, &id)?))
}

pub async fn update_task(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>, ApiError> {
    let id = parse_id(&id, "task")?;
    let conn = ctx.core.db()?;
    Ok(Json(shifts::update_task(&conn, &actor, &id, patch, Utc::now())?))
}

pub async fn delete_task(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "task")?;
    let conn = ctx.core.db()?;
    shifts::delete_task(&conn, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
