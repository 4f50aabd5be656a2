//! Care plans, care forms, health records and note categories.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::access::{self, Actor};
use crate::api::error::ApiError;
use crate::api::types::{created, parse_id, ApiContext, Created};
use crate::care;
use crate::models::enums::CarePlanKind;
use crate::models::{
    CareFormPatch, CareFormTemplate, CarePlan, CarePlanPatch, FormAnswer, HealthRecord, HealthRecordPatch,
    NewCareForm, NewCarePlan, NewHealthRecord, NewNoteCategory, NoteCategory, NoteCategoryPatch,
};

#[derive(Deserialize)]
pub struct ResidentQuery {
    pub resident_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct PlanQuery {
    pub resident_id: Option<Uuid>,
    pub kind: Option<CarePlanKind>,
}

// ═══════════════════════════════════════════════════════════
// Care plans
// ═══════════════════════════════════════════════════════════

pub async fn list_plans(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<PlanQuery>,
) -> Result<Json<Vec<CarePlan>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(care::list_care_plans(&conn, &actor, query.resident_id, query.kind)?))
}

pub async fn create_plan(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<NewCarePlan>,
) -> Result<Created<CarePlan>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(created(care::create_care_plan(&conn, &actor, input, Utc::now())?))
}

pub async fn plan_detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<CarePlan>, ApiError> {
    let id = parse_id(&id, "care plan")?;
    let conn = ctx.core.db()?;
    Ok(Json(care::get_care_plan(&conn, &actor, &id)?))
}

pub async fn update_plan(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(patch): Json<CarePlanPatch>,
) -> Result<Json<CarePlan>, ApiError> {
    let id = parse_id(&id, "care plan")?;
    let conn = ctx.core.db()?;
    Ok(Json(care::update_care_plan(&conn, &actor, &id, patch, Utc::now())?))
}

pub async fn delete_plan(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "care plan")?;
    let conn = ctx.core.db()?;
    care::delete_care_plan(&conn, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ═══════════════════════════════════════════════════════════
// Care forms
// ═══════════════════════════════════════════════════════════

pub async fn list_forms(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ResidentQuery>,
) -> Result<Json<Vec<CareFormTemplate>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(care::list_care_forms(&conn, &actor, query.resident_id)?))
}

pub async fn create_form(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<NewCareForm>,
) -> Result<Created<CareFormTemplate>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(created(care::create_care_form(&conn, &actor, input, Utc::now())?))
}

pub async fn form_detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<CareFormTemplate>, ApiError> {
    let id = parse_id(&id, "care form")?;
    let conn = ctx.core.db()?;
    Ok(Json(care::get_care_form(&conn, &actor, &id)?))
}

pub async fn update_form(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(patch): Json<CareFormPatch>,
) -> Result<Json<CareFormTemplate>, ApiError> {
    let id = parse_id(&id, "care form")?;
    let conn = ctx.core.db()?;
    Ok(Json(care::update_care_form(&conn, &actor, &id, patch, Utc::now())?))
}

pub async fn delete_form(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "care form")?;
    let conn = ctx.core.db()?;
    care::delete_care_form(&conn, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct AnswerRequest {
    pub answers: Vec<FormAnswer>,
}

pub async fn submit_answers(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<CareFormTemplate>, ApiError> {
    let id = parse_id(&id, "care form")?;
    let conn = ctx.core.db()?;
    Ok(Json(care::submit_answers(&conn, &actor, &id, request.answers, Utc::now())?))
}

// ═══════════════════════════════════════════════════════════
// Health records
// ═══════════════════════════════════════════════════════════

/// Residents and families read their own resident's records without naming it.
pub async fn list_health_records(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ResidentQuery>,
) -> Result<Json<Vec<HealthRecord>>, ApiError> {
    let conn = ctx.core.db()?;
    let resident_id = match query.resident_id {
        Some(id) => id,
        None => access::scoped_resident(&conn, &actor)?
            .ok_or_else(|| ApiError::BadRequest("resident_id is required".into()))?,
    };
    Ok(Json(care::list_health_records(&conn, &actor, &resident_id)?))
}

pub async fn create_health_record(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<NewHealthRecord>,
) -> Result<Created<HealthRecord>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(created(care::create_health_record(&conn, &actor, input, Utc::now())?))
}

pub async fn health_record_detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<HealthRecord>, ApiError> {
    let id = parse_id(&id, "health record")?;
    let conn = ctx.core.db()?;
    Ok(Json(care::get_health_record(&conn, &actor, &id)?))
}

pub async fn update_health_record(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(patch): Json<HealthRecordPatch>,
) -> Result<Json<HealthRecord>, ApiError> {
    let id = parse_id(&id, "health record")?;
    let conn = ctx.core.db()?;
    Ok(Json(care::update_health_record(&conn, &actor, &id, patch, Utc::now())?))
}

pub async fn delete_health_record(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "health record")?;
    let conn = ctx.core.db()?;
    care::delete_health_record(&conn, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ═══════════════════════════════════════════════════════════
// Note categories
// ═══════════════════════════════════════════════════════════

pub async fn list_categories(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ResidentQuery>,
) -> Result<Json<Vec<NoteCategory>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(care::list_note_categories(&conn, &actor, query.resident_id)?))
}

pub async fn create_category(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<NewNoteCategory>,
) -> Result<Created<NoteCategory>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(created(care::create_note_category(&conn, &actor, input, Utc::now())?))
}

pub async fn update_category(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(patch): Json<NoteCategoryPatch>,
) -> Result<Json<NoteCategory>, ApiError> {
    let id = parse_id(&id, "note category")?;
    let conn = ctx.core.db()?;
    Ok(Json(care::update_note_category(&conn, &actor, &id, patch, Utc::now())?))
}

pub async fn delete_category(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "note category")?;
    let conn = ctx.core.db()?;
    care::delete_note_category(&conn, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
