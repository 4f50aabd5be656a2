//! Residents and family links.
//!
//! Admin manages residents and approves family accounts; staff read;
//! residents and families reach only their own resident.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::access::Actor;
use crate::api::endpoints::files::read_multipart;
use crate::api::error::ApiError;
use crate::api::types::{created, parse_id, ApiContext, Created};
use crate::files;
use crate::models::enums::FamilyStatus;
use crate::models::{Family, NewResident, Resident, ResidentPatch};
use crate::residents::{self, FamilyEntry};

// ═══════════════════════════════════════════════════════════
// Residents
// ═══════════════════════════════════════════════════════════

pub async fn list(State(ctx): State<ApiContext>, Extension(actor): Extension<Actor>) -> Result<Json<Vec<Resident>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(residents::list_residents(&conn, &actor)?))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Resident>, ApiError> {
    let id = parse_id(&id, "resident")?;
    let conn = ctx.core.db()?;
    Ok(Json(residents::get_resident(&conn, &actor, &id)?))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<NewResident>,
) -> Result<Created<Resident>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(created(residents::create_resident(&conn, &actor, input, Utc::now())?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(patch): Json<ResidentPatch>,
) -> Result<Json<Resident>, ApiError> {
    let id = parse_id(&id, "resident")?;
    let conn = ctx.core.db()?;
    Ok(Json(residents::update_resident(&conn, &actor, &id, patch, Utc::now())?))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "resident")?;
    let conn = ctx.core.db()?;
    residents::delete_resident(&conn, &actor, &id, Utc::now())?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_photo(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Json<Resident>, ApiError> {
    let id = parse_id(&id, "resident")?;
    let form = read_multipart(multipart).await?;
    let upload = form.file.ok_or_else(|| ApiError::BadRequest("Missing file field".into()))?;
    Ok(Json(files::set_resident_photo(&ctx.core, &actor, &id, upload, Utc::now()).await?))
}

/// `GET /api/resident/me`: the caller's own resident record.
pub async fn own_record(State(ctx): State<ApiContext>, Extension(actor): Extension<Actor>) -> Result<Json<Resident>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(residents::own_record(&conn, &actor)?))
}

// ═══════════════════════════════════════════════════════════
// Family links
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct FamilyQuery {
    pub status: Option<FamilyStatus>,
}

pub async fn list_families(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<FamilyQuery>,
) -> Result<Json<Vec<FamilyEntry>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(residents::list_families(&conn, &actor, query.status)?))
}

#[derive(Deserialize)]
pub struct ApproveRequest {
    pub resident_id: Uuid,
}

pub async fn approve_family(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(request): Json<ApproveRequest>,
) -> Result<Json<Family>, ApiError> {
    let id = parse_id(&id, "family")?;
    let conn = ctx.core.db()?;
    Ok(Json(residents::approve_family(&conn, &actor, &id, &request.resident_id, Utc::now())?))
}

pub async fn reject_family(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "family")?;
    let conn = ctx.core.db()?;
    residents::reject_family(&conn, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/family/link`: the caller's family link and its status.
pub async fn own_family(State(ctx): State<ApiContext>, Extension(actor): Extension<Actor>) -> Result<Json<Family>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(residents::own_family(&conn, &actor)?))
}

/// `GET /api/family/resident`: the resident an approved family visits.
pub async fn linked_resident(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Resident>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(residents::get_linked_resident(&conn, &actor)?))
}
