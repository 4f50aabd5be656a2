//! Incident reports and feedback.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::access::Actor;
use crate::api::error::ApiError;
use crate::api::types::{created, parse_id, ApiContext, Created};
use crate::models::enums::{FeedbackStatus, IncidentStatus};
use crate::models::{Feedback, FeedbackResponse, Incident, IncidentPatch, NewFeedback, NewIncident};
use crate::reports;

#[derive(Deserialize)]
pub struct IncidentQuery {
    pub status: Option<IncidentStatus>,
}

pub async fn list_incidents(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<IncidentQuery>,
) -> Result<Json<Vec<Incident>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(reports::list_incidents(&conn, &actor, query.status)?))
}

pub async fn report_incident(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<NewIncident>,
) -> Result<Created<Incident>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(created(reports::report_incident(&conn, &actor, input, Utc::now())?))
}

pub async fn incident_detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Incident>, ApiError> {
    let id = parse_id(&id, "incident")?;
    let conn = ctx.core.db()?;
    Ok(Json(reports::get_incident(&conn, &actor, &id)?))
}

pub async fn update_incident(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(patch): Json<IncidentPatch>,
) -> Result<Json<Incident>, ApiError> {
    let id = parse_id(&id, "incident")?;
    let conn = ctx.core.db()?;
    Ok(Json(reports::update_incident(&conn, &actor, &id, patch, Utc::now())?))
}

pub async fn delete_incident(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "incident")?;
    let conn = ctx.core.db()?;
    reports::delete_incident(&conn, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct FeedbackQuery {
    pub status: Option<FeedbackStatus>,
}

pub async fn list_feedback(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<FeedbackQuery>,
) -> Result<Json<Vec<Feedback>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(reports::list_feedback(&conn, &actor, query.status)?))
}

pub async fn submit_feedback(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<NewFeedback>,
) -> Result<Created<Feedback>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(created(reports::submit_feedback(&conn, &actor, input, Utc::now())?))
}

pub async fn feedback_detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Feedback>, ApiError> {
    let id = parse_id(&id, "feedback")?;
    let conn = ctx.core.db()?;
    Ok(Json(reports::get_feedback(&conn, &actor, &id)?))
}

pub async fn respond_to_feedback(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(input): Json<FeedbackResponse>,
) -> Result<Json<Feedback>, ApiError> {
    let id = parse_id(&id, "feedback")?;
    let conn = ctx.core.db()?;
    Ok(Json(reports::respond_to_feedback(&conn, &actor, &id, input, Utc::now())?))
}

pub async fn delete_feedback(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "feedback")?;
    let conn = ctx.core.db()?;
    reports::delete_feedback(&conn, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
