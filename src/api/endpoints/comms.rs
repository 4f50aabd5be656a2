//! Messages, notifications and visit requests.
//!
//! Messages and notifications are available to every signed-in role under
//! `/api/shared`. Families request visits under `/api/family`; management
//! decides them under `/api/coordinator`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::access::Actor;
use crate::api::error::ApiError;
use crate::api::types::{created, parse_id, ApiContext, Created, Updated};
use crate::messaging::{self, Conversation, NewMessage, UnreadMessages};
use crate::models::enums::VisitStatus;
use crate::models::{Message, NewVisitRequest, Notification, VisitRequest};
use crate::notifications::{self, UnreadCount};
use crate::visits::{self, VisitDecision};

// ═══════════════════════════════════════════════════════════
// Messages
// ═══════════════════════════════════════════════════════════

pub async fn send_message(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<NewMessage>,
) -> Result<Created<Message>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(created(messaging::send(&conn, &actor, input, Utc::now())?))
}

pub async fn conversations(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(messaging::conversations(&conn, &actor)?))
}

/// `GET /api/shared/messages/with/:user_id`: both directions, oldest first.
pub async fn thread(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(other): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let other = parse_id(&other, "user")?;
    let conn = ctx.core.db()?;
    Ok(Json(messaging::thread(&conn, &actor, &other)?))
}

pub async fn read_thread(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(other): Path<String>,
) -> Result<Json<Updated>, ApiError> {
    let other = parse_id(&other, "user")?;
    let conn = ctx.core.db()?;
    let updated = messaging::mark_thread_read(&conn, &actor, &other)?;
    Ok(Json(Updated { updated }))
}

pub async fn unread_messages(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<UnreadMessages>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(messaging::unread_count(&conn, &actor)?))
}

pub async fn read_message(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Message>, ApiError> {
    let id = parse_id(&id, "message")?;
    let conn = ctx.core.db()?;
    Ok(Json(messaging::mark_read(&conn, &actor, &id)?))
}

// ═══════════════════════════════════════════════════════════
// Notifications
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

pub async fn list_notifications(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(notifications::list_for_user(&conn, &actor, query.unread)?))
}

pub async fn unread_notifications(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<UnreadCount>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(notifications::unread_count(&conn, &actor)?))
}

pub async fn read_notification(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Notification>, ApiError> {
    let id = parse_id(&id, "notification")?;
    let conn = ctx.core.db()?;
    Ok(Json(notifications::mark_as_read(&conn, &actor, &id)?))
}

pub async fn read_all_notifications(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Updated>, ApiError> {
    let conn = ctx.core.db()?;
    let updated = notifications::mark_all_read(&conn, &actor)?;
    Ok(Json(Updated { updated }))
}

pub async fn delete_notification(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "notification")?;
    let conn = ctx.core.db()?;
    notifications::delete(&conn, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ═══════════════════════════════════════════════════════════
// Visit requests
// ═══════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub struct VisitQuery {
    pub status: Option<VisitStatus>,
}

pub async fn list_visits(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<VisitQuery>,
) -> Result<Json<Vec<VisitRequest>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(visits::list_visits(&conn, &actor, query.status)?))
}

pub async fn request_visit(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<NewVisitRequest>,
) -> Result<Created<VisitRequest>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(created(visits::request_visit(&conn, &actor, input, Utc::now())?))
}

pub async fn decide_visit(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(decision): Json<VisitDecision>,
) -> Result<Json<VisitRequest>, ApiError> {
    let id = parse_id(&id, "visit request")?;
    let conn = ctx.core.db()?;
    Ok(Json(visits::decide_visit(&conn, &actor, &id, decision, Utc::now())?))
}

pub async fn cancel_visit(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "visit request")?;
    let conn = ctx.core.db()?;
    visits::cancel_visit(&conn, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
