//! Account administration, `/api/admin/users`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::access::Actor;
use crate::api::error::ApiError;
use crate::api::types::{created, parse_id, ApiContext, Created};
use crate::auth;
use crate::messaging;
use crate::models::enums::Role;
use crate::models::{NewUser, User, UserPatch, UserSummary};

#[derive(Deserialize)]
pub struct UserQuery {
    pub role: Option<Role>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(auth::list_users(&conn, &actor, query.role)?))
}

pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<NewUser>,
) -> Result<Created<User>, ApiError> {
    let user = auth::create_user(&ctx.core, &actor, input, Utc::now()).await?;
    Ok(created(user))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id, "user")?;
    let conn = ctx.core.db()?;
    Ok(Json(auth::get_user(&conn, &actor, &id)?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id, "user")?;
    let conn = ctx.core.db()?;
    Ok(Json(auth::update_user(&conn, &actor, &id, patch, Utc::now())?))
}

pub async fn activate(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id, "user")?;
    let conn = ctx.core.db()?;
    Ok(Json(auth::set_active(&conn, &actor, &id, true, Utc::now())?))
}

pub async fn deactivate(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id, "user")?;
    let conn = ctx.core.db()?;
    Ok(Json(auth::set_active(&conn, &actor, &id, false, Utc::now())?))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "user")?;
    let conn = ctx.core.db()?;
    auth::delete_user(&conn, &actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/shared/contacts`: people the caller can message.
pub async fn contacts(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(messaging::contacts(&conn, &actor)?))
}
