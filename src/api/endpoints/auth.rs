//! Session and self-service endpoints.
//!
//! Public:
//! - `POST /api/auth/login`
//! - `POST /api/auth/set-password`: one-time bootstrap
//! - `POST /api/auth/register-family`
//!
//! Authenticated:
//! - `GET|PATCH /api/auth/me`
//! - `POST /api/auth/change-password`
//! - `POST /api/auth/me/picture`: multipart, field `file`

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Serialize;

use crate::access::Actor;
use crate::api::endpoints::files::read_multipart;
use crate::api::error::ApiError;
use crate::api::types::{created, ApiContext, Created};
use crate::auth::{self, Credentials, FamilyRegistration, LoginResponse, PasswordChange};
use crate::files;
use crate::models::{Family, ProfilePatch, User};

pub async fn login(
    State(ctx): State<ApiContext>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<LoginResponse>, ApiError> {
    Ok(Json(auth::login(&ctx.core, &credentials, Utc::now()).await?))
}

pub async fn set_password(
    State(ctx): State<ApiContext>,
    Json(credentials): Json<Credentials>,
) -> Result<StatusCode, ApiError> {
    auth::set_initial_password(&ctx.core, &credentials, Utc::now()).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct RegistrationResponse {
    pub user: User,
    pub family: Family,
}

pub async fn register_family(
    State(ctx): State<ApiContext>,
    Json(input): Json<FamilyRegistration>,
) -> Result<Created<RegistrationResponse>, ApiError> {
    let (user, family) = auth::register_family(&ctx.core, &input, Utc::now()).await?;
    Ok(created(RegistrationResponse { user, family }))
}

pub async fn me(State(ctx): State<ApiContext>, Extension(actor): Extension<Actor>) -> Result<Json<User>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(auth::me(&conn, &actor)?))
}

pub async fn update_me(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<User>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(auth::update_profile(&conn, &actor, patch, Utc::now())?))
}

pub async fn change_password(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Json(change): Json<PasswordChange>,
) -> Result<StatusCode, ApiError> {
    auth::change_password(&ctx.core, &actor, &change, Utc::now()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_picture(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    multipart: Multipart,
) -> Result<Json<User>, ApiError> {
    let form = read_multipart(multipart).await?;
    let upload = form.file.ok_or_else(|| ApiError::BadRequest("Missing file field".into()))?;
    Ok(Json(files::set_profile_picture(&ctx.core, &actor, upload, Utc::now()).await?))
}
