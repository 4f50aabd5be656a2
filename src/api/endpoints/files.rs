//! Document library endpoints.
//!
//! - `GET /api/shared/files`: list, optional `resident_id`
//! - `POST /api/shared/files`: multipart upload: `file` plus `title`,
//!   `file_type`, `resident_id`, `roles_allowed` (comma separated), `notes`
//! - `GET|PATCH|DELETE /api/shared/files/:id`

use std::collections::HashMap;
use std::str::FromStr;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::access::Actor;
use crate::api::error::ApiError;
use crate::api::types::{created, parse_id, ApiContext, Created};
use crate::files::{self, Upload};
use crate::models::enums::Role;
use crate::models::{FilePatch, FileRecord, NewFileMeta};

/// A parsed multipart body: the first file part and every text field.
pub struct MultipartForm {
    pub file: Option<Upload>,
    pub fields: HashMap<String, String>,
}

pub async fn read_multipart(mut multipart: Multipart) -> Result<MultipartForm, ApiError> {
    let mut form = MultipartForm {
        file: None,
        fields: HashMap::new(),
    };
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) if form.file.is_none() => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;
                form.file = Some(Upload {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            Some(_) => return Err(ApiError::BadRequest("Only one file per upload".into())),
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read field {name}: {e}")))?;
                form.fields.insert(name, text);
            }
        }
    }
    Ok(form)
}

fn parse_roles(raw: &str) -> Result<Vec<Role>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Role::from_str(s).map_err(|_| ApiError::BadRequest(format!("Unknown role: {s}"))))
        .collect()
}

fn meta_from_fields(fields: &mut HashMap<String, String>) -> Result<NewFileMeta, ApiError> {
    let mut take = |key: &str| fields.remove(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    Ok(NewFileMeta {
        title: take("title").unwrap_or_default(),
        file_type: take("file_type"),
        resident_id: take("resident_id").map(|raw| parse_id(&raw, "resident")).transpose()?,
        roles_allowed: match take("roles_allowed") {
            Some(raw) => parse_roles(&raw)?,
            None => Vec::new(),
        },
        notes: take("notes"),
    })
}

#[derive(Deserialize)]
pub struct FileQuery {
    pub resident_id: Option<Uuid>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<FileQuery>,
) -> Result<Json<Vec<FileRecord>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(files::list_files(&conn, &actor, query.resident_id)?))
}

pub async fn upload(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    multipart: Multipart,
) -> Result<Created<FileRecord>, ApiError> {
    let mut form = read_multipart(multipart).await?;
    let upload = form.file.ok_or_else(|| ApiError::BadRequest("Missing file field".into()))?;
    let meta = meta_from_fields(&mut form.fields)?;
    let record = files::upload_file(&ctx.core, &actor, meta, upload, Utc::now()).await?;
    Ok(created(record))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<FileRecord>, ApiError> {
    let id = parse_id(&id, "file")?;
    let conn = ctx.core.db()?;
    Ok(Json(files::get_file(&conn, &actor, &id)?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(patch): Json<FilePatch>,
) -> Result<Json<FileRecord>, ApiError> {
    let id = parse_id(&id, "file")?;
    let conn = ctx.core.db()?;
    Ok(Json(files::update_file(&conn, &actor, &id, patch, Utc::now())?))
}

pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "file")?;
    files::delete_file(&ctx.core, &actor, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
