//! Management dashboard, `/api/admin/analytics`.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::access::Actor;
use crate::analytics::{self, Activity, Dashboard, IncidentSummary, MonthBucket};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;

pub async fn dashboard(State(ctx): State<ApiContext>, Extension(actor): Extension<Actor>) -> Result<Json<Dashboard>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(analytics::dashboard(&conn, &actor, Utc::now())?))
}

pub async fn recent_activity(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<Activity>>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(analytics::recent_activity(&conn, &actor)?))
}

#[derive(Deserialize)]
pub struct SignupQuery {
    pub year: Option<i32>,
}

/// Twelve buckets of new accounts, defaulting to the current year.
pub async fn signups(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<SignupQuery>,
) -> Result<Json<Vec<MonthBucket>>, ApiError> {
    let conn = ctx.core.db()?;
    let buckets = match query.year {
        Some(year) => analytics::monthly_signups(&conn, &actor, year)?,
        None => analytics::signups_this_year(&conn, &actor, Utc::now())?,
    };
    Ok(Json(buckets))
}

pub async fn incident_summary(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<IncidentSummary>, ApiError> {
    let conn = ctx.core.db()?;
    Ok(Json(analytics::incident_summary(&conn, &actor)?))
}
