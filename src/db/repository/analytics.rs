//! Read-only aggregate queries backing the dashboard.

use std::str::FromStr;

use rusqlite::{params, Connection};

use super::{collect_rows, enum_at};
use crate::db::DatabaseError;
use crate::models::enums::{FamilyStatus, FeedbackStatus, IncidentStatus, Role, VisitStatus};

fn count_grouped<T>(conn: &Connection, sql: &str) -> Result<Vec<(T, i64)>, DatabaseError>
where
    T: FromStr<Err = DatabaseError>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| Ok((enum_at::<T>(row, 0)?, row.get::<_, i64>(1)?)))?;
    collect_rows(rows)
}

pub fn count_residents(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM residents", [], |row| row.get(0))?;
    Ok(count)
}

pub fn count_users_by_role(conn: &Connection) -> Result<Vec<(Role, i64)>, DatabaseError> {
    count_grouped(conn, "SELECT role, COUNT(*) FROM users GROUP BY role")
}

pub fn count_incidents_by_status(conn: &Connection) -> Result<Vec<(IncidentStatus, i64)>, DatabaseError> {
    count_grouped(conn, "SELECT status, COUNT(*) FROM incidents GROUP BY status")
}

pub fn count_families_by_status(conn: &Connection) -> Result<Vec<(FamilyStatus, i64)>, DatabaseError> {
    count_grouped(conn, "SELECT status, COUNT(*) FROM families GROUP BY status")
}

pub fn count_visits_by_status(conn: &Connection) -> Result<Vec<(VisitStatus, i64)>, DatabaseError> {
    count_grouped(conn, "SELECT status, COUNT(*) FROM visit_requests GROUP BY status")
}

pub fn count_feedback_by_status(conn: &Connection) -> Result<Vec<(FeedbackStatus, i64)>, DatabaseError> {
    count_grouped(conn, "SELECT status, COUNT(*) FROM feedback GROUP BY status")
}

/// Users created in `year`, as (month 1..=12, count) for months with signups.
///
/// Timestamps are stored as `YYYY-MM-DD HH:MM:SS...`, so the month is read
/// straight from the text.
pub fn count_signups_by_month(conn: &Connection, year: i32) -> Result<Vec<(u32, i64)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT CAST(substr(created_at, 6, 2) AS INTEGER) AS month, COUNT(*)
         FROM users WHERE substr(created_at, 1, 4) = ?1
         GROUP BY month ORDER BY month",
    )?;
    let rows = stmt.query_map(params![format!("{year:04}")], |row| {
        Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?))
    })?;
    collect_rows(rows)
}
