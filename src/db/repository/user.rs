use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{collect_rows, enum_at, uuid_at};
use crate::db::DatabaseError;
use crate::models::enums::Role;
use crate::models::User;

const USER_COLUMNS: &str = "id, name, email, password_hash, role, phone, profile_picture,
     is_active, password_set, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: enum_at(row, 4)?,
        phone: row.get(5)?,
        profile_picture: row.get(6)?,
        is_active: row.get(7)?,
        password_set: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
        params![
            user.id.to_string(),
            user.name,
            user.email,
            user.password_hash,
            user.role.as_str(),
            user.phone,
            user.profile_picture,
            user.is_active,
            user.password_set,
            user.created_at,
            user.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.to_string()],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

/// Lookup by already-normalised email.
pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            params![email],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn list_users(conn: &Connection, role: Option<Role>) -> Result<Vec<User>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users
         WHERE (?1 IS NULL OR role = ?1)
         ORDER BY name COLLATE NOCASE"
    ))?;
    let rows = stmt.query_map(params![role.map(|r| r.as_str())], user_from_row)?;
    collect_rows(rows)
}

/// Rewrite every mutable column of an existing user.
pub fn update_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE users SET name = ?1, email = ?2, password_hash = ?3, role = ?4, phone = ?5,
         profile_picture = ?6, is_active = ?7, password_set = ?8, updated_at = ?9
         WHERE id = ?10",
        params![
            user.name,
            user.email,
            user.password_hash,
            user.role.as_str(),
            user.phone,
            user.profile_picture,
            user.is_active,
            user.password_set,
            user.updated_at,
            user.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("User", user.id));
    }
    Ok(())
}

pub fn delete_user(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

/// Shifts, tasks, notes, messages, feedback and visit requests that name the user.
pub fn count_user_references(conn: &Connection, id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM shifts WHERE assigned_to = ?1)
              + (SELECT COUNT(*) FROM tasks WHERE assigned_to = ?1)
              + (SELECT COUNT(*) FROM shift_notes WHERE author_id = ?1)
              + (SELECT COUNT(*) FROM messages WHERE sender_id = ?1 OR receiver_id = ?1)
              + (SELECT COUNT(*) FROM feedback WHERE submitted_by = ?1)
              + (SELECT COUNT(*) FROM visit_requests WHERE requested_by = ?1)",
        params![id.to_string()],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}
