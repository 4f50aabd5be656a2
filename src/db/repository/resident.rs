use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{collect_rows, enum_at, json_at, opt_uuid_at, to_json, uuid_at};
use crate::db::DatabaseError;
use crate::models::enums::FamilyStatus;
use crate::models::{Family, Resident};

const RESIDENT_COLUMNS: &str = "id, user_id, full_name, gender, date_of_birth, room_number,
     allergies, dietary_preference, medical_conditions, medical_history,
     emergency_contacts, photo_url, created_at, updated_at";

fn resident_from_row(row: &Row<'_>) -> rusqlite::Result<Resident> {
    Ok(Resident {
        id: uuid_at(row, 0)?,
        user_id: opt_uuid_at(row, 1)?,
        full_name: row.get(2)?,
        gender: row.get(3)?,
        date_of_birth: row.get(4)?,
        room_number: row.get(5)?,
        allergies: row.get(6)?,
        dietary_preference: row.get(7)?,
        medical_conditions: json_at(row, 8)?,
        medical_history: row.get(9)?,
        emergency_contacts: json_at(row, 10)?,
        photo_url: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub fn insert_resident(conn: &Connection, resident: &Resident) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO residents ({RESIDENT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            resident.id.to_string(),
            resident.user_id.map(|id| id.to_string()),
            resident.full_name,
            resident.gender,
            resident.date_of_birth,
            resident.room_number,
            resident.allergies,
            resident.dietary_preference,
            to_json(&resident.medical_conditions)?,
            resident.medical_history,
            to_json(&resident.emergency_contacts)?,
            resident.photo_url,
            resident.created_at,
            resident.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_resident(conn: &Connection, id: &Uuid) -> Result<Option<Resident>, DatabaseError> {
    let resident = conn
        .query_row(
            &format!("SELECT {RESIDENT_COLUMNS} FROM residents WHERE id = ?1"),
            params![id.to_string()],
            resident_from_row,
        )
        .optional()?;
    Ok(resident)
}

/// The resident record owned by a resident login account.
pub fn get_resident_by_user(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Option<Resident>, DatabaseError> {
    let resident = conn
        .query_row(
            &format!("SELECT {RESIDENT_COLUMNS} FROM residents WHERE user_id = ?1"),
            params![user_id.to_string()],
            resident_from_row,
        )
        .optional()?;
    Ok(resident)
}

pub fn list_residents(conn: &Connection) -> Result<Vec<Resident>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RESIDENT_COLUMNS} FROM residents ORDER BY full_name COLLATE NOCASE"
    ))?;
    let rows = stmt.query_map([], resident_from_row)?;
    collect_rows(rows)
}

/// Most recently admitted residents first.
pub fn recent_residents(conn: &Connection, limit: usize) -> Result<Vec<Resident>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RESIDENT_COLUMNS} FROM residents ORDER BY created_at DESC LIMIT ?1"
    ))?;
    let rows = stmt.query_map(params![limit as i64], resident_from_row)?;
    collect_rows(rows)
}

pub fn update_resident(conn: &Connection, resident: &Resident) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE residents SET user_id = ?1, full_name = ?2, gender = ?3, date_of_birth = ?4,
         room_number = ?5, allergies = ?6, dietary_preference = ?7, medical_conditions = ?8,
         medical_history = ?9, emergency_contacts = ?10, photo_url = ?11, updated_at = ?12
         WHERE id = ?13",
        params![
            resident.user_id.map(|id| id.to_string()),
            resident.full_name,
            resident.gender,
            resident.date_of_birth,
            resident.room_number,
            resident.allergies,
            resident.dietary_preference,
            to_json(&resident.medical_conditions)?,
            resident.medical_history,
            to_json(&resident.emergency_contacts)?,
            resident.photo_url,
            resident.updated_at,
            resident.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Resident", resident.id));
    }
    Ok(())
}

pub fn delete_resident(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM residents WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

// ── Families ────────────────────────────────────────────────

const FAMILY_COLUMNS: &str = "id, user_id, resident_id, relationship, status, created_at, updated_at";

fn family_from_row(row: &Row<'_>) -> rusqlite::Result<Family> {
    Ok(Family {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        resident_id: opt_uuid_at(row, 2)?,
        relationship: row.get(3)?,
        status: enum_at(row, 4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub fn insert_family(conn: &Connection, family: &Family) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO families ({FAMILY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            family.id.to_string(),
            family.user_id.to_string(),
            family.resident_id.map(|id| id.to_string()),
            family.relationship,
            family.status.as_str(),
            family.created_at,
            family.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_family(conn: &Connection, id: &Uuid) -> Result<Option<Family>, DatabaseError> {
    let family = conn
        .query_row(
            &format!("SELECT {FAMILY_COLUMNS} FROM families WHERE id = ?1"),
            params![id.to_string()],
            family_from_row,
        )
        .optional()?;
    Ok(family)
}

pub fn get_family_by_user(conn: &Connection, user_id: &Uuid) -> Result<Option<Family>, DatabaseError> {
    let family = conn
        .query_row(
            &format!("SELECT {FAMILY_COLUMNS} FROM families WHERE user_id = ?1"),
            params![user_id.to_string()],
            family_from_row,
        )
        .optional()?;
    Ok(family)
}

pub fn list_families(
    conn: &Connection,
    status: Option<FamilyStatus>,
) -> Result<Vec<Family>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FAMILY_COLUMNS} FROM families
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![status.map(|s| s.as_str())], family_from_row)?;
    collect_rows(rows)
}

/// Approved family members linked to a resident.
pub fn list_families_for_resident(
    conn: &Connection,
    resident_id: &Uuid,
) -> Result<Vec<Family>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FAMILY_COLUMNS} FROM families WHERE resident_id = ?1"
    ))?;
    let rows = stmt.query_map(params![resident_id.to_string()], family_from_row)?;
    collect_rows(rows)
}

pub fn update_family(conn: &Connection, family: &Family) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE families SET resident_id = ?1, relationship = ?2, status = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            family.resident_id.map(|id| id.to_string()),
            family.relationship,
            family.status.as_str(),
            family.updated_at,
            family.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Family", family.id));
    }
    Ok(())
}

pub fn delete_family(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM families WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::insert_user;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::Role;
    use crate::models::{EmergencyContact, User};
    use chrono::{NaiveDate, Utc};

    fn sample_resident(name: &str) -> Resident {
        let now = Utc::now();
        Resident {
            id: Uuid::new_v4(),
            user_id: None,
            full_name: name.into(),
            gender: Some("male".into()),
            date_of_birth: NaiveDate::from_ymd_opt(1941, 7, 9),
            room_number: Some("3".into()),
            allergies: Some("penicillin".into()),
            dietary_preference: None,
            medical_conditions: vec!["hypertension".into(), "copd".into()],
            medical_history: Some("Hip replacement 2019".into()),
            emergency_contacts: vec![EmergencyContact {
                name: "June".into(),
                relationship: Some("daughter".into()),
                phone: "555-0199".into(),
            }],
            photo_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn family_user(conn: &Connection) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "June".into(),
            email: format!("{}@example.com", Uuid::new_v4()),
            password_hash: None,
            role: Role::Family,
            phone: None,
            profile_picture: None,
            is_active: true,
            password_set: true,
            created_at: now,
            updated_at: now,
        };
        insert_user(conn, &user).unwrap();
        user
    }

    #[test]
    fn resident_round_trip_preserves_lists() {
        let conn = open_memory_database().unwrap();
        let resident = sample_resident("Arthur Dent");
        insert_resident(&conn, &resident).unwrap();

        let loaded = get_resident(&conn, &resident.id).unwrap().unwrap();
        assert_eq!(loaded.medical_conditions, resident.medical_conditions);
        assert_eq!(loaded.emergency_contacts, resident.emergency_contacts);
        assert_eq!(loaded.date_of_birth, resident.date_of_birth);
    }

    #[test]
    fn residents_listed_by_name() {
        let conn = open_memory_database().unwrap();
        insert_resident(&conn, &sample_resident("zelda")).unwrap();
        insert_resident(&conn, &sample_resident("Alma")).unwrap();
        let names: Vec<_> = list_residents(&conn)
            .unwrap()
            .into_iter()
            .map(|r| r.full_name)
            .collect();
        assert_eq!(names, vec!["Alma", "zelda"]);
    }

    #[test]
    fn approved_family_requires_resident() {
        let conn = open_memory_database().unwrap();
        let user = family_user(&conn);
        let now = Utc::now();
        let family = Family {
            id: Uuid::new_v4(),
            user_id: user.id,
            resident_id: None,
            relationship: None,
            status: FamilyStatus::Approved,
            created_at: now,
            updated_at: now,
        };
        assert!(insert_family(&conn, &family).is_err());
    }

    #[test]
    fn deleting_user_cascades_to_family() {
        let conn = open_memory_database().unwrap();
        let user = family_user(&conn);
        let now = Utc::now();
        let family = Family {
            id: Uuid::new_v4(),
            user_id: user.id,
            resident_id: None,
            relationship: Some("son".into()),
            status: FamilyStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        insert_family(&conn, &family).unwrap();
        crate::db::repository::delete_user(&conn, &user.id).unwrap();
        assert!(get_family(&conn, &family.id).unwrap().is_none());
    }
}
