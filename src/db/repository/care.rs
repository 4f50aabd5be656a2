use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{collect_rows, conversion_error, enum_at, json_at, to_json, uuid_at};
use crate::db::DatabaseError;
use crate::models::enums::CarePlanKind;
use crate::models::{CareFormTemplate, CarePlan, CarePlanBody, HealthRecord, NoteCategory};

// ── Care plans ──────────────────────────────────────────────

const PLAN_COLUMNS: &str = "id, resident_id, author_id, kind, body, created_at, updated_at";

fn plan_from_row(row: &Row<'_>) -> rusqlite::Result<CarePlan> {
    let kind: CarePlanKind = enum_at(row, 3)?;
    let body: CarePlanBody = json_at(row, 4)?;
    if body.kind() != kind {
        return Err(conversion_error(
            4,
            DatabaseError::ConstraintViolation(format!("care plan body does not match kind {kind}")),
        ));
    }
    Ok(CarePlan {
        id: uuid_at(row, 0)?,
        resident_id: uuid_at(row, 1)?,
        author_id: uuid_at(row, 2)?,
        body,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub fn insert_care_plan(conn: &Connection, plan: &CarePlan) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO care_plans ({PLAN_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            plan.id.to_string(),
            plan.resident_id.to_string(),
            plan.author_id.to_string(),
            plan.body.kind().as_str(),
            to_json(&plan.body)?,
            plan.created_at,
            plan.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_care_plan(conn: &Connection, id: &Uuid) -> Result<Option<CarePlan>, DatabaseError> {
    let plan = conn
        .query_row(
            &format!("SELECT {PLAN_COLUMNS} FROM care_plans WHERE id = ?1"),
            params![id.to_string()],
            plan_from_row,
        )
        .optional()?;
    Ok(plan)
}

pub fn list_care_plans(
    conn: &Connection,
    resident_id: Option<&Uuid>,
    kind: Option<CarePlanKind>,
) -> Result<Vec<CarePlan>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PLAN_COLUMNS} FROM care_plans
         WHERE (?1 IS NULL OR resident_id = ?1) AND (?2 IS NULL OR kind = ?2)
         ORDER BY updated_at DESC"
    ))?;
    let rows = stmt.query_map(
        params![resident_id.map(|id| id.to_string()), kind.map(|k| k.as_str())],
        plan_from_row,
    )?;
    collect_rows(rows)
}

pub fn update_care_plan(conn: &Connection, plan: &CarePlan) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE care_plans SET body = ?1, updated_at = ?2 WHERE id = ?3 AND kind = ?4",
        params![
            to_json(&plan.body)?,
            plan.updated_at,
            plan.id.to_string(),
            plan.body.kind().as_str(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("CarePlan", plan.id));
    }
    Ok(())
}

pub fn delete_care_plan(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM care_plans WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

// ── Care form templates ─────────────────────────────────────

const FORM_COLUMNS: &str = "id, title, description, roles_allowed, residents, questions,
     created_by, created_at, updated_at";

fn form_from_row(row: &Row<'_>) -> rusqlite::Result<CareFormTemplate> {
    Ok(CareFormTemplate {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        roles_allowed: json_at(row, 3)?,
        residents: json_at(row, 4)?,
        questions: json_at(row, 5)?,
        created_by: uuid_at(row, 6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub fn insert_care_form(conn: &Connection, form: &CareFormTemplate) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO care_form_templates ({FORM_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            form.id.to_string(),
            form.title,
            form.description,
            to_json(&form.roles_allowed)?,
            to_json(&form.residents)?,
            to_json(&form.questions)?,
            form.created_by.to_string(),
            form.created_at,
            form.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_care_form(conn: &Connection, id: &Uuid) -> Result<Option<CareFormTemplate>, DatabaseError> {
    let form = conn
        .query_row(
            &format!("SELECT {FORM_COLUMNS} FROM care_form_templates WHERE id = ?1"),
            params![id.to_string()],
            form_from_row,
        )
        .optional()?;
    Ok(form)
}

/// Every template; role visibility is applied by the caller.
pub fn list_care_forms(conn: &Connection) -> Result<Vec<CareFormTemplate>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {FORM_COLUMNS} FROM care_form_templates ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map([], form_from_row)?;
    collect_rows(rows)
}

pub fn update_care_form(conn: &Connection, form: &CareFormTemplate) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE care_form_templates SET title = ?1, description = ?2, roles_allowed = ?3,
         residents = ?4, questions = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            form.title,
            form.description,
            to_json(&form.roles_allowed)?,
            to_json(&form.residents)?,
            to_json(&form.questions)?,
            form.updated_at,
            form.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("CareFormTemplate", form.id));
    }
    Ok(())
}

pub fn delete_care_form(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM care_form_templates WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(changed > 0)
}

// ── Health records ──────────────────────────────────────────

const HEALTH_COLUMNS: &str = "id, resident_id, record_type, title, details, recorded_by,
     record_date, created_at, updated_at";

fn health_from_row(row: &Row<'_>) -> rusqlite::Result<HealthRecord> {
    Ok(HealthRecord {
        id: uuid_at(row, 0)?,
        resident_id: uuid_at(row, 1)?,
        record_type: enum_at(row, 2)?,
        title: row.get(3)?,
        details: row.get(4)?,
        recorded_by: uuid_at(row, 5)?,
        record_date: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

pub fn insert_health_record(conn: &Connection, record: &HealthRecord) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO health_records ({HEALTH_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            record.id.to_string(),
            record.resident_id.to_string(),
            record.record_type.as_str(),
            record.title,
            record.details,
            record.recorded_by.to_string(),
            record.record_date,
            record.created_at,
            record.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_health_record(conn: &Connection, id: &Uuid) -> Result<Option<HealthRecord>, DatabaseError> {
    let record = conn
        .query_row(
            &format!("SELECT {HEALTH_COLUMNS} FROM health_records WHERE id = ?1"),
            params![id.to_string()],
            health_from_row,
        )
        .optional()?;
    Ok(record)
}

/// Records of one resident, newest clinical date first.
pub fn list_health_records(
    conn: &Connection,
    resident_id: &Uuid,
) -> Result<Vec<HealthRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {HEALTH_COLUMNS} FROM health_records
         WHERE resident_id = ?1 ORDER BY record_date DESC, created_at DESC"
    ))?;
    let rows = stmt.query_map(params![resident_id.to_string()], health_from_row)?;
    collect_rows(rows)
}

pub fn update_health_record(conn: &Connection, record: &HealthRecord) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE health_records SET record_type = ?1, title = ?2, details = ?3, record_date = ?4,
         updated_at = ?5 WHERE id = ?6",
        params![
            record.record_type.as_str(),
            record.title,
            record.details,
            record.record_date,
            record.updated_at,
            record.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("HealthRecord", record.id));
    }
    Ok(())
}

pub fn delete_health_record(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM health_records WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

// ── Note categories ─────────────────────────────────────────

const CATEGORY_COLUMNS: &str = "id, resident_id, name, roles_allowed, created_by, created_at, updated_at";

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<NoteCategory> {
    Ok(NoteCategory {
        id: uuid_at(row, 0)?,
        resident_id: uuid_at(row, 1)?,
        name: row.get(2)?,
        roles_allowed: json_at(row, 3)?,
        created_by: uuid_at(row, 4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub fn insert_note_category(conn: &Connection, category: &NoteCategory) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO note_categories ({CATEGORY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        params![
            category.id.to_string(),
            category.resident_id.to_string(),
            category.name,
            to_json(&category.roles_allowed)?,
            category.created_by.to_string(),
            category.created_at,
            category.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_note_category(conn: &Connection, id: &Uuid) -> Result<Option<NoteCategory>, DatabaseError> {
    let category = conn
        .query_row(
            &format!("SELECT {CATEGORY_COLUMNS} FROM note_categories WHERE id = ?1"),
            params![id.to_string()],
            category_from_row,
        )
        .optional()?;
    Ok(category)
}

pub fn list_note_categories(
    conn: &Connection,
    resident_id: Option<&Uuid>,
) -> Result<Vec<NoteCategory>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CATEGORY_COLUMNS} FROM note_categories
         WHERE (?1 IS NULL OR resident_id = ?1) ORDER BY name COLLATE NOCASE"
    ))?;
    let rows = stmt.query_map(params![resident_id.map(|id| id.to_string())], category_from_row)?;
    collect_rows(rows)
}

pub fn update_note_category(conn: &Connection, category: &NoteCategory) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE note_categories SET name = ?1, roles_allowed = ?2, updated_at = ?3 WHERE id = ?4",
        params![
            category.name,
            to_json(&category.roles_allowed)?,
            category.updated_at,
            category.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("NoteCategory", category.id));
    }
    Ok(())
}

pub fn delete_note_category(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM note_categories WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{seed_resident, seed_user};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::{HealthRecordType, QuestionType, Role};
    use crate::models::{CarePlanEntry, FormQuestion};
    use chrono::{NaiveDate, Utc};

    #[test]
    fn care_plan_round_trip_keeps_shape() {
        let conn = open_memory_database().unwrap();
        let resident = seed_resident(&conn, "Ada");
        let author = seed_user(&conn, Role::Admin);
        let now = Utc::now();
        let plan = CarePlan {
            id: Uuid::new_v4(),
            resident_id: resident.id,
            author_id: author.id,
            body: CarePlanBody::Entries {
                entries: vec![CarePlanEntry {
                    title: "Mobility".into(),
                    details: "Frame at all times".into(),
                }],
            },
            created_at: now,
            updated_at: now,
        };
        insert_care_plan(&conn, &plan).unwrap();

        let loaded = get_care_plan(&conn, &plan.id).unwrap().unwrap();
        assert_eq!(loaded.body, plan.body);
        assert_eq!(
            list_care_plans(&conn, Some(&resident.id), Some(CarePlanKind::Entries)).unwrap().len(),
            1
        );
        assert!(list_care_plans(&conn, None, Some(CarePlanKind::Structured)).unwrap().is_empty());
    }

    #[test]
    fn care_form_lists_and_questions_survive_storage() {
        let conn = open_memory_database().unwrap();
        let author = seed_user(&conn, Role::Coordinator);
        let now = Utc::now();
        let form = CareFormTemplate {
            id: Uuid::new_v4(),
            title: "Night check".into(),
            description: None,
            roles_allowed: vec![Role::Nurse, Role::Carer],
            residents: vec![],
            questions: vec![FormQuestion {
                id: Uuid::new_v4(),
                prompt: "Sleeping?".into(),
                question_type: QuestionType::Radio,
                options: vec!["yes".into(), "no".into()],
                required: true,
                answer: None,
            }],
            created_by: author.id,
            created_at: now,
            updated_at: now,
        };
        insert_care_form(&conn, &form).unwrap();
        let loaded = get_care_form(&conn, &form.id).unwrap().unwrap();
        assert_eq!(loaded, form);
        assert!(delete_care_form(&conn, &form.id).unwrap());
        assert!(list_care_forms(&conn).unwrap().is_empty());
    }

    #[test]
    fn health_records_newest_first() {
        let conn = open_memory_database().unwrap();
        let resident = seed_resident(&conn, "Ada");
        let nurse = seed_user(&conn, Role::Nurse);
        let now = Utc::now();
        for day in [3, 9, 5] {
            insert_health_record(
                &conn,
                &HealthRecord {
                    id: Uuid::new_v4(),
                    resident_id: resident.id,
                    record_type: HealthRecordType::Vitals,
                    title: format!("BP day {day}"),
                    details: None,
                    recorded_by: nurse.id,
                    record_date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
                    created_at: now,
                    updated_at: now,
                },
            )
            .unwrap();
        }
        let titles: Vec<_> = list_health_records(&conn, &resident.id)
            .unwrap()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["BP day 9", "BP day 5", "BP day 3"]);
    }

    #[test]
    fn note_categories_removed_with_resident() {
        let conn = open_memory_database().unwrap();
        let resident = seed_resident(&conn, "Ada");
        let admin = seed_user(&conn, Role::Admin);
        let now = Utc::now();
        let category = NoteCategory {
            id: Uuid::new_v4(),
            resident_id: resident.id,
            name: "Diet".into(),
            roles_allowed: vec![Role::Carer],
            created_by: admin.id,
            created_at: now,
            updated_at: now,
        };
        insert_note_category(&conn, &category).unwrap();
        crate::db::repository::delete_resident(&conn, &resident.id).unwrap();
        assert!(get_note_category(&conn, &category.id).unwrap().is_none());
    }
}
