//! Care plans, care form templates, health records and note categories.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::access::{
    authorize, ensure_owner_or_admin, ensure_resident_access, scoped_resident, visible_to, Action, Actor, Entity,
};
use crate::db::repository;
use crate::error::{ServiceError, ServiceResult};
use crate::models::enums::{CarePlanKind, QuestionType, Role};
use crate::models::{
    CareFormPatch, CareFormTemplate, CarePlan, CarePlanBody, CarePlanPatch, FormAnswer, FormQuestion, HealthRecord,
    HealthRecordPatch, NewCareForm, NewCarePlan, NewHealthRecord, NewNoteCategory, NoteCategory, NoteCategoryPatch,
};

fn ensure_resident_exists(conn: &Connection, resident_id: &Uuid) -> ServiceResult<()> {
    if repository::get_resident(conn, resident_id)?.is_none() {
        return Err(ServiceError::validation("Resident does not exist"));
    }
    Ok(())
}

/// Narrow an optional resident filter to what the actor may see.
///
/// Staff keep their filter. Residents and family are pinned to their own
/// resident, and asking for another one is refused.
fn resident_scope(conn: &Connection, actor: &Actor, requested: Option<Uuid>) -> ServiceResult<Option<Uuid>> {
    match scoped_resident(conn, actor)? {
        None => Ok(requested),
        Some(own) => match requested {
            Some(other) if other != own => Err(ServiceError::forbidden("no access to this resident")),
            _ => Ok(Some(own)),
        },
    }
}

fn require_text(value: &str, what: &str) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::validation(format!("{what} is required")));
    }
    Ok(value.to_string())
}

// ═══════════════════════════════════════════
// Care plans
// ═══════════════════════════════════════════

/// Which role writes each care plan shape.
pub fn plan_owner(kind: CarePlanKind) -> Role {
    match kind {
        CarePlanKind::Entries => Role::Admin,
        CarePlanKind::Structured => Role::Coordinator,
    }
}

fn ensure_plan_owner(actor: &Actor, kind: CarePlanKind) -> ServiceResult<()> {
    if actor.role != plan_owner(kind) {
        return Err(ServiceError::forbidden(format!(
            "{kind} care plans are written by the {} role",
            plan_owner(kind)
        )));
    }
    Ok(())
}

fn validate_plan_body(body: &CarePlanBody) -> ServiceResult<()> {
    match body {
        CarePlanBody::Entries { entries } => {
            if entries.iter().any(|e| e.title.trim().is_empty()) {
                return Err(ServiceError::validation("Every care plan entry needs a title"));
            }
        }
        CarePlanBody::Structured { goals, .. } => {
            require_text(goals, "Goals")?;
        }
    }
    Ok(())
}

fn load_plan(conn: &Connection, id: &Uuid) -> ServiceResult<CarePlan> {
    repository::get_care_plan(conn, id)?.ok_or_else(|| ServiceError::not_found("Care plan"))
}

pub fn create_care_plan(conn: &Connection, actor: &Actor, input: NewCarePlan, now: DateTime<Utc>) -> ServiceResult<CarePlan> {
    authorize(actor, Entity::CarePlan, Action::Create)?;
    ensure_plan_owner(actor, input.body.kind())?;
    ensure_resident_exists(conn, &input.resident_id)?;
    validate_plan_body(&input.body)?;

    let plan = CarePlan {
        id: Uuid::new_v4(),
        resident_id: input.resident_id,
        author_id: actor.id,
        body: input.body,
        created_at: now,
        updated_at: now,
    };
    repository::insert_care_plan(conn, &plan)?;
    tracing::info!(plan_id = %plan.id, resident_id = %plan.resident_id, kind = %plan.body.kind(), "Care plan created");
    Ok(plan)
}

pub fn list_care_plans(
    conn: &Connection,
    actor: &Actor,
    resident_id: Option<Uuid>,
    kind: Option<CarePlanKind>,
) -> ServiceResult<Vec<CarePlan>> {
    authorize(actor, Entity::CarePlan, Action::Read)?;
    let resident_id = resident_scope(conn, actor, resident_id)?;
    Ok(repository::list_care_plans(conn, resident_id.as_ref(), kind)?)
}

pub fn get_care_plan(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<CarePlan> {
    authorize(actor, Entity::CarePlan, Action::Read)?;
    let plan = load_plan(conn, id)?;
    ensure_resident_access(conn, actor, &plan.resident_id)?;
    Ok(plan)
}

pub fn update_care_plan(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    patch: CarePlanPatch,
    now: DateTime<Utc>,
) -> ServiceResult<CarePlan> {
    authorize(actor, Entity::CarePlan, Action::Update)?;
    let mut plan = load_plan(conn, id)?;
    ensure_plan_owner(actor, plan.body.kind())?;
    patch.apply(&mut plan).map_err(ServiceError::Validation)?;
    validate_plan_body(&plan.body)?;
    plan.updated_at = now;
    repository::update_care_plan(conn, &plan)?;
    Ok(plan)
}

pub fn delete_care_plan(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<()> {
    authorize(actor, Entity::CarePlan, Action::Delete)?;
    if !repository::delete_care_plan(conn, id)? {
        return Err(ServiceError::not_found("Care plan"));
    }
    Ok(())
}

// ═══════════════════════════════════════════
// Care form templates
// ═══════════════════════════════════════════

fn load_form(conn: &Connection, id: &Uuid) -> ServiceResult<CareFormTemplate> {
    repository::get_care_form(conn, id)?.ok_or_else(|| ServiceError::not_found("Care form"))
}

fn validate_questions(questions: &[FormQuestion]) -> ServiceResult<()> {
    for q in questions {
        if q.prompt.trim().is_empty() {
            return Err(ServiceError::validation("Every question needs a prompt"));
        }
        let needs_options = matches!(
            q.question_type,
            QuestionType::Radio | QuestionType::Dropdown | QuestionType::Checkbox
        );
        if needs_options && q.options.is_empty() {
            return Err(ServiceError::validation(format!(
                "Question \"{}\" needs at least one option",
                q.prompt
            )));
        }
    }
    Ok(())
}

fn applies_to(form: &CareFormTemplate, resident_id: &Uuid) -> bool {
    form.residents.is_empty() || form.residents.contains(resident_id)
}

pub fn create_care_form(conn: &Connection, actor: &Actor, input: NewCareForm, now: DateTime<Utc>) -> ServiceResult<CareFormTemplate> {
    authorize(actor, Entity::CareForm, Action::Create)?;
    let title = require_text(&input.title, "Title")?;
    validate_questions(&input.questions)?;

    let form = CareFormTemplate {
        id: Uuid::new_v4(),
        title,
        description: input.description,
        roles_allowed: input.roles_allowed,
        residents: input.residents,
        questions: input.questions,
        created_by: actor.id,
        created_at: now,
        updated_at: now,
    };
    repository::insert_care_form(conn, &form)?;
    Ok(form)
}

/// Forms the actor's role may see, optionally only those applying to one resident.
pub fn list_care_forms(conn: &Connection, actor: &Actor, resident_id: Option<Uuid>) -> ServiceResult<Vec<CareFormTemplate>> {
    authorize(actor, Entity::CareForm, Action::Read)?;
    let resident_id = resident_scope(conn, actor, resident_id)?;
    Ok(repository::list_care_forms(conn)?
        .into_iter()
        .filter(|f| visible_to(&f.roles_allowed, actor.role))
        .filter(|f| resident_id.as_ref().map_or(true, |r| applies_to(f, r)))
        .collect())
}

pub fn get_care_form(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<CareFormTemplate> {
    authorize(actor, Entity::CareForm, Action::Read)?;
    let form = load_form(conn, id)?;
    if !visible_to(&form.roles_allowed, actor.role) {
        return Err(ServiceError::forbidden("care form not available to your role"));
    }
    Ok(form)
}

pub fn update_care_form(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    patch: CareFormPatch,
    now: DateTime<Utc>,
) -> ServiceResult<CareFormTemplate> {
    authorize(actor, Entity::CareForm, Action::Update)?;
    let mut form = load_form(conn, id)?;
    patch.apply(&mut form);
    form.title = require_text(&form.title, "Title")?;
    validate_questions(&form.questions)?;
    form.updated_at = now;
    repository::update_care_form(conn, &form)?;
    Ok(form)
}

pub fn delete_care_form(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<()> {
    authorize(actor, Entity::CareForm, Action::Delete)?;
    if !repository::delete_care_form(conn, id)? {
        return Err(ServiceError::not_found("Care form"));
    }
    Ok(())
}

/// Check one answer against the question's type and options.
fn check_answer(question: &FormQuestion, answer: &str) -> Result<(), String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Ok(());
    }
    match question.question_type {
        QuestionType::Text | QuestionType::Textarea => Ok(()),
        QuestionType::Radio | QuestionType::Dropdown => {
            if question.options.iter().any(|o| o == answer) {
                Ok(())
            } else {
                Err(format!("\"{answer}\" is not an option of \"{}\"", question.prompt))
            }
        }
        QuestionType::Checkbox => {
            match answer
                .split(',')
                .map(str::trim)
                .find(|choice| !question.options.iter().any(|o| o == choice))
            {
                Some(bad) => Err(format!("\"{bad}\" is not an option of \"{}\"", question.prompt)),
                None => Ok(()),
            }
        }
        QuestionType::Number => answer
            .parse::<f64>()
            .map(|_| ())
            .map_err(|_| format!("\"{}\" expects a number", question.prompt)),
        QuestionType::Date => NaiveDate::parse_from_str(answer, "%Y-%m-%d")
            .map(|_| ())
            .map_err(|_| format!("\"{}\" expects a date (YYYY-MM-DD)", question.prompt)),
    }
}

/// Record answers on a form. Every required question must end up answered.
pub fn submit_answers(
    conn: &Connection,
    actor: &Actor,
    form_id: &Uuid,
    answers: Vec<FormAnswer>,
    now: DateTime<Utc>,
) -> ServiceResult<CareFormTemplate> {
    authorize(actor, Entity::CareForm, Action::Answer)?;
    let mut form = load_form(conn, form_id)?;
    if !visible_to(&form.roles_allowed, actor.role) {
        return Err(ServiceError::forbidden("care form not available to your role"));
    }

    for answer in answers {
        let question = form
            .questions
            .iter_mut()
            .find(|q| q.id == answer.question_id)
            .ok_or_else(|| ServiceError::validation(format!("Unknown question {}", answer.question_id)))?;
        check_answer(question, &answer.answer).map_err(ServiceError::Validation)?;
        question.answer = Some(answer.answer.trim().to_string());
    }

    if let Some(missing) = form
        .questions
        .iter()
        .find(|q| q.required && q.answer.as_deref().map_or(true, str::is_empty))
    {
        return Err(ServiceError::validation(format!("\"{}\" is required", missing.prompt)));
    }

    form.updated_at = now;
    repository::update_care_form(conn, &form)?;
    tracing::info!(form_id = %form.id, user_id = %actor.id, "Care form answered");
    Ok(form)
}

// ═══════════════════════════════════════════
// Health records
// ═══════════════════════════════════════════

fn load_health_record(conn: &Connection, id: &Uuid) -> ServiceResult<HealthRecord> {
    repository::get_health_record(conn, id)?.ok_or_else(|| ServiceError::not_found("Health record"))
}

pub fn create_health_record(
    conn: &Connection,
    actor: &Actor,
    input: NewHealthRecord,
    now: DateTime<Utc>,
) -> ServiceResult<HealthRecord> {
    authorize(actor, Entity::HealthRecord, Action::Create)?;
    let title = require_text(&input.title, "Title")?;
    ensure_resident_exists(conn, &input.resident_id)?;

    let record = HealthRecord {
        id: Uuid::new_v4(),
        resident_id: input.resident_id,
        record_type: input.record_type,
        title,
        details: input.details,
        recorded_by: actor.id,
        record_date: input.record_date.unwrap_or_else(|| now.date_naive()),
        created_at: now,
        updated_at: now,
    };
    repository::insert_health_record(conn, &record)?;
    Ok(record)
}

/// Records of one resident, for anyone who may see that resident.
pub fn list_health_records(conn: &Connection, actor: &Actor, resident_id: &Uuid) -> ServiceResult<Vec<HealthRecord>> {
    authorize(actor, Entity::HealthRecord, Action::Read)?;
    ensure_resident_access(conn, actor, resident_id)?;
    Ok(repository::list_health_records(conn, resident_id)?)
}

pub fn get_health_record(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<HealthRecord> {
    authorize(actor, Entity::HealthRecord, Action::Read)?;
    let record = load_health_record(conn, id)?;
    ensure_resident_access(conn, actor, &record.resident_id)?;
    Ok(record)
}

pub fn update_health_record(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    patch: HealthRecordPatch,
    now: DateTime<Utc>,
) -> ServiceResult<HealthRecord> {
    authorize(actor, Entity::HealthRecord, Action::Update)?;
    let mut record = load_health_record(conn, id)?;
    ensure_owner_or_admin(actor, record.recorded_by, "health record")?;
    patch.apply(&mut record);
    record.title = require_text(&record.title, "Title")?;
    record.updated_at = now;
    repository::update_health_record(conn, &record)?;
    Ok(record)
}

pub fn delete_health_record(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<()> {
    authorize(actor, Entity::HealthRecord, Action::Delete)?;
    let record = load_health_record(conn, id)?;
    ensure_owner_or_admin(actor, record.recorded_by, "health record")?;
    repository::delete_health_record(conn, id)?;
    Ok(())
}

// ═══════════════════════════════════════════
// Note categories
// ═══════════════════════════════════════════

fn load_category(conn: &Connection, id: &Uuid) -> ServiceResult<NoteCategory> {
    repository::get_note_category(conn, id)?.ok_or_else(|| ServiceError::not_found("Note category"))
}

pub fn create_note_category(
    conn: &Connection,
    actor: &Actor,
    input: NewNoteCategory,
    now: DateTime<Utc>,
) -> ServiceResult<NoteCategory> {
    authorize(actor, Entity::NoteCategory, Action::Create)?;
    let name = require_text(&input.name, "Name")?;
    ensure_resident_exists(conn, &input.resident_id)?;

    let category = NoteCategory {
        id: Uuid::new_v4(),
        resident_id: input.resident_id,
        name,
        roles_allowed: input.roles_allowed,
        created_by: actor.id,
        created_at: now,
        updated_at: now,
    };
    repository::insert_note_category(conn, &category)?;
    Ok(category)
}

pub fn list_note_categories(conn: &Connection, actor: &Actor, resident_id: Option<Uuid>) -> ServiceResult<Vec<NoteCategory>> {
    authorize(actor, Entity::NoteCategory, Action::Read)?;
    let resident_id = resident_scope(conn, actor, resident_id)?;
    Ok(repository::list_note_categories(conn, resident_id.as_ref())?
        .into_iter()
        .filter(|c| visible_to(&c.roles_allowed, actor.role))
        .collect())
}

pub fn update_note_category(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    patch: NoteCategoryPatch,
    now: DateTime<Utc>,
) -> ServiceResult<NoteCategory> {
    authorize(actor, Entity::NoteCategory, Action::Update)?;
    let mut category = load_category(conn, id)?;
    patch.apply(&mut category);
    category.name = require_text(&category.name, "Name")?;
    category.updated_at = now;
    repository::update_note_category(conn, &category)?;
    Ok(category)
}

pub fn delete_note_category(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<()> {
    authorize(actor, Entity::NoteCategory, Action::Delete)?;
    if !repository::delete_note_category(conn, id)? {
        return Err(ServiceError::not_found("Note category"));
    }
    Ok(())
}
