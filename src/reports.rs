//! Incident reports and resident feedback.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::access::{authorize, Action, Actor, Entity};
use crate::db::repository::{self, IncidentFilter};
use crate::error::{ServiceError, ServiceResult};
use crate::models::enums::{FeedbackStatus, IncidentStatus, Role};
use crate::models::{Feedback, FeedbackResponse, Incident, IncidentPatch, NewFeedback, NewIncident};

const DEFAULT_FEEDBACK_CATEGORY: &str = "general";

/// Management sees every report; everyone else only what they filed.
fn sees_all(actor: &Actor) -> bool {
    matches!(actor.role, Role::Admin | Role::Coordinator)
}

fn require_text(value: &str, what: &str) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::validation(format!("{what} is required")));
    }
    Ok(value.to_string())
}

// ═══════════════════════════════════════════
// Incidents
// ═══════════════════════════════════════════

fn load_incident(conn: &Connection, id: &Uuid) -> ServiceResult<Incident> {
    repository::get_incident(conn, id)?.ok_or_else(|| ServiceError::not_found("Incident"))
}

pub fn report_incident(conn: &Connection, actor: &Actor, input: NewIncident, now: DateTime<Utc>) -> ServiceResult<Incident> {
    authorize(actor, Entity::Incident, Action::Create)?;
    let title = require_text(&input.title, "Title")?;
    let description = require_text(&input.description, "Description")?;
    if let Some(resident_id) = &input.resident_id {
        if repository::get_resident(conn, resident_id)?.is_none() {
            return Err(ServiceError::validation("Resident does not exist"));
        }
    }
    if let Some(shift_id) = &input.shift_id {
        if repository::get_shift(conn, shift_id)?.is_none() {
            return Err(ServiceError::validation("Shift does not exist"));
        }
    }

    let incident = Incident {
        id: Uuid::new_v4(),
        title,
        description,
        reported_by: actor.id,
        reporter_role: actor.role,
        resident_id: input.resident_id,
        shift_id: input.shift_id,
        status: IncidentStatus::Open,
        created_at: now,
        updated_at: now,
    };
    repository::insert_incident(conn, &incident)?;
    tracing::warn!(
        incident_id = %incident.id,
        reported_by = %actor.id,
        role = %actor.role,
        "Incident reported"
    );
    Ok(incident)
}

pub fn list_incidents(conn: &Connection, actor: &Actor, status: Option<IncidentStatus>) -> ServiceResult<Vec<Incident>> {
    authorize(actor, Entity::Incident, Action::Read)?;
    let filter = IncidentFilter {
        status,
        reported_by: if sees_all(actor) { None } else { Some(actor.id) },
        resident_id: None,
    };
    Ok(repository::list_incidents(conn, &filter)?)
}

pub fn get_incident(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<Incident> {
    authorize(actor, Entity::Incident, Action::Read)?;
    let incident = load_incident(conn, id)?;
    if !sees_all(actor) && incident.reported_by != actor.id {
        return Err(ServiceError::forbidden("incident was reported by someone else"));
    }
    Ok(incident)
}

pub fn update_incident(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    patch: IncidentPatch,
    now: DateTime<Utc>,
) -> ServiceResult<Incident> {
    authorize(actor, Entity::Incident, Action::Update)?;
    let mut incident = load_incident(conn, id)?;
    patch.apply(&mut incident);
    incident.title = require_text(&incident.title, "Title")?;
    incident.description = require_text(&incident.description, "Description")?;
    incident.updated_at = now;
    repository::update_incident(conn, &incident)?;
    tracing::info!(incident_id = %incident.id, status = %incident.status, "Incident updated");
    Ok(incident)
}

pub fn delete_incident(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<()> {
    authorize(actor, Entity::Incident, Action::Delete)?;
    if !repository::delete_incident(conn, id)? {
        return Err(ServiceError::not_found("Incident"));
    }
    Ok(())
}

// ═══════════════════════════════════════════
// Feedback
// ═══════════════════════════════════════════

fn load_feedback(conn: &Connection, id: &Uuid) -> ServiceResult<Feedback> {
    repository::get_feedback(conn, id)?.ok_or_else(|| ServiceError::not_found("Feedback"))
}

pub fn submit_feedback(conn: &Connection, actor: &Actor, input: NewFeedback, now: DateTime<Utc>) -> ServiceResult<Feedback> {
    authorize(actor, Entity::Feedback, Action::Create)?;
    let message = require_text(&input.message, "Message")?;
    let category = input
        .category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_FEEDBACK_CATEGORY.to_string());

    let feedback = Feedback {
        id: Uuid::new_v4(),
        submitted_by: actor.id,
        message,
        category,
        status: FeedbackStatus::Open,
        response: None,
        responded_by: None,
        created_at: now,
        updated_at: now,
    };
    repository::insert_feedback(conn, &feedback)?;
    Ok(feedback)
}

pub fn list_feedback(conn: &Connection, actor: &Actor, status: Option<FeedbackStatus>) -> ServiceResult<Vec<Feedback>> {
    authorize(actor, Entity::Feedback, Action::Read)?;
    let submitted_by = if sees_all(actor) { None } else { Some(actor.id) };
    Ok(repository::list_feedback(conn, submitted_by.as_ref(), status)?)
}

pub fn get_feedback(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<Feedback> {
    authorize(actor, Entity::Feedback, Action::Read)?;
    let feedback = load_feedback(conn, id)?;
    if !sees_all(actor) && feedback.submitted_by != actor.id {
        return Err(ServiceError::forbidden("feedback was submitted by someone else"));
    }
    Ok(feedback)
}

/// Answer feedback. A response without an explicit status resolves it.
pub fn respond_to_feedback(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    input: FeedbackResponse,
    now: DateTime<Utc>,
) -> ServiceResult<Feedback> {
    authorize(actor, Entity::Feedback, Action::Review)?;
    let mut feedback = load_feedback(conn, id)?;
    let response = input.response.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
    if response.is_none() && input.status.is_none() {
        return Err(ServiceError::validation("A response or a status is required"));
    }

    if let Some(response) = response {
        feedback.response = Some(response);
        feedback.responded_by = Some(actor.id);
        feedback.status = input.status.unwrap_or(FeedbackStatus::Resolved);
    } else if let Some(status) = input.status {
        feedback.status = status;
    }
    feedback.updated_at = now;
    repository::update_feedback(conn, &feedback)?;
    Ok(feedback)
}

pub fn delete_feedback(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<()> {
    authorize(actor, Entity::Feedback, Action::Delete)?;
    if !repository::delete_feedback(conn, id)? {
        return Err(ServiceError::not_found("Feedback"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::fixtures::seed_user;

    fn actor(conn: &Connection, role: Role) -> Actor {
        let user = seed_user(conn, role);
        Actor::new(user.id, user.role)
    }

    fn incident(title: &str) -> NewIncident {
        NewIncident {
            title: title.into(),
            description: "Found on floor of room 4".into(),
            resident_id: None,
            shift_id: None,
        }
    }

    #[test]
    fn staff_see_own_incidents_management_sees_all() {
        let conn = open_memory_database().unwrap();
        let nurse = actor(&conn, Role::Nurse);
        let carer = actor(&conn, Role::Carer);
        let coordinator = actor(&conn, Role::Coordinator);
        let now = Utc::now();

        let by_nurse = report_incident(&conn, &nurse, incident("Fall"), now).unwrap();
        report_incident(&conn, &carer, incident("Spill"), now).unwrap();
        assert_eq!(by_nurse.reporter_role, Role::Nurse);
        assert_eq!(by_nurse.status, IncidentStatus::Open);

        assert_eq!(list_incidents(&conn, &nurse, None).unwrap().len(), 1);
        assert_eq!(list_incidents(&conn, &coordinator, None).unwrap().len(), 2);
        assert!(matches!(get_incident(&conn, &carer, &by_nurse.id), Err(ServiceError::Forbidden(_))));
    }

    #[test]
    fn coordinator_closes_incident_admin_deletes() {
        let conn = open_memory_database().unwrap();
        let nurse = actor(&conn, Role::Nurse);
        let coordinator = actor(&conn, Role::Coordinator);
        let admin = actor(&conn, Role::Admin);
        let reported = report_incident(&conn, &nurse, incident("Fall"), Utc::now()).unwrap();

        let close = IncidentPatch {
            status: Some(IncidentStatus::Closed),
            ..Default::default()
        };
        assert!(matches!(
            update_incident(&conn, &nurse, &reported.id, close.clone(), Utc::now()),
            Err(ServiceError::Forbidden(_))
        ));
        let closed = update_incident(&conn, &coordinator, &reported.id, close, Utc::now()).unwrap();
        assert_eq!(closed.status, IncidentStatus::Closed);
        assert_eq!(
            list_incidents(&conn, &coordinator, Some(IncidentStatus::Open)).unwrap().len(),
            0
        );

        assert!(matches!(
            delete_incident(&conn, &coordinator, &reported.id),
            Err(ServiceError::Forbidden(_))
        ));
        delete_incident(&conn, &admin, &reported.id).unwrap();
        assert!(matches!(
            delete_incident(&conn, &admin, &reported.id),
            Err(ServiceError::NotFound(_))
        ));
    }

    #[test]
    fn incident_requires_description() {
        let conn = open_memory_database().unwrap();
        let carer = actor(&conn, Role::Carer);
        let mut input = incident("Fall");
        input.description = "  ".into();
        assert!(matches!(
            report_incident(&conn, &carer, input, Utc::now()),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn feedback_lifecycle() {
        let conn = open_memory_database().unwrap();
        let resident = actor(&conn, Role::Resident);
        let neighbour = actor(&conn, Role::Resident);
        let coordinator = actor(&conn, Role::Coordinator);

        let submitted = submit_feedback(
            &conn,
            &resident,
            NewFeedback {
                message: "Tea is cold".into(),
                category: None,
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(submitted.category, "general");
        assert_eq!(submitted.status, FeedbackStatus::Open);

        assert!(list_feedback(&conn, &neighbour, None).unwrap().is_empty());
        assert!(matches!(
            get_feedback(&conn, &neighbour, &submitted.id),
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            submit_feedback(
                &conn,
                &coordinator,
                NewFeedback {
                    message: "x".into(),
                    category: None
                },
                Utc::now()
            ),
            Err(ServiceError::Forbidden(_))
        ));

        let answered = respond_to_feedback(
            &conn,
            &coordinator,
            &submitted.id,
            FeedbackResponse {
                response: Some("Kitchen informed".into()),
                status: None,
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(answered.status, FeedbackStatus::Resolved);
        assert_eq!(answered.responded_by, Some(coordinator.id));
        assert_eq!(list_feedback(&conn, &resident, None).unwrap()[0].response.as_deref(), Some("Kitchen informed"));
    }
}
