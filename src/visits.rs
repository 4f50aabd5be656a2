//! Family visit requests and their approval.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::access::{authorize, linked_resident_id, Action, Actor, Entity};
use crate::db::repository;
use crate::error::{ServiceError, ServiceResult};
use crate::models::enums::{NotificationType, Role, VisitStatus};
use crate::models::{NewVisitRequest, VisitRequest};
use crate::notifications::notify;

#[derive(Debug, Clone, Deserialize)]
pub struct VisitDecision {
    pub status: VisitStatus,
}

fn load_visit(conn: &Connection, id: &Uuid) -> ServiceResult<VisitRequest> {
    repository::get_visit_request(conn, id)?.ok_or_else(|| ServiceError::not_found("Visit request"))
}

/// A family account asks to visit its linked resident.
pub fn request_visit(conn: &Connection, actor: &Actor, input: NewVisitRequest, now: DateTime<Utc>) -> ServiceResult<VisitRequest> {
    authorize(actor, Entity::VisitRequest, Action::Create)?;
    let resident_id = linked_resident_id(conn, &actor.id)?
        .ok_or_else(|| ServiceError::forbidden("family account is not linked to a resident"))?;
    if input.visit_date < now.date_naive() {
        return Err(ServiceError::validation("Visit date is in the past"));
    }

    let visit = VisitRequest {
        id: Uuid::new_v4(),
        requested_by: actor.id,
        resident_id,
        visit_date: input.visit_date,
        visit_time: input.visit_time,
        reason: input.reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
        status: VisitStatus::Pending,
        decided_by: None,
        created_at: now,
        updated_at: now,
    };
    repository::insert_visit_request(conn, &visit)?;
    tracing::info!(visit_id = %visit.id, resident_id = %resident_id, "Visit requested");
    Ok(visit)
}

/// Family accounts see their own requests; staff who decide see all.
pub fn list_visits(conn: &Connection, actor: &Actor, status: Option<VisitStatus>) -> ServiceResult<Vec<VisitRequest>> {
    authorize(actor, Entity::VisitRequest, Action::Read)?;
    let requested_by = if actor.is(Role::Family) { Some(actor.id) } else { None };
    Ok(repository::list_visit_requests(conn, requested_by.as_ref(), status)?)
}

/// Approve or reject a pending request and tell the requester.
pub fn decide_visit(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    decision: VisitDecision,
    now: DateTime<Utc>,
) -> ServiceResult<VisitRequest> {
    authorize(actor, Entity::VisitRequest, Action::Review)?;
    let notification_type = match decision.status {
        VisitStatus::Approved => NotificationType::VisitApproved,
        VisitStatus::Rejected => NotificationType::VisitRejected,
        VisitStatus::Pending => return Err(ServiceError::validation("Decision must be approved or rejected")),
    };
    let mut visit = load_visit(conn, id)?;
    visit.status = decision.status;
    visit.decided_by = Some(actor.id);
    visit.updated_at = now;

    let tx = conn.unchecked_transaction()?;
    if !repository::decide_visit_request(&tx, &visit)? {
        return Err(ServiceError::conflict("Visit request was already decided"));
    }
    notify(
        &tx,
        visit.requested_by,
        notification_type,
        format!(
            "Your visit on {} at {} was {}",
            visit.visit_date,
            visit.visit_time.format("%H:%M"),
            visit.status
        ),
        Some("/family/visits".to_string()),
        now,
    )?;
    tx.commit()?;

    tracing::info!(visit_id = %visit.id, status = %visit.status, decided_by = %actor.id, "Visit decided");
    Ok(visit)
}

/// Withdraw a request that has not been decided yet.
pub fn cancel_visit(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<()> {
    authorize(actor, Entity::VisitRequest, Action::Delete)?;
    let visit = load_visit(conn, id)?;
    if visit.requested_by != actor.id {
        return Err(ServiceError::forbidden("visit was requested by someone else"));
    }
    if visit.status != VisitStatus::Pending {
        return Err(ServiceError::conflict("Only pending visits can be withdrawn"));
    }
    repository::delete_visit_request(conn, id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::fixtures::{seed_resident, seed_user};
    use crate::models::enums::FamilyStatus;
    use crate::models::Family;
    use chrono::{Duration, NaiveTime};

    fn actor(conn: &Connection, role: Role) -> Actor {
        let user = seed_user(conn, role);
        Actor::new(user.id, user.role)
    }

    fn linked_family(conn: &Connection) -> Actor {
        let family = actor(conn, Role::Family);
        let resident = seed_resident(conn, "Ada");
        let now = Utc::now();
        repository::insert_family(
            conn,
            &Family {
                id: Uuid::new_v4(),
                user_id: family.id,
                resident_id: Some(resident.id),
                relationship: Some("daughter".into()),
                status: FamilyStatus::Approved,
                created_at: now,
                updated_at: now,
            },
        )
        .unwrap();
        family
    }

    fn tomorrow() -> NewVisitRequest {
        NewVisitRequest {
            visit_date: (Utc::now() + Duration::days(1)).date_naive(),
            visit_time: NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
            reason: Some("Birthday".into()),
        }
    }

    #[test]
    fn unlinked_family_cannot_request() {
        let conn = open_memory_database().unwrap();
        let family = actor(&conn, Role::Family);
        assert!(matches!(
            request_visit(&conn, &family, tomorrow(), Utc::now()),
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn approval_notifies_requester_once() {
        let conn = open_memory_database().unwrap();
        let family = linked_family(&conn);
        let coordinator = actor(&conn, Role::Coordinator);
        let visit = request_visit(&conn, &family, tomorrow(), Utc::now()).unwrap();
        assert_eq!(visit.status, VisitStatus::Pending);

        let approved = decide_visit(
            &conn,
            &coordinator,
            &visit.id,
            VisitDecision {
                status: VisitStatus::Approved,
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(approved.decided_by, Some(coordinator.id));

        let again = decide_visit(
            &conn,
            &coordinator,
            &visit.id,
            VisitDecision {
                status: VisitStatus::Rejected,
            },
            Utc::now(),
        );
        assert!(matches!(again, Err(ServiceError::Conflict(_))));

        let inbox = repository::list_notifications(&conn, &family.id, false).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].notification_type, NotificationType::VisitApproved);
        assert!(inbox[0].message.contains("14:30"));
    }

    #[test]
    fn family_sees_own_and_withdraws_pending_only() {
        let conn = open_memory_database().unwrap();
        let family = linked_family(&conn);
        let other = linked_family(&conn);
        let admin = actor(&conn, Role::Admin);
        let mine = request_visit(&conn, &family, tomorrow(), Utc::now()).unwrap();
        let theirs = request_visit(&conn, &other, tomorrow(), Utc::now()).unwrap();

        assert_eq!(list_visits(&conn, &family, None).unwrap().len(), 1);
        assert_eq!(list_visits(&conn, &admin, Some(VisitStatus::Pending)).unwrap().len(), 2);
        assert!(matches!(
            cancel_visit(&conn, &family, &theirs.id),
            Err(ServiceError::Forbidden(_))
        ));

        decide_visit(
            &conn,
            &admin,
            &mine.id,
            VisitDecision {
                status: VisitStatus::Rejected,
            },
            Utc::now(),
        )
        .unwrap();
        assert!(matches!(
            cancel_visit(&conn, &family, &mine.id),
            Err(ServiceError::Conflict(_))
        ));
        cancel_visit(&conn, &other, &theirs.id).unwrap();
    }

    #[test]
    fn past_dates_rejected() {
        let conn = open_memory_database().unwrap();
        let family = linked_family(&conn);
        let mut input = tomorrow();
        input.visit_date = (Utc::now() - Duration::days(2)).date_naive();
        assert!(matches!(
            request_visit(&conn, &family, input, Utc::now()),
            Err(ServiceError::Validation(_))
        ));
    }
}
