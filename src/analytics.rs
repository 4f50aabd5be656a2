//! Read-side aggregates for the management dashboard.
//!
//! Everything is counted fresh from the database on each call.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::access::{authorize, Action, Actor, Entity};
use crate::db::repository;
use crate::error::ServiceResult;
use crate::models::enums::{FamilyStatus, FeedbackStatus, IncidentStatus, VisitStatus};

const RECENT_PER_KIND: usize = 5;
const RECENT_LIMIT: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncidentSummary {
    pub open: i64,
    pub closed: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub residents: i64,
    pub users_by_role: BTreeMap<&'static str, i64>,
    pub shifts_today: BTreeMap<&'static str, i64>,
    pub incidents: IncidentSummary,
    pub pending_families: i64,
    pub pending_visits: i64,
    pub open_feedback: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    NewResident,
    Incident,
}

#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub kind: ActivityKind,
    pub id: Uuid,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthBucket {
    pub month: u32,
    pub count: i64,
}

fn count_of<T: PartialEq>(counts: &[(T, i64)], wanted: T) -> i64 {
    counts
        .iter()
        .find(|(status, _)| *status == wanted)
        .map(|(_, n)| *n)
        .unwrap_or(0)
}

pub fn incident_summary(conn: &Connection, actor: &Actor) -> ServiceResult<IncidentSummary> {
    authorize(actor, Entity::Dashboard, Action::Read)?;
    let counts = repository::count_incidents_by_status(conn)?;
    Ok(IncidentSummary {
        open: count_of(&counts, IncidentStatus::Open),
        closed: count_of(&counts, IncidentStatus::Closed),
    })
}

pub fn dashboard(conn: &Connection, actor: &Actor, now: DateTime<Utc>) -> ServiceResult<Dashboard> {
    authorize(actor, Entity::Dashboard, Action::Read)?;

    let users_by_role = repository::count_users_by_role(conn)?
        .into_iter()
        .map(|(role, n)| (role.as_str(), n))
        .collect();
    let shifts_today = repository::count_shifts_on(conn, now.date_naive())?
        .into_iter()
        .map(|(status, n)| (status.as_str(), n))
        .collect();

    Ok(Dashboard {
        residents: repository::count_residents(conn)?,
        users_by_role,
        shifts_today,
        incidents: incident_summary(conn, actor)?,
        pending_families: count_of(&repository::count_families_by_status(conn)?, FamilyStatus::Pending),
        pending_visits: count_of(&repository::count_visits_by_status(conn)?, VisitStatus::Pending),
        open_feedback: count_of(&repository::count_feedback_by_status(conn)?, FeedbackStatus::Open),
    })
}

/// Newest residents and incidents, merged by time.
pub fn recent_activity(conn: &Connection, actor: &Actor) -> ServiceResult<Vec<Activity>> {
    authorize(actor, Entity::Dashboard, Action::Read)?;
    let residents = repository::recent_residents(conn, RECENT_PER_KIND)?
        .into_iter()
        .map(|r| Activity {
            kind: ActivityKind::NewResident,
            id: r.id,
            description: format!("{} admitted", r.full_name),
            created_at: r.created_at,
        });
    let incidents = repository::recent_incidents(conn, RECENT_PER_KIND)?
        .into_iter()
        .map(|i| Activity {
            kind: ActivityKind::Incident,
            id: i.id,
            description: i.title,
            created_at: i.created_at,
        });

    let mut activity: Vec<Activity> = residents.chain(incidents).collect();
    activity.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    activity.truncate(RECENT_LIMIT);
    Ok(activity)
}

/// User signups per month of `year`, January to December.
pub fn monthly_signups(conn: &Connection, actor: &Actor, year: i32) -> ServiceResult<Vec<MonthBucket>> {
    authorize(actor, Entity::Dashboard, Action::Read)?;
    let counts = repository::count_signups_by_month(conn, year)?;
    Ok((1..=12)
        .map(|month| MonthBucket {
            month,
            count: count_of(&counts, month),
        })
        .collect())
}

/// Signups for the year `now` falls in.
pub fn signups_this_year(conn: &Connection, actor: &Actor, now: DateTime<Utc>) -> ServiceResult<Vec<MonthBucket>> {
    monthly_signups(conn, actor, now.year())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::fixtures::{seed_resident, seed_user};
    use crate::error::ServiceError;
    use crate::models::enums::Role;
    use crate::models::Incident;
    use chrono::Duration;

    fn actor(conn: &Connection, role: Role) -> Actor {
        let user = seed_user(conn, role);
        Actor::new(user.id, user.role)
    }

    fn incident(conn: &Connection, reporter: &Actor, title: &str, at: DateTime<Utc>, status: IncidentStatus) {
        repository::insert_incident(
            conn,
            &Incident {
                id: Uuid::new_v4(),
                title: title.into(),
                description: "details".into(),
                reported_by: reporter.id,
                reporter_role: reporter.role,
                resident_id: None,
                shift_id: None,
                status,
                created_at: at,
                updated_at: at,
            },
        )
        .unwrap();
    }

    #[test]
    fn care_staff_have_no_dashboard() {
        let conn = open_memory_database().unwrap();
        let carer = actor(&conn, Role::Carer);
        assert!(matches!(dashboard(&conn, &carer, Utc::now()), Err(ServiceError::Forbidden(_))));
    }

    #[test]
    fn dashboard_counts() {
        let conn = open_memory_database().unwrap();
        let admin = actor(&conn, Role::Admin);
        let nurse = actor(&conn, Role::Nurse);
        actor(&conn, Role::Nurse);
        seed_resident(&conn, "Ada");
        incident(&conn, &nurse, "Fall", Utc::now(), IncidentStatus::Open);
        incident(&conn, &nurse, "Spill", Utc::now(), IncidentStatus::Closed);

        let board = dashboard(&conn, &admin, Utc::now()).unwrap();
        assert_eq!(board.residents, 1);
        assert_eq!(board.users_by_role.get("nurse"), Some(&2));
        assert_eq!(board.users_by_role.get("admin"), Some(&1));
        assert_eq!(board.incidents, IncidentSummary { open: 1, closed: 1 });
        assert!(board.shifts_today.is_empty());
        assert_eq!(board.pending_visits, 0);
    }

    #[test]
    fn recent_activity_merges_and_truncates() {
        let conn = open_memory_database().unwrap();
        let admin = actor(&conn, Role::Admin);
        let base = Utc::now() - Duration::hours(1);
        for i in 0..6 {
            incident(&conn, &admin, &format!("incident {i}"), base + Duration::minutes(i), IncidentStatus::Open);
        }
        for i in 0..6 {
            seed_resident(&conn, &format!("resident {i}"));
        }

        let activity = recent_activity(&conn, &admin).unwrap();
        assert_eq!(activity.len(), 8);
        // Residents were created after every incident.
        assert!(activity[..5].iter().all(|a| a.kind == ActivityKind::NewResident));
        assert_eq!(activity[5].description, "incident 5");
        assert!(activity.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn signups_are_zero_filled() {
        let conn = open_memory_database().unwrap();
        let admin = actor(&conn, Role::Admin);
        let now = Utc::now();
        let buckets = signups_this_year(&conn, &admin, now).unwrap();
        assert_eq!(buckets.len(), 12);
        assert_eq!(buckets[0].month, 1);
        assert_eq!(buckets.iter().map(|b| b.count).sum::<i64>(), 1);
        assert_eq!(buckets[now.month0() as usize].count, 1);
        assert!(monthly_signups(&conn, &admin, 1999).unwrap().iter().all(|b| b.count == 0));
    }
}
