//! Residents and the family accounts linked to them.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::access::{authorize, ensure_resident_access, linked_resident_id, Action, Actor, Entity};
use crate::db::repository;
use crate::error::{ServiceError, ServiceResult};
use crate::models::enums::{FamilyStatus, NotificationType, Role};
use crate::models::{Family, NewResident, Resident, ResidentPatch};
use crate::notifications::notify;

fn load_resident(conn: &Connection, id: &Uuid) -> ServiceResult<Resident> {
    repository::get_resident(conn, id)?.ok_or_else(|| ServiceError::not_found("Resident"))
}

/// A linked login account must exist and carry the resident role.
fn ensure_resident_account(conn: &Connection, user_id: &Uuid) -> ServiceResult<()> {
    match repository::get_user(conn, user_id)? {
        Some(user) if user.role == Role::Resident => Ok(()),
        Some(_) => Err(ServiceError::validation("Linked account must have the resident role")),
        None => Err(ServiceError::validation("Linked account does not exist")),
    }
}

// ═══════════════════════════════════════════
// Residents
// ═══════════════════════════════════════════

pub fn create_resident(conn: &Connection, actor: &Actor, input: NewResident, now: DateTime<Utc>) -> ServiceResult<Resident> {
    authorize(actor, Entity::Resident, Action::Create)?;
    let full_name = input.full_name.trim();
    if full_name.is_empty() {
        return Err(ServiceError::validation("Full name is required"));
    }
    if let Some(user_id) = &input.user_id {
        ensure_resident_account(conn, user_id)?;
    }

    let resident = Resident {
        id: Uuid::new_v4(),
        user_id: input.user_id,
        full_name: full_name.to_string(),
        gender: input.gender,
        date_of_birth: input.date_of_birth,
        room_number: input.room_number,
        allergies: input.allergies,
        dietary_preference: input.dietary_preference,
        medical_conditions: input.medical_conditions,
        medical_history: input.medical_history,
        emergency_contacts: input.emergency_contacts,
        photo_url: input.photo_url,
        created_at: now,
        updated_at: now,
    };
    repository::insert_resident(conn, &resident)?;
    tracing::info!(resident_id = %resident.id, "Resident admitted");
    Ok(resident)
}

/// Staff see every resident, a resident their own record, family their
/// linked resident. An unlinked family account sees nothing.
pub fn list_residents(conn: &Connection, actor: &Actor) -> ServiceResult<Vec<Resident>> {
    authorize(actor, Entity::Resident, Action::Read)?;
    match actor.role {
        Role::Admin | Role::Coordinator | Role::Nurse | Role::Carer => Ok(repository::list_residents(conn)?),
        Role::Resident => Ok(repository::get_resident_by_user(conn, &actor.id)?.into_iter().collect()),
        Role::Family => match linked_resident_id(conn, &actor.id)? {
            Some(id) => Ok(repository::get_resident(conn, &id)?.into_iter().collect()),
            None => Ok(Vec::new()),
        },
    }
}

pub fn get_resident(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<Resident> {
    authorize(actor, Entity::Resident, Action::Read)?;
    let resident = load_resident(conn, id)?;
    ensure_resident_access(conn, actor, id)?;
    Ok(resident)
}

/// The record of the calling resident.
pub fn own_record(conn: &Connection, actor: &Actor) -> ServiceResult<Resident> {
    if !actor.is(Role::Resident) {
        return Err(ServiceError::forbidden("only residents have an own record"));
    }
    repository::get_resident_by_user(conn, &actor.id)?.ok_or_else(|| ServiceError::not_found("Resident record"))
}

pub fn update_resident(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    patch: ResidentPatch,
    now: DateTime<Utc>,
) -> ServiceResult<Resident> {
    authorize(actor, Entity::Resident, Action::Update)?;
    let mut resident = load_resident(conn, id)?;
    if patch.full_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ServiceError::validation("Full name is required"));
    }
    if let Some(user_id) = &patch.user_id {
        ensure_resident_account(conn, user_id)?;
    }
    patch.apply(&mut resident);
    resident.updated_at = now;
    repository::update_resident(conn, &resident)?;
    Ok(resident)
}

/// Remove a resident. Families linked to them fall back to pending so they
/// can be re-linked.
pub fn delete_resident(conn: &Connection, actor: &Actor, id: &Uuid, now: DateTime<Utc>) -> ServiceResult<()> {
    authorize(actor, Entity::Resident, Action::Delete)?;
    load_resident(conn, id)?;

    let tx = conn.unchecked_transaction()?;
    for mut family in repository::list_families_for_resident(&tx, id)? {
        family.resident_id = None;
        family.status = FamilyStatus::Pending;
        family.updated_at = now;
        repository::update_family(&tx, &family)?;
    }
    repository::delete_resident(&tx, id)?;
    tx.commit()?;

    tracing::info!(resident_id = %id, deleted_by = %actor.id, "Resident removed");
    Ok(())
}

// ═══════════════════════════════════════════
// Families
// ═══════════════════════════════════════════

/// A family link with the contact details of its account.
#[derive(Debug, Clone, Serialize)]
pub struct FamilyEntry {
    #[serde(flatten)]
    pub family: Family,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

fn load_family(conn: &Connection, id: &Uuid) -> ServiceResult<Family> {
    repository::get_family(conn, id)?.ok_or_else(|| ServiceError::not_found("Family"))
}

pub fn list_families(conn: &Connection, actor: &Actor, status: Option<FamilyStatus>) -> ServiceResult<Vec<FamilyEntry>> {
    authorize(actor, Entity::Family, Action::Read)?;
    if !actor.is(Role::Admin) {
        return Err(ServiceError::forbidden("only admins list family accounts"));
    }
    let mut entries = Vec::new();
    for family in repository::list_families(conn, status)? {
        if let Some(user) = repository::get_user(conn, &family.user_id)? {
            entries.push(FamilyEntry {
                family,
                name: user.name,
                email: user.email,
                phone: user.phone,
            });
        }
    }
    Ok(entries)
}

/// The family link of the calling family account.
pub fn own_family(conn: &Connection, actor: &Actor) -> ServiceResult<Family> {
    authorize(actor, Entity::Family, Action::Read)?;
    repository::get_family_by_user(conn, &actor.id)?.ok_or_else(|| ServiceError::not_found("Family"))
}

pub fn get_linked_resident(conn: &Connection, actor: &Actor) -> ServiceResult<Resident> {
    if !actor.is(Role::Family) {
        return Err(ServiceError::forbidden("only family accounts have a linked resident"));
    }
    let family = own_family(conn, actor)?;
    match (family.status, family.resident_id) {
        (FamilyStatus::Approved, Some(resident_id)) => load_resident(conn, &resident_id),
        _ => Err(ServiceError::forbidden("family account is not yet approved")),
    }
}

/// Approve a family account and link it to a resident. Re-approving an
/// approved link moves it to the new resident.
pub fn approve_family(
    conn: &Connection,
    actor: &Actor,
    family_id: &Uuid,
    resident_id: &Uuid,
    now: DateTime<Utc>,
) -> ServiceResult<Family> {
    authorize(actor, Entity::Family, Action::Update)?;
    let mut family = load_family(conn, family_id)?;
    let resident = repository::get_resident(conn, resident_id)?
        .ok_or_else(|| ServiceError::validation("Resident does not exist"))?;

    family.status = FamilyStatus::Approved;
    family.resident_id = Some(resident.id);
    family.updated_at = now;

    let tx = conn.unchecked_transaction()?;
    repository::update_family(&tx, &family)?;
    notify(
        &tx,
        family.user_id,
        NotificationType::FamilyApproved,
        format!("Your family account is now linked to {}", resident.full_name),
        Some("/family/resident".to_string()),
        now,
    )?;
    tx.commit()?;

    tracing::info!(family_id = %family.id, resident_id = %resident.id, "Family approved");
    Ok(family)
}

/// Reject a registration: the family link and its login account are removed.
pub fn reject_family(conn: &Connection, actor: &Actor, family_id: &Uuid) -> ServiceResult<()> {
    authorize(actor, Entity::Family, Action::Update)?;
    let family = load_family(conn, family_id)?;

    let tx = conn.unchecked_transaction()?;
    repository::delete_family(&tx, &family.id)?;
    repository::delete_messages_involving(&tx, &family.user_id)?;
    repository::delete_user(&tx, &family.user_id)?;
    tx.commit()?;

    tracing::info!(family_id = %family.id, user_id = %family.user_id, "Family registration rejected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::tests::{admin, registered_family};
    use crate::auth::{login, Credentials, FamilyRegistration};
    use crate::core_state::tests::test_state;
    use crate::db::open_memory_database;
    use crate::db::repository::fixtures::{seed_resident, seed_user};

    fn registration(email: &str) -> FamilyRegistration {
        FamilyRegistration {
            name: "Jo Price".into(),
            email: email.into(),
            password: "family-pass".into(),
            phone: None,
            relationship: Some("daughter".into()),
        }
    }

    #[test]
    fn create_and_read_back_resident() {
        let conn = open_memory_database().unwrap();
        let admin = admin(&conn);
        let created = create_resident(
            &conn,
            &admin,
            NewResident {
                full_name: "  Maud Price ".into(),
                room_number: Some("12B".into()),
                medical_conditions: vec!["arthritis".into()],
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(created.full_name, "Maud Price");

        let nurse = seed_user(&conn, Role::Nurse);
        let fetched = get_resident(&conn, &Actor::new(nurse.id, nurse.role), &created.id).unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn only_admin_writes_residents() {
        let conn = open_memory_database().unwrap();
        let coordinator = seed_user(&conn, Role::Coordinator);
        let actor = Actor::new(coordinator.id, coordinator.role);
        let err = create_resident(
            &conn,
            &actor,
            NewResident {
                full_name: "X".into(),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[test]
    fn resident_lists_only_own_record() {
        let conn = open_memory_database().unwrap();
        let admin = admin(&conn);
        let account = seed_user(&conn, Role::Resident);
        let mine = seed_resident(&conn, "Mine");
        let other = seed_resident(&conn, "Other");
        update_resident(
            &conn,
            &admin,
            &mine.id,
            ResidentPatch {
                user_id: Some(account.id),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();

        let actor = Actor::new(account.id, account.role);
        let listed = list_residents(&conn, &actor).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);
        assert!(matches!(get_resident(&conn, &actor, &other.id), Err(ServiceError::Forbidden(_))));
        assert_eq!(own_record(&conn, &actor).unwrap().id, mine.id);
    }

    #[test]
    fn approve_links_and_notifies_family() {
        let conn = open_memory_database().unwrap();
        let admin = admin(&conn);
        let resident = seed_resident(&conn, "Maud Price");
        let (user, family) = registered_family(&conn, &registration("jo@example.com")).unwrap();
        let family_actor = Actor::new(user.id, user.role);

        assert!(matches!(get_linked_resident(&conn, &family_actor), Err(ServiceError::Forbidden(_))));
        assert!(list_residents(&conn, &family_actor).unwrap().is_empty());

        let approved = approve_family(&conn, &admin, &family.id, &resident.id, Utc::now()).unwrap();
        assert_eq!(approved.status, FamilyStatus::Approved);
        assert_eq!(get_linked_resident(&conn, &family_actor).unwrap().id, resident.id);

        let inbox = repository::list_notifications(&conn, &user.id, false).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].notification_type, NotificationType::FamilyApproved);
    }

    #[tokio::test]
    async fn reject_removes_account_and_blocks_login() {
        let dir = tempfile::tempdir().unwrap();
        let core = test_state(dir.path());
        {
            let conn = core.db().unwrap();
            let admin = admin(&conn);
            let (user, family) = registered_family(&conn, &registration("sam@example.com")).unwrap();

            let pending = list_families(&conn, &admin, Some(FamilyStatus::Pending)).unwrap();
            assert_eq!(pending.len(), 1);
            assert_eq!(pending[0].email, "sam@example.com");

            reject_family(&conn, &admin, &family.id).unwrap();
            assert!(repository::get_family(&conn, &family.id).unwrap().is_none());
            assert!(repository::get_user(&conn, &user.id).unwrap().is_none());
        }

        let err = login(
            &core,
            &Credentials {
                email: "sam@example.com".into(),
                password: "family-pass".into(),
            },
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Authentication));
    }

    #[test]
    fn reject_clears_messages_of_rejected_account() {
        use crate::messaging::{self, NewMessage};

        let conn = open_memory_database().unwrap();
        let admin = admin(&conn);
        let (user, family) = registered_family(&conn, &registration("lee@example.com")).unwrap();
        let sender = Actor::new(user.id, user.role);
        messaging::send(
            &conn,
            &sender,
            NewMessage {
                receiver_id: admin.id,
                content: "Please approve my link".into(),
            },
            Utc::now(),
        )
        .unwrap();

        reject_family(&conn, &admin, &family.id).unwrap();
        assert!(repository::get_user(&conn, &user.id).unwrap().is_none());
        assert!(repository::list_messages_involving(&conn, &admin.id).unwrap().is_empty());
    }

    #[test]
    fn deleting_resident_returns_family_to_pending() {
        let conn = open_memory_database().unwrap();
        let admin = admin(&conn);
        let resident = seed_resident(&conn, "Maud Price");
        let (_, family) = registered_family(&conn, &registration("kim@example.com")).unwrap();
        approve_family(&conn, &admin, &family.id, &resident.id, Utc::now()).unwrap();

        delete_resident(&conn, &admin, &resident.id, Utc::now()).unwrap();
        let family = repository::get_family(&conn, &family.id).unwrap().unwrap();
        assert_eq!(family.status, FamilyStatus::Pending);
        assert_eq!(family.resident_id, None);
    }
}
