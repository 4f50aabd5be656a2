//! Role-scoped access control.
//!
//! Two layers, checked in order:
//! 1. `permits`: the role table. One exhaustive match per role decides
//!    which actions a role may take on an entity at all.
//! 2. Relationship rules: ownership, assignment and resident links are
//!    checked against the loaded record by the domain module.
//!
//! Default deny. A failed check is always `Forbidden`, never an empty result.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repository;
use crate::error::{ServiceError, ServiceResult};
use crate::models::enums::{FamilyStatus, Role};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// The authenticated caller, as established by the auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Resident,
    Family,
    Shift,
    ShiftNote,
    Task,
    CarePlan,
    CareForm,
    File,
    HealthRecord,
    Incident,
    Feedback,
    Notification,
    Message,
    VisitRequest,
    NoteCategory,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    /// Moderation by staff: approve/reject families, decide visits,
    /// respond to feedback, flag shift notes, mark shifts missed.
    Review,
    /// Fill in a care form.
    Answer,
}

// ═══════════════════════════════════════════════════════════
// Role table
// ═══════════════════════════════════════════════════════════

/// Whether `role` may perform `action` on `entity` at all.
pub fn permits(role: Role, entity: Entity, action: Action) -> bool {
    use Action::*;
    use Entity as E;

    match role {
        Role::Admin => match (entity, action) {
            (E::ShiftNote, Create | Update | Review) => false,
            (E::Task, Update) => false,
            (E::Feedback, Create) => false,
            (E::VisitRequest, Create | Delete) => false,
            (E::Notification, Create) => false,
            (E::Message, Delete) => false,
            _ => true,
        },
        Role::Coordinator => match (entity, action) {
            (E::User, _) => false,
            (E::Resident, Read) => true,
            (E::Resident, _) => false,
            (E::Family, _) => false,
            (E::Shift, Create | Read | Update | Delete | Review) => true,
            (E::ShiftNote, Read | Review) => true,
            (E::Task, Create | Read | Delete) => true,
            (E::CarePlan, Create | Read | Update | Delete) => true,
            (E::CareForm, Read | Answer) => true,
            (E::File, Create | Read | Update | Delete) => true,
            (E::HealthRecord, Create | Read | Update | Delete) => true,
            (E::Incident, Create | Read | Update) => true,
            (E::Feedback, Read | Review) => true,
            (E::Notification, Read | Update | Delete) => true,
            (E::Message, Create | Read | Update) => true,
            (E::VisitRequest, Read | Review) => true,
            (E::NoteCategory, Create | Read | Update | Delete) => true,
            (E::Dashboard, Read) => true,
            _ => false,
        },
        Role::Nurse => match (entity, action) {
            (E::Resident, Read) => true,
            (E::Shift, Read) => true,
            (E::ShiftNote, Create | Read | Update | Delete) => true,
            (E::Task, Read | Update) => true,
            (E::CarePlan, Read) => true,
            (E::CareForm, Read | Answer) => true,
            (E::File, Create | Read | Update | Delete) => true,
            (E::HealthRecord, Create | Read | Update | Delete) => true,
            (E::Incident, Create | Read) => true,
            (E::Notification, Read | Update | Delete) => true,
            (E::Message, Create | Read | Update) => true,
            (E::NoteCategory, Read) => true,
            _ => false,
        },
        Role::Carer => match (entity, action) {
            (E::Resident, Read) => true,
            (E::Shift, Read) => true,
            (E::ShiftNote, Create | Read | Update | Delete) => true,
            (E::Task, Read | Update) => true,
            (E::CarePlan, Read) => true,
            (E::CareForm, Read | Answer) => true,
            (E::File, Read) => true,
            (E::HealthRecord, Read) => true,
            (E::Incident, Create | Read) => true,
            (E::Notification, Read | Update | Delete) => true,
            (E::Message, Create | Read | Update) => true,
            (E::NoteCategory, Read) => true,
            _ => false,
        },
        Role::Resident => match (entity, action) {
            (E::Resident, Read) => true,
            (E::CarePlan, Read) => true,
            (E::CareForm, Read | Answer) => true,
            (E::File, Read) => true,
            (E::HealthRecord, Read) => true,
            (E::Feedback, Create | Read) => true,
            (E::Notification, Read | Update | Delete) => true,
            (E::Message, Create | Read | Update) => true,
            (E::NoteCategory, Read) => true,
            _ => false,
        },
        Role::Family => match (entity, action) {
            (E::Resident, Read) => true,
            (E::Family, Read) => true,
            (E::CarePlan, Read) => true,
            (E::CareForm, Read | Answer) => true,
            (E::File, Read) => true,
            (E::HealthRecord, Read) => true,
            (E::Notification, Read | Update | Delete) => true,
            (E::Message, Create | Read | Update) => true,
            (E::VisitRequest, Create | Read | Delete) => true,
            (E::NoteCategory, Read) => true,
            _ => false,
        },
    }
}

/// `permits` as a `Forbidden` error.
pub fn authorize(actor: &Actor, entity: Entity, action: Action) -> ServiceResult<()> {
    if permits(actor.role, entity, action) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "role {} may not {action:?} {entity:?}",
            actor.role
        )))
    }
}

/// Roles-allowed post-filter. Admin sees everything.
pub fn visible_to(roles_allowed: &[Role], role: Role) -> bool {
    role == Role::Admin || roles_allowed.contains(&role)
}

/// Require the actor to own (authored, uploaded, reported...) a record,
/// unless the actor is admin.
pub fn ensure_owner_or_admin(actor: &Actor, owner: Uuid, what: &str) -> ServiceResult<()> {
    if actor.role == Role::Admin || actor.id == owner {
        Ok(())
    } else {
        Err(ServiceError::forbidden(format!("not the owner of this {what}")))
    }
}

// ═══════════════════════════════════════════════════════════
// Resident relationship rules
// ═══════════════════════════════════════════════════════════

/// Whether the actor may see records about a resident.
///
/// 1. Staff → every resident
/// 2. Resident → only the record linked to their own account
/// 3. Family → only the resident of an approved family link
/// 4. Default → deny
pub fn can_view_resident(conn: &Connection, actor: &Actor, resident_id: &Uuid) -> ServiceResult<bool> {
    match actor.role {
        Role::Admin | Role::Coordinator | Role::Nurse | Role::Carer => Ok(true),
        Role::Resident => Ok(repository::get_resident_by_user(conn, &actor.id)?
            .is_some_and(|r| &r.id == resident_id)),
        Role::Family => Ok(linked_resident_id(conn, &actor.id)?.as_ref() == Some(resident_id)),
    }
}

pub fn ensure_resident_access(conn: &Connection, actor: &Actor, resident_id: &Uuid) -> ServiceResult<()> {
    if can_view_resident(conn, actor, resident_id)? {
        Ok(())
    } else {
        Err(ServiceError::forbidden("no access to this resident"))
    }
}

/// The resident an approved family account is linked to.
pub fn linked_resident_id(conn: &Connection, family_user: &Uuid) -> ServiceResult<Option<Uuid>> {
    Ok(repository::get_family_by_user(conn, family_user)?
        .filter(|f| f.status == FamilyStatus::Approved)
        .and_then(|f| f.resident_id))
}

/// The resident whose records a resident or family actor is scoped to.
/// `None` for staff.
pub fn scoped_resident(conn: &Connection, actor: &Actor) -> ServiceResult<Option<Uuid>> {
    match actor.role {
        Role::Admin | Role::Coordinator | Role::Nurse | Role::Carer => Ok(None),
        Role::Resident => repository::get_resident_by_user(conn, &actor.id)?
            .map(|r| Some(r.id))
            .ok_or_else(|| ServiceError::not_found("Resident record")),
        Role::Family => linked_resident_id(conn, &actor.id)?
            .map(Some)
            .ok_or_else(|| ServiceError::forbidden("family account is not linked to a resident")),
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
