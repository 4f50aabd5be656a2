//! Notification fan-out and the addressee's inbox.
//!
//! `notify` takes the same connection (or transaction) as the mutation that
//! triggers it, so the notification commits or rolls back together with it.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::access::{authorize, Action, Actor, Entity};
use crate::db::repository;
use crate::error::{ServiceError, ServiceResult};
use crate::models::enums::NotificationType;
use crate::models::Notification;

#[derive(Debug, Clone, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

/// Write one notification addressed to one user.
pub fn notify(
    conn: &Connection,
    user_id: Uuid,
    notification_type: NotificationType,
    message: impl Into<String>,
    link: Option<String>,
    now: DateTime<Utc>,
) -> ServiceResult<Notification> {
    let notification = Notification {
        id: Uuid::new_v4(),
        user_id,
        message: message.into(),
        notification_type,
        link,
        is_read: false,
        created_at: now,
    };
    repository::insert_notification(conn, &notification)?;
    tracing::debug!(
        user_id = %user_id,
        kind = %notification_type,
        "Notification queued"
    );
    Ok(notification)
}

fn load_own(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<Notification> {
    let notification = repository::get_notification(conn, id)?
        .ok_or_else(|| ServiceError::not_found("Notification"))?;
    if notification.user_id != actor.id {
        return Err(ServiceError::forbidden("notification belongs to another user"));
    }
    Ok(notification)
}

pub fn list_for_user(conn: &Connection, actor: &Actor, unread_only: bool) -> ServiceResult<Vec<Notification>> {
    authorize(actor, Entity::Notification, Action::Read)?;
    Ok(repository::list_notifications(conn, &actor.id, unread_only)?)
}

pub fn unread_count(conn: &Connection, actor: &Actor) -> ServiceResult<UnreadCount> {
    authorize(actor, Entity::Notification, Action::Read)?;
    Ok(UnreadCount {
        count: repository::count_unread_notifications(conn, &actor.id)?,
    })
}

/// Idempotent: marking an already-read notification succeeds unchanged.
pub fn mark_as_read(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<Notification> {
    authorize(actor, Entity::Notification, Action::Update)?;
    let mut notification = load_own(conn, actor, id)?;
    if !notification.is_read {
        repository::mark_notification_read(conn, id)?;
        notification.is_read = true;
    }
    Ok(notification)
}

pub fn mark_all_read(conn: &Connection, actor: &Actor) -> ServiceResult<usize> {
    authorize(actor, Entity::Notification, Action::Update)?;
    Ok(repository::mark_all_notifications_read(conn, &actor.id)?)
}

pub fn delete(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<()> {
    authorize(actor, Entity::Notification, Action::Delete)?;
    load_own(conn, actor, id)?;
    repository::delete_notification(conn, id)?;
    Ok(())
}
