use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{collect_rows, enum_at, opt_uuid_at, uuid_at};
use crate::db::DatabaseError;
use crate::models::enums::VisitStatus;
use crate::models::{Message, Notification, VisitRequest};

// ── Notifications ───────────────────────────────────────────

const NOTIFICATION_COLUMNS: &str = "id, user_id, message, notification_type, link, is_read, created_at";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        message: row.get(2)?,
        notification_type: enum_at(row, 3)?,
        link: row.get(4)?,
        is_read: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn insert_notification(conn: &Connection, n: &Notification) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO notifications ({NOTIFICATION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        params![
            n.id.to_string(),
            n.user_id.to_string(),
            n.message,
            n.notification_type.as_str(),
            n.link,
            n.is_read,
            n.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_notification(conn: &Connection, id: &Uuid) -> Result<Option<Notification>, DatabaseError> {
    let n = conn
        .query_row(
            &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
            params![id.to_string()],
            notification_from_row,
        )
        .optional()?;
    Ok(n)
}

pub fn list_notifications(
    conn: &Connection,
    user_id: &Uuid,
    unread_only: bool,
) -> Result<Vec<Notification>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![user_id.to_string(), unread_only], notification_from_row)?;
    collect_rows(rows)
}

pub fn count_unread_notifications(conn: &Connection, user_id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
        params![user_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Setting an already-read notification is a no-op.
pub fn mark_notification_read(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Notification", id));
    }
    Ok(())
}

/// Returns how many notifications flipped to read.
pub fn mark_all_notifications_read(conn: &Connection, user_id: &Uuid) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
        params![user_id.to_string()],
    )?;
    Ok(changed)
}

pub fn delete_notification(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM notifications WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

// ── Messages ────────────────────────────────────────────────

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, content, is_read, created_at";

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: uuid_at(row, 0)?,
        sender_id: uuid_at(row, 1)?,
        receiver_id: uuid_at(row, 2)?,
        content: row.get(3)?,
        is_read: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn insert_message(conn: &Connection, message: &Message) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            message.id.to_string(),
            message.sender_id.to_string(),
            message.receiver_id.to_string(),
            message.content,
            message.is_read,
            message.created_at,
        ],
    )?;
    Ok(())
}

pub fn get_message(conn: &Connection, id: &Uuid) -> Result<Option<Message>, DatabaseError> {
    let message = conn
        .query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
            params![id.to_string()],
            message_from_row,
        )
        .optional()?;
    Ok(message)
}

/// Every message exchanged between two users, oldest first.
pub fn list_thread(conn: &Connection, a: &Uuid, b: &Uuid) -> Result<Vec<Message>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)
         ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map(params![a.to_string(), b.to_string()], message_from_row)?;
    collect_rows(rows)
}

/// Every message the user sent or received, newest first.
pub fn list_messages_involving(conn: &Connection, user_id: &Uuid) -> Result<Vec<Message>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages
         WHERE sender_id = ?1 OR receiver_id = ?1
         ORDER BY created_at DESC"
    ))?;
    let rows = stmt.query_map(params![user_id.to_string()], message_from_row)?;
    collect_rows(rows)
}

/// Unread messages addressed to the user, counted per sender.
pub fn count_unread_by_sender(conn: &Connection, user_id: &Uuid) -> Result<Vec<(Uuid, i64)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT sender_id, COUNT(*) FROM messages
         WHERE receiver_id = ?1 AND is_read = 0
         GROUP BY sender_id ORDER BY COUNT(*) DESC",
    )?;
    let rows = stmt.query_map(params![user_id.to_string()], |row| {
        Ok((uuid_at(row, 0)?, row.get::<_, i64>(1)?))
    })?;
    collect_rows(rows)
}

pub fn mark_message_read(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute("UPDATE messages SET is_read = 1 WHERE id = ?1", params![id.to_string()])?;
    if changed == 0 {
        return Err(DatabaseError::not_found("Message", id));
    }
    Ok(())
}

/// Mark everything `sender` sent to `receiver` as read.
pub fn mark_thread_read(conn: &Connection, receiver: &Uuid, sender: &Uuid) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "UPDATE messages SET is_read = 1 WHERE receiver_id = ?1 AND sender_id = ?2 AND is_read = 0",
        params![receiver.to_string(), sender.to_string()],
    )?;
    Ok(changed)
}

pub fn delete_messages_involving(conn: &Connection, user_id: &Uuid) -> Result<usize, DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM messages WHERE sender_id = ?1 OR receiver_id = ?1",
        params![user_id.to_string()],
    )?;
    Ok(changed)
}

// ── Visit requests ──────────────────────────────────────────

const VISIT_COLUMNS: &str = "id, requested_by, resident_id, visit_date, visit_time, reason, status,
     decided_by, created_at, updated_at";

fn visit_from_row(row: &Row<'_>) -> rusqlite::Result<VisitRequest> {
    Ok(VisitRequest {
        id: uuid_at(row, 0)?,
        requested_by: uuid_at(row, 1)?,
        resident_id: uuid_at(row, 2)?,
        visit_date: row.get(3)?,
        visit_time: row.get(4)?,
        reason: row.get(5)?,
        status: enum_at(row, 6)?,
        decided_by: opt_uuid_at(row, 7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub fn insert_visit_request(conn: &Connection, visit: &VisitRequest) -> Result<(), DatabaseError> {
    conn.execute(
        &format!(
            "INSERT INTO visit_requests ({VISIT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        params![
            visit.id.to_string(),
            visit.requested_by.to_string(),
            visit.resident_id.to_string(),
            visit.visit_date,
            visit.visit_time,
            visit.reason,
            visit.status.as_str(),
            visit.decided_by.map(|id| id.to_string()),
            visit.created_at,
            visit.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_visit_request(conn: &Connection, id: &Uuid) -> Result<Option<VisitRequest>, DatabaseError> {
    let visit = conn
        .query_row(
            &format!("SELECT {VISIT_COLUMNS} FROM visit_requests WHERE id = ?1"),
            params![id.to_string()],
            visit_from_row,
        )
        .optional()?;
    Ok(visit)
}

pub fn list_visit_requests(
    conn: &Connection,
    requested_by: Option<&Uuid>,
    status: Option<VisitStatus>,
) -> Result<Vec<VisitRequest>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {VISIT_COLUMNS} FROM visit_requests
         WHERE (?1 IS NULL OR requested_by = ?1) AND (?2 IS NULL OR status = ?2)
         ORDER BY visit_date ASC, visit_time ASC"
    ))?;
    let rows = stmt.query_map(
        params![requested_by.map(|id| id.to_string()), status.map(|s| s.as_str())],
        visit_from_row,
    )?;
    collect_rows(rows)
}

/// Record a decision on a request that is still pending. Returns false if
/// it was already decided.
pub fn decide_visit_request(conn: &Connection, visit: &VisitRequest) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE visit_requests SET status = ?1, decided_by = ?2, updated_at = ?3
         WHERE id = ?4 AND status = 'pending'",
        params![
            visit.status.as_str(),
            visit.decided_by.map(|id| id.to_string()),
            visit.updated_at,
            visit.id.to_string(),
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete_visit_request(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute("DELETE FROM visit_requests WHERE id = ?1", params![id.to_string()])?;
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::fixtures::{seed_resident, seed_user};
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::{NotificationType, Role};
    use chrono::{Duration, NaiveDate, NaiveTime, Utc};

    fn message(from: Uuid, to: Uuid, content: &str, age_minutes: i64) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: from,
            receiver_id: to,
            content: content.into(),
            is_read: false,
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[test]
    fn notifications_unread_and_mark_all() {
        let conn = open_memory_database().unwrap();
        let user = seed_user(&conn, Role::Carer);
        for text in ["one", "two"] {
            insert_notification(
                &conn,
                &Notification {
                    id: Uuid::new_v4(),
                    user_id: user.id,
                    message: text.into(),
                    notification_type: NotificationType::General,
                    link: None,
                    is_read: false,
                    created_at: Utc::now(),
                },
            )
            .unwrap();
        }
        assert_eq!(count_unread_notifications(&conn, &user.id).unwrap(), 2);
        assert_eq!(mark_all_notifications_read(&conn, &user.id).unwrap(), 2);
        assert_eq!(count_unread_notifications(&conn, &user.id).unwrap(), 0);
        assert!(list_notifications(&conn, &user.id, true).unwrap().is_empty());
        assert_eq!(list_notifications(&conn, &user.id, false).unwrap().len(), 2);
    }

    #[test]
    fn thread_is_oldest_first_and_scoped_to_pair() {
        let conn = open_memory_database().unwrap();
        let a = seed_user(&conn, Role::Nurse);
        let b = seed_user(&conn, Role::Family);
        let c = seed_user(&conn, Role::Carer);
        insert_message(&conn, &message(a.id, b.id, "hello", 10)).unwrap();
        insert_message(&conn, &message(b.id, a.id, "hi", 5)).unwrap();
        insert_message(&conn, &message(c.id, a.id, "other", 1)).unwrap();

        let thread: Vec<_> = list_thread(&conn, &b.id, &a.id)
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(thread, vec!["hello", "hi"]);
        assert_eq!(list_messages_involving(&conn, &a.id).unwrap().len(), 3);
    }

    #[test]
    fn unread_grouped_by_sender() {
        let conn = open_memory_database().unwrap();
        let me = seed_user(&conn, Role::Coordinator);
        let x = seed_user(&conn, Role::Nurse);
        let y = seed_user(&conn, Role::Carer);
        insert_message(&conn, &message(x.id, me.id, "1", 3)).unwrap();
        insert_message(&conn, &message(x.id, me.id, "2", 2)).unwrap();
        insert_message(&conn, &message(y.id, me.id, "3", 1)).unwrap();

        let counts = count_unread_by_sender(&conn, &me.id).unwrap();
        assert_eq!(counts, vec![(x.id, 2), (y.id, 1)]);

        assert_eq!(mark_thread_read(&conn, &me.id, &x.id).unwrap(), 2);
        assert_eq!(count_unread_by_sender(&conn, &me.id).unwrap(), vec![(y.id, 1)]);
    }

    #[test]
    fn visit_decided_only_once() {
        let conn = open_memory_database().unwrap();
        let family = seed_user(&conn, Role::Family);
        let admin = seed_user(&conn, Role::Admin);
        let resident = seed_resident(&conn, "Ada");
        let now = Utc::now();
        let mut visit = VisitRequest {
            id: Uuid::new_v4(),
            requested_by: family.id,
            resident_id: resident.id,
            visit_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            visit_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            reason: None,
            status: VisitStatus::Pending,
            decided_by: None,
            created_at: now,
            updated_at: now,
        };
        insert_visit_request(&conn, &visit).unwrap();

        visit.status = VisitStatus::Approved;
        visit.decided_by = Some(admin.id);
        assert!(decide_visit_request(&conn, &visit).unwrap());
        visit.status = VisitStatus::Rejected;
        assert!(!decide_visit_request(&conn, &visit).unwrap());

        let stored = get_visit_request(&conn, &visit.id).unwrap().unwrap();
        assert_eq!(stored.status, VisitStatus::Approved);
        assert_eq!(list_visit_requests(&conn, Some(&family.id), None).unwrap().len(), 1);
    }
}
