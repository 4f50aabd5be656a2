//! Direct messages between users.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{authorize, Action, Actor, Entity};
use crate::db::repository;
use crate::error::{ServiceError, ServiceResult};
use crate::models::enums::Role;
use crate::models::{Message, UserSummary};

#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub receiver_id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderUnread {
    pub sender_id: Uuid,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnreadMessages {
    pub total: i64,
    pub by_sender: Vec<SenderUnread>,
}

/// One counterpart in the inbox with the latest message exchanged.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
    pub profile_picture: Option<String>,
    pub last_message: Message,
    pub unread: i64,
}

pub fn send(conn: &Connection, actor: &Actor, input: NewMessage, now: DateTime<Utc>) -> ServiceResult<Message> {
    authorize(actor, Entity::Message, Action::Create)?;
    let content = input.content.trim();
    if content.is_empty() {
        return Err(ServiceError::validation("Message content is required"));
    }
    if input.receiver_id == actor.id {
        return Err(ServiceError::validation("Cannot send a message to yourself"));
    }
    if repository::get_user(conn, &input.receiver_id)?.is_none() {
        return Err(ServiceError::not_found("Receiver"));
    }

    let message = Message {
        id: Uuid::new_v4(),
        sender_id: actor.id,
        receiver_id: input.receiver_id,
        content: content.to_string(),
        is_read: false,
        created_at: now,
    };
    repository::insert_message(conn, &message)?;
    tracing::debug!(sender = %actor.id, receiver = %message.receiver_id, "Message sent");
    Ok(message)
}

/// Messages between the actor and `other`, oldest first.
pub fn thread(conn: &Connection, actor: &Actor, other: &Uuid) -> ServiceResult<Vec<Message>> {
    authorize(actor, Entity::Message, Action::Read)?;
    Ok(repository::list_thread(conn, &actor.id, other)?)
}

pub fn unread_count(conn: &Connection, actor: &Actor) -> ServiceResult<UnreadMessages> {
    authorize(actor, Entity::Message, Action::Read)?;
    let by_sender: Vec<SenderUnread> = repository::count_unread_by_sender(conn, &actor.id)?
        .into_iter()
        .map(|(sender_id, count)| SenderUnread { sender_id, count })
        .collect();
    Ok(UnreadMessages {
        total: by_sender.iter().map(|s| s.count).sum(),
        by_sender,
    })
}

/// The actor's inbox: one entry per counterpart, most recent first.
pub fn conversations(conn: &Connection, actor: &Actor) -> ServiceResult<Vec<Conversation>> {
    authorize(actor, Entity::Message, Action::Read)?;
    let unread: HashMap<Uuid, i64> = repository::count_unread_by_sender(conn, &actor.id)?
        .into_iter()
        .collect();

    // Messages arrive newest first, so the first one seen per counterpart is the latest.
    let mut seen = HashSet::new();
    let mut conversations = Vec::new();
    for message in repository::list_messages_involving(conn, &actor.id)? {
        let other = if message.sender_id == actor.id {
            message.receiver_id
        } else {
            message.sender_id
        };
        if !seen.insert(other) {
            continue;
        }
        let Some(user) = repository::get_user(conn, &other)? else {
            continue;
        };
        conversations.push(Conversation {
            user_id: other,
            name: user.name,
            role: user.role,
            profile_picture: user.profile_picture,
            last_message: message,
            unread: unread.get(&other).copied().unwrap_or(0),
        });
    }
    Ok(conversations)
}

/// Mark one message read. Receiver only; repeat calls are no-ops.
pub fn mark_read(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<Message> {
    authorize(actor, Entity::Message, Action::Update)?;
    let mut message = repository::get_message(conn, id)?.ok_or_else(|| ServiceError::not_found("Message"))?;
    if message.receiver_id != actor.id {
        return Err(ServiceError::forbidden("only the receiver can mark a message read"));
    }
    if !message.is_read {
        repository::mark_message_read(conn, id)?;
        message.is_read = true;
    }
    Ok(message)
}

/// Mark everything `other` sent the actor as read.
pub fn mark_thread_read(conn: &Connection, actor: &Actor, other: &Uuid) -> ServiceResult<usize> {
    authorize(actor, Entity::Message, Action::Update)?;
    Ok(repository::mark_thread_read(conn, &actor.id, other)?)
}

/// Active users the actor can write to.
pub fn contacts(conn: &Connection, actor: &Actor) -> ServiceResult<Vec<UserSummary>> {
    authorize(actor, Entity::Message, Action::Create)?;
    Ok(repository::list_users(conn, None)?
        .iter()
        .filter(|u| u.is_active && u.id != actor.id)
        .map(UserSummary::from)
        .collect())
}
