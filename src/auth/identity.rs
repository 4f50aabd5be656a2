//! Accounts, credentials and sessions.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::password::{check_strength, hash_password, verify_password};
use super::token::{TokenError, TokenSigner};
use crate::access::{authorize, Action, Actor, Entity};
use crate::core_state::CoreState;
use crate::db::repository;
use crate::error::{ServiceError, ServiceResult};
use crate::models::enums::{FamilyStatus, Role};
use crate::models::{Family, NewUser, ProfilePatch, User, UserPatch, UserSummary};

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FamilyRegistration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

/// Trim and lower-case an email; reject anything without a local part and domain.
pub fn normalize_email(raw: &str) -> ServiceResult<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') && !domain.contains('@') => {
            Ok(email)
        }
        _ => Err(ServiceError::validation("A valid email address is required")),
    }
}

fn require_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("Name is required"));
    }
    Ok(name.to_string())
}

fn ensure_email_free(conn: &Connection, email: &str, except: Option<Uuid>) -> ServiceResult<()> {
    match repository::get_user_by_email(conn, email)? {
        Some(existing) if Some(existing.id) != except => {
            Err(ServiceError::conflict("Email already registered"))
        }
        _ => Ok(()),
    }
}

fn load_user(conn: &Connection, id: &Uuid) -> ServiceResult<User> {
    repository::get_user(conn, id)?.ok_or_else(|| ServiceError::not_found("User"))
}

// PBKDF2 runs on the blocking pool with the connection unlocked.

async fn derive_hash(password: &str, iterations: u32) -> ServiceResult<String> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_password(&password, iterations))
        .await
        .map_err(|e| ServiceError::Internal(format!("Password hashing task failed: {e}")))
}

async fn password_matches(password: &str, encoded: String) -> ServiceResult<bool> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || verify_password(&password, &encoded))
        .await
        .map_err(|e| ServiceError::Internal(format!("Password check task failed: {e}")))
}

// ═══════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════

/// Exchange credentials for a token.
///
/// Unknown email, wrong password, inactive account and never-set password
/// all fail the same way.
pub async fn login(core: &CoreState, credentials: &Credentials, now: DateTime<Utc>) -> ServiceResult<LoginResponse> {
    let email = credentials.email.trim().to_lowercase();
    let mut user = {
        let conn = core.db()?;
        repository::get_user_by_email(&conn, &email)?.ok_or(ServiceError::Authentication)?
    };

    let hash = match (user.password_hash.take(), user.password_set, user.is_active) {
        (Some(hash), true, true) => hash,
        _ => {
            tracing::info!(user_id = %user.id, "Login refused for inactive or unbootstrapped account");
            return Err(ServiceError::Authentication);
        }
    };
    if !password_matches(&credentials.password, hash).await? {
        return Err(ServiceError::Authentication);
    }

    let token = core.signer.issue(user.id, user.role, now)?;
    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");
    Ok(LoginResponse {
        token,
        user: UserSummary::from(&user),
    })
}

/// Resolve a bearer token to the acting user.
///
/// The account is re-read on every call: a deleted or deactivated user, or one
/// whose role changed since the token was issued, is no longer authenticated.
pub fn authenticate(conn: &Connection, signer: &TokenSigner, token: &str) -> ServiceResult<Actor> {
    let claims = signer.verify(token).map_err(|e| match e {
        TokenError::Expired | TokenError::Invalid(_) => ServiceError::Unauthorized,
        other => ServiceError::Token(other),
    })?;
    match repository::get_user(conn, &claims.sub)? {
        Some(user) if user.is_active && user.role == claims.role => Ok(Actor::new(user.id, user.role)),
        _ => Err(ServiceError::Unauthorized),
    }
}

/// One-time password bootstrap for accounts created without one.
pub async fn set_initial_password(core: &CoreState, credentials: &Credentials, now: DateTime<Utc>) -> ServiceResult<()> {
    let email = normalize_email(&credentials.email)?;
    load_passwordless(&*core.db()?, &email)?;
    check_strength(&credentials.password).map_err(ServiceError::Validation)?;

    let hash = derive_hash(&credentials.password, core.password_iterations()).await?;
    let conn = core.db()?;
    // Re-read: another request may have set it while the hash was derived.
    let mut user = load_passwordless(&conn, &email)?;
    user.password_hash = Some(hash);
    user.password_set = true;
    user.updated_at = now;
    repository::update_user(&conn, &user)?;
    tracing::info!(user_id = %user.id, "Initial password set");
    Ok(())
}

fn load_passwordless(conn: &Connection, email: &str) -> ServiceResult<User> {
    let user = repository::get_user_by_email(conn, email)?.ok_or_else(|| ServiceError::not_found("User"))?;
    if user.password_set {
        return Err(ServiceError::conflict("Password already set"));
    }
    Ok(user)
}

/// Public family sign-up: a family account plus a pending link request.
pub async fn register_family(
    core: &CoreState,
    input: &FamilyRegistration,
    now: DateTime<Utc>,
) -> ServiceResult<(User, Family)> {
    let name = require_name(&input.name)?;
    let email = normalize_email(&input.email)?;
    check_strength(&input.password).map_err(ServiceError::Validation)?;
    ensure_email_free(&*core.db()?, &email, None)?;

    let hash = derive_hash(&input.password, core.password_iterations()).await?;
    let conn = core.db()?;
    insert_family_account(&conn, input, name, email, hash, now)
}

/// Store a family account with an already derived password hash.
pub(crate) fn insert_family_account(
    conn: &Connection,
    input: &FamilyRegistration,
    name: String,
    email: String,
    password_hash: String,
    now: DateTime<Utc>,
) -> ServiceResult<(User, Family)> {
    let tx = conn.unchecked_transaction()?;
    ensure_email_free(&tx, &email, None)?;
    let user = User {
        id: Uuid::new_v4(),
        name,
        email,
        password_hash: Some(password_hash),
        role: Role::Family,
        phone: input.phone.clone(),
        profile_picture: None,
        is_active: true,
        password_set: true,
        created_at: now,
        updated_at: now,
    };
    repository::insert_user(&tx, &user)?;
    let family = Family {
        id: Uuid::new_v4(),
        user_id: user.id,
        resident_id: None,
        relationship: input.relationship.clone(),
        status: FamilyStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    repository::insert_family(&tx, &family)?;
    tx.commit()?;

    tracing::info!(user_id = %user.id, family_id = %family.id, "Family registration pending approval");
    Ok((user, family))
}

// ═══════════════════════════════════════════════════════════
// Self-service
// ═══════════════════════════════════════════════════════════

pub fn me(conn: &Connection, actor: &Actor) -> ServiceResult<User> {
    load_user(conn, &actor.id)
}

pub fn update_profile(
    conn: &Connection,
    actor: &Actor,
    patch: ProfilePatch,
    now: DateTime<Utc>,
) -> ServiceResult<User> {
    let mut user = load_user(conn, &actor.id)?;
    if let Some(name) = &patch.name {
        require_name(name)?;
    }
    patch.apply(&mut user);
    user.updated_at = now;
    repository::update_user(conn, &user)?;
    Ok(user)
}

pub async fn change_password(
    core: &CoreState,
    actor: &Actor,
    change: &PasswordChange,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    let current = load_user(&*core.db()?, &actor.id)?.password_hash;
    let current_ok = match current {
        Some(hash) => password_matches(&change.current_password, hash).await?,
        None => false,
    };
    if !current_ok {
        return Err(ServiceError::Authentication);
    }
    check_strength(&change.new_password).map_err(ServiceError::Validation)?;

    let hash = derive_hash(&change.new_password, core.password_iterations()).await?;
    let conn = core.db()?;
    let mut user = load_user(&conn, &actor.id)?;
    user.password_hash = Some(hash);
    user.updated_at = now;
    repository::update_user(&conn, &user)?;
    tracing::info!(user_id = %user.id, "Password changed");
    Ok(())
}

// ═══════════════════════════════════════════════════════════
// Administration
// ═══════════════════════════════════════════════════════════

/// Create an account. Staff need a password up front; resident and family
/// accounts may be created without one and bootstrap it later.
pub async fn create_user(core: &CoreState, actor: &Actor, input: NewUser, now: DateTime<Utc>) -> ServiceResult<User> {
    authorize(actor, Entity::User, Action::Create)?;
    let name = require_name(&input.name)?;
    let email = normalize_email(&input.email)?;
    ensure_email_free(&*core.db()?, &email, None)?;

    let password_hash = match (&input.password, input.role.is_staff()) {
        (Some(password), _) => {
            check_strength(password).map_err(ServiceError::Validation)?;
            Some(derive_hash(password, core.password_iterations()).await?)
        }
        (None, true) => return Err(ServiceError::validation("Staff accounts require a password")),
        (None, false) => None,
    };

    let user = User {
        id: Uuid::new_v4(),
        name,
        email,
        password_set: password_hash.is_some(),
        password_hash,
        role: input.role,
        phone: input.phone,
        profile_picture: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    // A concurrent signup with the same email fails here as a UNIQUE conflict.
    repository::insert_user(&*core.db()?, &user)?;
    tracing::info!(user_id = %user.id, role = %user.role, created_by = %actor.id, "User created");
    Ok(user)
}

pub fn list_users(conn: &Connection, actor: &Actor, role: Option<Role>) -> ServiceResult<Vec<User>> {
    authorize(actor, Entity::User, Action::Read)?;
    Ok(repository::list_users(conn, role)?)
}

pub fn get_user(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<User> {
    authorize(actor, Entity::User, Action::Read)?;
    load_user(conn, id)
}

pub fn update_user(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    mut patch: UserPatch,
    now: DateTime<Utc>,
) -> ServiceResult<User> {
    authorize(actor, Entity::User, Action::Update)?;
    let mut user = load_user(conn, id)?;
    if let Some(email) = patch.email.take() {
        let email = normalize_email(&email)?;
        ensure_email_free(conn, &email, Some(user.id))?;
        patch.email = Some(email);
    }
    if let Some(name) = &patch.name {
        require_name(name)?;
    }
    if user.id == actor.id && (patch.is_active == Some(false) || patch.role.is_some_and(|r| r != user.role)) {
        return Err(ServiceError::validation("Administrators cannot demote or deactivate themselves"));
    }
    patch.apply(&mut user);
    user.updated_at = now;
    repository::update_user(conn, &user)?;
    Ok(user)
}

pub fn set_active(
    conn: &Connection,
    actor: &Actor,
    id: &Uuid,
    active: bool,
    now: DateTime<Utc>,
) -> ServiceResult<User> {
    let patch = UserPatch {
        is_active: Some(active),
        ..Default::default()
    };
    let user = update_user(conn, actor, id, patch, now)?;
    tracing::info!(user_id = %user.id, active, "User activation changed");
    Ok(user)
}

pub fn delete_user(conn: &Connection, actor: &Actor, id: &Uuid) -> ServiceResult<()> {
    authorize(actor, Entity::User, Action::Delete)?;
    if &actor.id == id {
        return Err(ServiceError::validation("Administrators cannot delete themselves"));
    }
    load_user(conn, id)?;

    let tx = conn.unchecked_transaction()?;
    if repository::count_user_references(&tx, id)? > 0 {
        return Err(ServiceError::conflict(
            "User has shift, message or feedback history; deactivate the account instead",
        ));
    }
    repository::delete_user(&tx, id)?;
    tx.commit()?;
    tracing::info!(user_id = %id, deleted_by = %actor.id, "User deleted");
    Ok(())
}

/// Create the first administrator when the database has none.
/// Returns whether an account was created.
pub fn bootstrap_admin(
    conn: &Connection,
    email: &str,
    password: &str,
    iterations: u32,
    now: DateTime<Utc>,
) -> ServiceResult<bool> {
    if !repository::list_users(conn, Some(Role::Admin))?.is_empty() {
        return Ok(false);
    }
    let email = normalize_email(email)?;
    check_strength(password).map_err(ServiceError::Validation)?;
    ensure_email_free(conn, &email, None)?;
    let user = User {
        id: Uuid::new_v4(),
        name: "Administrator".into(),
        email,
        password_hash: Some(hash_password(password, iterations)),
        role: Role::Admin,
        phone: None,
        profile_picture: None,
        is_active: true,
        password_set: true,
        created_at: now,
        updated_at: now,
    };
    repository::insert_user(conn, &user)?;
    tracing::info!(user_id = %user.id, "Bootstrap administrator created");
    Ok(true)
}
