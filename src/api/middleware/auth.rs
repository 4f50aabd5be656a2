//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it to an `Actor`
//! against the user table and injects the actor into request extensions
//! for downstream handlers.

use axum::extract::State;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::access::Actor;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::auth::authenticate;
use crate::auth::token::bearer_token;
use crate::models::enums::Role;

/// Require a valid bearer token.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
/// On success: injects `Actor` and adds `Cache-Control: no-store`.
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(mut req: Request<axum::body::Body>, next: Next) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    // 1. Extract bearer token
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or(ApiError::Unauthorized)?
        .to_string();

    // 2. Resolve against the user table
    let actor = {
        let conn = ctx.core.db()?;
        authenticate(&conn, &ctx.core.signer, &token)?
    }; // MutexGuard dropped here, before any .await

    // 3. Inject actor for downstream handlers
    req.extensions_mut().insert(actor);

    // 4. Process request
    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));

    Ok(response)
}

/// Restrict a route group to some roles. Runs after `require_auth`.
pub async fn require_roles(
    State(roles): State<&'static [Role]>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    match req.extensions().get::<Actor>().copied() {
        Some(actor) if roles.contains(&actor.role) => next.run(req).await,
        Some(actor) => {
            tracing::debug!(user_id = %actor.id, role = %actor.role, path = %req.uri().path(), "Role not allowed on route");
            ApiError::Forbidden(format!("{} accounts cannot use this route", actor.role)).into_response()
        }
        None => ApiError::Unauthorized.into_response(),
    }
}
