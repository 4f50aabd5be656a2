//! Audit logging middleware.
//!
//! Logs every API request with user id, method, path, response status and
//! latency. Runs innermost (after auth has injected the `Actor`).

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::access::Actor;

/// Log API access for audit trail.
pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let actor = req.extensions().get::<Actor>().copied();
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match actor {
        Some(actor) => tracing::info!(
            target: "audit",
            user_id = %actor.id,
            role = %actor.role,
            %method,
            %path,
            status,
            elapsed_ms,
            "API access"
        ),
        None => tracing::info!(target: "audit", %method, %path, status, elapsed_ms, "API access"),
    }

    response
}
